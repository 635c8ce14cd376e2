/* Copyright 2023-2025 Bruce Merry
 *
 * This program is free software: you can redistribute it and/or modify it
 * under the terms of the GNU General Public License as published by the Free
 * Software Foundation, either version 3 of the License, or (at your option)
 * any later version.
 *
 * This program is distributed in the hope that it will be useful, but WITHOUT
 * ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
 * FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
 * more details.
 *
 * You should have received a copy of the GNU General Public License along
 * with this program. If not, see <https://www.gnu.org/licenses/>.
 */

use reqwest::StatusCode;

/// Failure of a single step of a fetch cycle.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request for {what} at {url} failed: {source}")]
    Transport {
        what: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetch of {what} at {url} failed with status code {status}")]
    Status {
        what: &'static str,
        url: String,
        status: StatusCode,
    },

    #[error("could not decode {what} from {url}: {source}")]
    Decode {
        what: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{what} has no `{rel}` link")]
    MissingLink { what: &'static str, rel: String },

    #[error("could not find a tank with the serial number {0}")]
    TankNotFound(String),

    #[error("no bearer token; authentication has not succeeded")]
    NotAuthenticated,

    #[error("tank {0} has not been located on the account yet")]
    TankNotLocated(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
