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

use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use crate::api::ROOT_ENDPOINT;

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    #[serde(default = "root_url_default")]
    pub root_url: String,
    #[serde(default = "timeout_default", with = "humantime_serde")]
    pub timeout: Duration,
    /// Skip TLS certificate verification. This removes protection against
    /// man-in-the-middle attacks and only exists for compatibility with the
    /// vendor's certificate setup.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn root_url_default() -> String {
    ROOT_ENDPOINT.to_owned()
}

fn timeout_default() -> Duration {
    Duration::from_secs(30)
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            root_url: root_url_default(),
            timeout: timeout_default(),
            accept_invalid_certs: false,
        }
    }
}

/// What a fetch cycle does when one of its steps fails.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum CyclePolicy {
    /// Stop at the first failing step and do not notify listeners.
    #[default]
    FailFast,
    /// Run every step regardless, reusing whatever token and links are left
    /// over from earlier cycles, and notify listeners anyway.
    Lenient,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollConfig {
    #[serde(default = "interval_default", with = "humantime_serde")]
    pub interval: Duration,
    #[serde(default)]
    pub policy: CyclePolicy,
}

fn interval_default() -> Duration {
    Duration::from_secs(120)
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: interval_default(),
            policy: CyclePolicy::default(),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TankConfig {
    pub username: String,
    pub password: String,
    pub serial_number: String,
}

impl fmt::Debug for TankConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TankConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("serial_number", &self.serial_number)
            .finish()
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(rename = "tank")]
    pub tanks: Vec<TankConfig>,
}
