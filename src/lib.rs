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

//! Client for Mixergy hot-water tanks.
//!
//! A [`Tank`](tank::Tank) logs in to the Mixergy cloud API, locates a tank by
//! serial number and fetches its latest measurement. Consumers read the
//! cached state through a [`TankView`](state::TankView) and register
//! listeners to be told when a fetch cycle has completed.

pub mod api;
pub mod callbacks;
pub mod config;
pub mod error;
pub mod poll;
pub mod state;
pub mod tank;

pub use error::{Error, Result};
