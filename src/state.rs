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

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::api::{CurrentState, MeasurementResponse};

/// Rated power of the immersion heater.
pub const IMMERSION_POWER: f64 = 3300.0; // W
/// Below this charge the tank is considered low.
pub const LOW_CHARGE: f64 = 5.0; // %
/// Below this charge the tank is considered empty.
pub const NO_CHARGE: f64 = 0.5; // %

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HeatSource {
    Indirect,
    Electric,
    HeatPump,
    Other(String),
}

impl HeatSource {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "indirect" => Self::Indirect,
            "electric" => Self::Electric,
            "heatpump" | "heat_pump" => Self::HeatPump,
            _ => Self::Other(raw.to_owned()),
        }
    }
}

/// What asked the tank to charge.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChargeSource {
    Schedule,
    /// A one-off boost.
    Manual,
    /// Holiday mode.
    Vacation,
    Cleansing,
    Other(String),
}

impl ChargeSource {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "schedule" => Self::Schedule,
            "manual" => Self::Manual,
            "vacation" => Self::Vacation,
            "cleansing" => Self::Cleansing,
            _ => Self::Other(raw.to_owned()),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TankIdentity {
    pub model_code: String,
    pub firmware_version: String,
}

/// One latest-measurement response. Always replaced as a whole.
#[derive(Clone, Debug, PartialEq)]
pub struct Measurement {
    pub hot_water_temperature: f64,     // °C
    pub coldest_water_temperature: f64, // °C
    pub charge: f64,                    // %
    pub target_charge: Option<f64>,     // %
    pub heat_source: Option<HeatSource>,
    pub electric_heat: bool,
    pub source: Option<ChargeSource>,
    pub time: DateTime<Utc>,
}

impl Measurement {
    pub fn from_response(response: &MeasurementResponse, time: DateTime<Utc>) -> Self {
        let current = response.current_state().unwrap_or_default();
        let CurrentState {
            target,
            source,
            immersion,
            heat_source,
        } = current;
        Self {
            hot_water_temperature: response.top_temperature,
            coldest_water_temperature: response.bottom_temperature,
            charge: response.charge,
            target_charge: target,
            heat_source: heat_source.as_deref().map(HeatSource::parse),
            electric_heat: immersion.is_some_and(|x| x.eq_ignore_ascii_case("on")),
            source: source.as_deref().map(ChargeSource::parse),
            time,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TankState {
    pub identity: Option<TankIdentity>,
    pub measurement: Option<Measurement>,
    pub target_temperature: Option<f64>,
    pub last_fetch_succeeded: Option<bool>,
}

/// Read-only handle onto a tank's cached state.
///
/// Clones are cheap and observe the same state, so listeners can hold one
/// while the poll task owns the [`Tank`](crate::tank::Tank).
#[derive(Clone)]
pub struct TankView {
    tank_id: String,
    serial_number: String,
    state: Arc<Mutex<TankState>>,
}

impl TankView {
    pub(crate) fn new(serial_number: &str) -> Self {
        Self {
            tank_id: serial_number.to_lowercase(),
            serial_number: serial_number.to_uppercase(),
            state: Arc::default(),
        }
    }

    pub(crate) fn update(&self, apply: impl FnOnce(&mut TankState)) {
        apply(&mut self.state.lock().unwrap());
    }

    /// Copy of the full cached state.
    pub fn snapshot(&self) -> TankState {
        self.state.lock().unwrap().clone()
    }

    fn with_measurement<T>(&self, get: impl FnOnce(&Measurement) -> T) -> Option<T> {
        self.state.lock().unwrap().measurement.as_ref().map(get)
    }

    fn with_source(&self, source: ChargeSource) -> bool {
        self.with_measurement(|m| m.source.as_ref() == Some(&source))
            .unwrap_or(false)
    }

    fn with_heat_source(&self, heat_source: HeatSource) -> bool {
        self.with_measurement(|m| m.heat_source.as_ref() == Some(&heat_source))
            .unwrap_or(false)
    }

    pub fn tank_id(&self) -> &str {
        &self.tank_id
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// Always true: availability is not derived from fetch results. See
    /// [`last_fetch_succeeded`](Self::last_fetch_succeeded) for that.
    pub fn online(&self) -> bool {
        true
    }

    /// Outcome of the most recent fetch cycle, or None before the first.
    pub fn last_fetch_succeeded(&self) -> Option<bool> {
        self.state.lock().unwrap().last_fetch_succeeded
    }

    pub fn model(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.identity.as_ref().map(|i| i.model_code.clone())
    }

    pub fn firmware_version(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.identity.as_ref().map(|i| i.firmware_version.clone())
    }

    pub fn hot_water_temperature(&self) -> Option<f64> {
        self.with_measurement(|m| m.hot_water_temperature)
    }

    pub fn coldest_water_temperature(&self) -> Option<f64> {
        self.with_measurement(|m| m.coldest_water_temperature)
    }

    pub fn charge(&self) -> Option<f64> {
        self.with_measurement(|m| m.charge)
    }

    pub fn target_charge(&self) -> Option<f64> {
        self.with_measurement(|m| m.target_charge).flatten()
    }

    pub fn target_temperature(&self) -> Option<f64> {
        self.state.lock().unwrap().target_temperature
    }

    pub fn heat_source(&self) -> Option<HeatSource> {
        self.with_measurement(|m| m.heat_source.clone()).flatten()
    }

    pub fn electric_heat(&self) -> bool {
        self.with_measurement(|m| m.electric_heat).unwrap_or(false)
    }

    pub fn indirect_heat(&self) -> bool {
        self.with_heat_source(HeatSource::Indirect)
    }

    pub fn heatpump_heat(&self) -> bool {
        self.with_heat_source(HeatSource::HeatPump)
    }

    pub fn in_holiday_mode(&self) -> bool {
        self.with_source(ChargeSource::Vacation)
    }

    pub fn in_boost_mode(&self) -> bool {
        self.with_source(ChargeSource::Manual)
    }

    pub fn in_autoschedule_mode(&self) -> bool {
        self.with_source(ChargeSource::Schedule)
    }

    pub fn in_cleansing_mode(&self) -> bool {
        self.with_source(ChargeSource::Cleansing)
    }

    pub fn low_charge(&self) -> Option<bool> {
        self.charge().map(|c| c < LOW_CHARGE)
    }

    pub fn no_charge(&self) -> Option<bool> {
        self.charge().map(|c| c < NO_CHARGE)
    }

    /// Power drawn by the immersion heater, in W.
    pub fn electric_heat_power(&self) -> f64 {
        if self.electric_heat() {
            IMMERSION_POWER
        } else {
            0.0
        }
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.with_measurement(|m| m.time)
    }
}

impl fmt::Display for TankView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.snapshot();
        write!(f, "tank {}", self.serial_number)?;
        match &state.measurement {
            Some(m) => {
                write!(
                    f,
                    ": hot {:.1}°C, coldest {:.1}°C, charge {:.1}%",
                    m.hot_water_temperature, m.coldest_water_temperature, m.charge
                )?;
                if let Some(target) = m.target_charge {
                    write!(f, " (target {target:.0}%)")?;
                }
                if m.electric_heat {
                    write!(f, ", immersion on")?;
                }
            }
            None => write!(f, ": no measurement yet")?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(state: Option<&str>) -> MeasurementResponse {
        serde_json::from_value(json!({
            "topTemperature": 55.2,
            "bottomTemperature": 18.0,
            "charge": 72.5,
            "state": state,
        }))
        .unwrap()
    }

    #[test]
    fn test_empty_view() {
        let view = TankView::new("mx1234");
        assert_eq!(view.tank_id(), "mx1234");
        assert_eq!(view.serial_number(), "MX1234");
        assert!(view.online());
        assert_eq!(view.last_fetch_succeeded(), None);
        assert_eq!(view.charge(), None);
        assert_eq!(view.low_charge(), None);
        assert_eq!(view.model(), None);
        assert!(!view.electric_heat());
        assert_eq!(view.electric_heat_power(), 0.0);
        assert_eq!(view.to_string(), "tank MX1234: no measurement yet");
    }

    #[test]
    fn test_measurement_without_state() {
        let m = Measurement::from_response(&response(None), Utc::now());
        assert_eq!(m.hot_water_temperature, 55.2);
        assert_eq!(m.coldest_water_temperature, 18.0);
        assert_eq!(m.charge, 72.5);
        assert_eq!(m.target_charge, None);
        assert_eq!(m.heat_source, None);
        assert!(!m.electric_heat);
        assert_eq!(m.source, None);
    }

    #[test]
    fn test_modes() {
        let state = r#"{"current":{"target":80,"source":"Vacation","immersion":"On","heat_source":"HeatPump"}}"#;
        let view = TankView::new("mx1234");
        let m = Measurement::from_response(&response(Some(state)), Utc::now());
        view.update(|s| s.measurement = Some(m));
        assert_eq!(view.target_charge(), Some(80.0));
        assert!(view.in_holiday_mode());
        assert!(!view.in_boost_mode());
        assert!(!view.in_autoschedule_mode());
        assert!(!view.in_cleansing_mode());
        assert!(view.heatpump_heat());
        assert!(!view.indirect_heat());
        assert!(view.electric_heat());
        assert_eq!(view.electric_heat_power(), IMMERSION_POWER);
        assert_eq!(
            view.to_string(),
            "tank MX1234: hot 55.2°C, coldest 18.0°C, charge 72.5% (target 80%), immersion on"
        );
    }

    #[test]
    fn test_unknown_sources() {
        let state = r#"{"current":{"source":"Frost","heat_source":"Solar"}}"#;
        let m = Measurement::from_response(&response(Some(state)), Utc::now());
        assert_eq!(m.source, Some(ChargeSource::Other("Frost".to_owned())));
        assert_eq!(m.heat_source, Some(HeatSource::Other("Solar".to_owned())));
    }

    #[test]
    fn test_charge_thresholds() {
        let view = TankView::new("mx1234");
        let mut m = Measurement::from_response(&response(None), Utc::now());
        m.charge = 3.0;
        view.update(|s| s.measurement = Some(m.clone()));
        assert_eq!(view.low_charge(), Some(true));
        assert_eq!(view.no_charge(), Some(false));
        m.charge = 0.2;
        view.update(|s| s.measurement = Some(m));
        assert_eq!(view.no_charge(), Some(true));
    }
}
