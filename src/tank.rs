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

use chrono::Utc;
use log::{debug, info, warn};

use crate::api::{Api, MeasurementResponse, Resource, SettingsResponse, TankList};
use crate::callbacks::{Callback, Callbacks};
use crate::config::{CyclePolicy, TankConfig};
use crate::error::{Error, Result};
use crate::state::{Measurement, TankIdentity, TankView};

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Links discovered on the tank's own resource.
#[derive(Clone, Debug)]
struct TankLinks {
    latest_measurement: String,
    settings: Option<String>,
}

/// Client for a single tank on a Mixergy account.
///
/// Each instance holds its own credentials and bearer token. The token is
/// reacquired at the start of every fetch cycle.
pub struct Tank {
    api: Api,
    credentials: Credentials,
    policy: CyclePolicy,
    token: Option<String>,
    links: Option<TankLinks>,
    view: TankView,
    callbacks: Callbacks,
}

impl Tank {
    pub fn new(
        api: Api,
        credentials: Credentials,
        serial_number: &str,
        policy: CyclePolicy,
    ) -> Self {
        Self {
            api,
            credentials,
            policy,
            token: None,
            links: None,
            view: TankView::new(serial_number),
            callbacks: Callbacks::new(),
        }
    }

    pub fn from_config(api: Api, config: &TankConfig, policy: CyclePolicy) -> Self {
        let credentials = Credentials {
            username: config.username.clone(),
            password: config.password.clone(),
        };
        Self::new(api, credentials, &config.serial_number, policy)
    }

    /// Lower-case serial number, used as a stable identifier.
    pub fn tank_id(&self) -> &str {
        self.view.tank_id()
    }

    /// Upper-case serial number, matched against the account's tank list.
    pub fn serial_number(&self) -> &str {
        self.view.serial_number()
    }

    /// Handle for reading the cached state.
    pub fn view(&self) -> &TankView {
        &self.view
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn token(&self) -> Result<&str> {
        self.token.as_deref().ok_or(Error::NotAuthenticated)
    }

    /// Obtain a new bearer token.
    ///
    /// The token is only replaced if every step succeeds.
    pub async fn authenticate(&mut self) -> Result<()> {
        let root: Resource = self.api.get("root", self.api.root(), None).await?;
        let account_url = root.links.href("root", "account")?;
        debug!("Account URL: {account_url}");

        let account: Resource = self.api.get("account", account_url, None).await?;
        let login_url = account.links.href("account", "login")?;
        debug!("Login URL: {login_url}");

        let token = self
            .api
            .login(login_url, &self.credentials.username, &self.credentials.password)
            .await?;
        self.token = Some(token);
        Ok(())
    }

    /// Locate the tank on the account and record its identity and links.
    pub async fn fetch_tank_information(&mut self) -> Result<()> {
        let token = self.token()?;
        let root: Resource = self.api.get("root", self.api.root(), Some(token)).await?;
        let tanks_url = root.links.href("root", "tanks")?;

        let list: TankList = self.api.get("tanks", tanks_url, Some(token)).await?;
        debug!("Account has {} tank(s)", list.tanks().len());
        let serial_number = self.serial_number();
        let Some(tank) = list
            .tanks()
            .iter()
            .find(|tank| tank.serial_number == serial_number)
        else {
            warn!("Could not find a tank with the serial number {serial_number}");
            return Err(Error::TankNotFound(serial_number.to_owned()));
        };
        info!("Found tank {serial_number}");

        let identity = TankIdentity {
            model_code: tank.tank_model_code.clone(),
            firmware_version: tank.firmware_version.clone(),
        };
        self.view.update(|state| state.identity = Some(identity));

        let tank_url = tank.links.href("tank", "self")?;
        let detail: Resource = self.api.get("tank details", tank_url, Some(token)).await?;
        let links = TankLinks {
            latest_measurement: detail
                .links
                .href("tank details", "latest_measurement")?
                .to_owned(),
            settings: detail
                .links
                .href("tank details", "settings")
                .ok()
                .map(str::to_owned),
        };
        debug!("Measurement URL is {}", links.latest_measurement);
        self.links = Some(links);
        Ok(())
    }

    fn links(&self) -> Result<&TankLinks> {
        self.links
            .as_ref()
            .ok_or_else(|| Error::TankNotLocated(self.serial_number().to_owned()))
    }

    /// Fetch the latest measurement and replace the cached one.
    ///
    /// On failure the cached measurement is left exactly as it was.
    pub async fn fetch_last_measurement(&mut self) -> Result<()> {
        let token = self.token()?;
        let url = &self.links()?.latest_measurement;
        let response: MeasurementResponse =
            self.api.get("latest measurement", url, Some(token)).await?;
        debug!("{response:?}");
        let measurement = Measurement::from_response(&response, Utc::now());
        self.view
            .update(|state| state.measurement = Some(measurement));
        Ok(())
    }

    /// Fetch the tank settings, if the tank advertises them.
    pub async fn fetch_settings(&mut self) -> Result<()> {
        let token = self.token()?;
        let Some(url) = &self.links()?.settings else {
            return Ok(());
        };
        let settings: SettingsResponse = self.api.get("settings", url, Some(token)).await?;
        self.view
            .update(|state| state.target_temperature = settings.max_temp);
        Ok(())
    }

    async fn fetch_settings_logged(&mut self) {
        if let Err(err) = self.fetch_settings().await {
            warn!("Failed to fetch settings for tank {}: {err}", self.serial_number());
        }
    }

    async fn cycle_fail_fast(&mut self) -> Result<()> {
        self.authenticate().await?;
        self.fetch_tank_information().await?;
        self.fetch_last_measurement().await?;
        self.fetch_settings_logged().await;
        Ok(())
    }

    async fn cycle_lenient(&mut self) -> Result<()> {
        let mut first = None;
        if let Err(err) = self.authenticate().await {
            first.get_or_insert(err);
        }
        if let Err(err) = self.fetch_tank_information().await {
            first.get_or_insert(err);
        }
        if let Err(err) = self.fetch_last_measurement().await {
            first.get_or_insert(err);
        }
        self.fetch_settings_logged().await;
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Run one full fetch cycle and notify listeners.
    ///
    /// With [`CyclePolicy::FailFast`] the cycle stops at the first failing
    /// step and listeners are not notified. With [`CyclePolicy::Lenient`]
    /// every step runs and listeners are always notified, possibly with
    /// stale state. Either way the first error is returned.
    pub async fn fetch_data(&mut self) -> Result<()> {
        info!("Fetching data for tank {}", self.serial_number());
        let result = match self.policy {
            CyclePolicy::FailFast => self.cycle_fail_fast().await,
            CyclePolicy::Lenient => self.cycle_lenient().await,
        };
        let ok = result.is_ok();
        self.view
            .update(|state| state.last_fetch_succeeded = Some(ok));
        match (&result, self.policy) {
            (Ok(()), _) => self.publish_updates(),
            (Err(err), CyclePolicy::Lenient) => {
                warn!(
                    "Fetch cycle for tank {} was incomplete ({err}); publishing possibly stale state",
                    self.serial_number()
                );
                self.publish_updates();
            }
            (Err(_), CyclePolicy::FailFast) => {}
        }
        result
    }

    /// Check the credentials during setup.
    pub async fn test_authentication(&mut self) -> bool {
        self.authenticate().await.is_ok()
    }

    /// Check that the tank can be found on the account during setup.
    pub async fn test_connection(&mut self) -> bool {
        self.fetch_tank_information().await.is_ok()
    }

    pub fn register_callback(&self, callback: Callback) {
        self.callbacks.register(callback);
    }

    pub fn remove_callback(&self, callback: &Callback) {
        self.callbacks.remove(callback);
    }

    pub fn publish_updates(&self) {
        self.callbacks.publish();
    }
}
