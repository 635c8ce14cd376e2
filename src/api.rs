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

//! Access to the Mixergy HAL API.
//!
//! Only the root URL is fixed. Every other endpoint is discovered by
//! following `_links` from the responses.

use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::ApiConfig;
use crate::error::{Error, Result};

pub const ROOT_ENDPOINT: &str = "https://www.mixergy.io/api/v2";

#[derive(Clone, Debug, Deserialize)]
pub struct Link {
    pub href: String,
}

/// A link relation holds either a single link or an array of them.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum Relation {
    One(Link),
    Many(Vec<Link>),
}

impl Relation {
    fn first(&self) -> Option<&Link> {
        match self {
            Self::One(link) => Some(link),
            Self::Many(links) => links.first(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Links(HashMap<String, Relation>);

impl Links {
    /// Look up the target of a link relation.
    ///
    /// For an array-valued relation the first link is used. `what` names the
    /// resource the links came from, for error reporting.
    pub fn href(&self, what: &'static str, rel: &str) -> Result<&str> {
        self.0
            .get(rel)
            .and_then(Relation::first)
            .map(|link| link.href.as_str())
            .ok_or_else(|| Error::MissingLink {
                what,
                rel: rel.to_owned(),
            })
    }
}

/// Any resource, of which only the links are of interest.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Resource {
    #[serde(rename = "_links", default)]
    pub links: Links,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TankSummary {
    pub serial_number: String,
    #[serde(default)]
    pub firmware_version: String,
    #[serde(default)]
    pub tank_model_code: String,
    #[serde(rename = "_links", default)]
    pub links: Links,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmbeddedTanks {
    tank_list: Vec<TankSummary>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TankList {
    #[serde(rename = "_embedded")]
    embedded: EmbeddedTanks,
}

impl TankList {
    pub fn tanks(&self) -> &[TankSummary] {
        &self.embedded.tank_list
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementResponse {
    pub top_temperature: f64,
    pub bottom_temperature: f64,
    pub charge: f64,
    /// Controller state, itself encoded as a JSON string.
    #[serde(default)]
    pub state: Option<String>,
}

/// The `current` part of the controller state.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CurrentState {
    pub target: Option<f64>,
    pub source: Option<String>,
    pub immersion: Option<String>,
    pub heat_source: Option<String>,
}

#[derive(Deserialize)]
struct ControllerState {
    #[serde(default)]
    current: CurrentState,
}

impl MeasurementResponse {
    /// Decode the nested controller state.
    ///
    /// Returns None if there is no state or it cannot be decoded.
    pub fn current_state(&self) -> Option<CurrentState> {
        let raw = self.state.as_deref()?;
        match serde_json::from_str::<ControllerState>(raw) {
            Ok(state) => Some(state.current),
            Err(err) => {
                debug!("Ignoring undecodable controller state {raw:?}: {err}");
                None
            }
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SettingsResponse {
    pub max_temp: Option<f64>,
}

#[derive(Clone)]
pub struct Api {
    root: String,
    client: Client,
}

impl Api {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        if config.accept_invalid_certs {
            warn!("TLS certificate verification is disabled for {}", config.root_url);
        }
        let client = reqwest::ClientBuilder::new()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(Error::Client)?;
        Ok(Self {
            root: config.root_url.clone(),
            client,
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// GET a JSON resource, requiring a 200 response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        what: &'static str,
        url: &str,
        token: Option<&str>,
    ) -> Result<T> {
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|source| {
            warn!("Fetch of {what} at {url} failed: {source}");
            Error::Transport {
                what,
                url: url.to_owned(),
                source,
            }
        })?;
        let response = check_status(what, url, response, StatusCode::OK)?;
        decode(what, url, response).await
    }

    /// POST credentials to the login link and return the bearer token.
    pub async fn login(&self, url: &str, username: &str, password: &str) -> Result<String> {
        const WHAT: &str = "login";
        let response = self
            .client
            .post(url)
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|source| {
                warn!("Authentication at {url} failed: {source}");
                Error::Transport {
                    what: WHAT,
                    url: url.to_owned(),
                    source,
                }
            })?;
        let response = check_status(WHAT, url, response, StatusCode::CREATED)?;
        let login: LoginResponse = decode(WHAT, url, response).await?;
        Ok(login.token)
    }
}

fn check_status(
    what: &'static str,
    url: &str,
    response: reqwest::Response,
    expected: StatusCode,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status == expected {
        Ok(response)
    } else {
        warn!(
            "Fetch of {what} at {url} failed with status code {}",
            status.as_u16()
        );
        Err(Error::Status {
            what,
            url: url.to_owned(),
            status,
        })
    }
}

async fn decode<T: DeserializeOwned>(
    what: &'static str,
    url: &str,
    response: reqwest::Response,
) -> Result<T> {
    response.json().await.map_err(|source| {
        warn!("Could not decode {what} from {url}: {source}");
        Error::Decode {
            what,
            url: url.to_owned(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn api(server: &Server) -> Api {
        Api::new(&ApiConfig {
            root_url: server.url(),
            ..ApiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_decode_tank_list() {
        let list: TankList = serde_json::from_value(json!({
            "_embedded": {
                "tankList": [
                    {
                        "serialNumber": "AB123",
                        "firmwareVersion": "1.2.3",
                        "tankModelCode": "MX300",
                        "_links": {"self": {"href": "https://example.com/tanks/1"}}
                    },
                    {"serialNumber": "CD456"}
                ]
            }
        }))
        .unwrap();
        let tanks = list.tanks();
        assert_eq!(tanks.len(), 2);
        assert_eq!(tanks[0].tank_model_code, "MX300");
        assert_eq!(
            tanks[0].links.href("tank", "self").unwrap(),
            "https://example.com/tanks/1"
        );
        assert_eq!(tanks[1].firmware_version, "");
        assert!(matches!(
            tanks[1].links.href("tank", "self"),
            Err(Error::MissingLink { .. })
        ));
    }

    #[test]
    fn test_array_valued_relation() {
        let resource: Resource = serde_json::from_value(json!({
            "_links": {
                "tanks": {"href": "https://example.com/tanks"},
                "curies": [{"name": "mx", "href": "https://example.com/rels/{rel}", "templated": true}],
                "alternate": [
                    {"href": "https://example.com/a"},
                    {"href": "https://example.com/b"}
                ],
                "empty": []
            }
        }))
        .unwrap();
        assert_eq!(
            resource.links.href("root", "tanks").unwrap(),
            "https://example.com/tanks"
        );
        assert_eq!(
            resource.links.href("root", "alternate").unwrap(),
            "https://example.com/a"
        );
        assert!(matches!(
            resource.links.href("root", "empty"),
            Err(Error::MissingLink { .. })
        ));
    }

    #[test]
    fn test_current_state() {
        let measurement: MeasurementResponse = serde_json::from_value(json!({
            "topTemperature": 55.2,
            "bottomTemperature": 18.0,
            "charge": 72.5,
            "state": "{\"current\":{\"target\":100,\"source\":\"Schedule\",\"immersion\":\"On\",\"heat_source\":\"Electric\"}}"
        }))
        .unwrap();
        assert_eq!(
            measurement.current_state(),
            Some(CurrentState {
                target: Some(100.0),
                source: Some("Schedule".to_owned()),
                immersion: Some("On".to_owned()),
                heat_source: Some("Electric".to_owned()),
            })
        );
    }

    #[test]
    fn test_current_state_invalid() {
        let measurement: MeasurementResponse = serde_json::from_value(json!({
            "topTemperature": 55.2,
            "bottomTemperature": 18.0,
            "charge": 72.5,
            "state": "not json"
        }))
        .unwrap();
        assert_eq!(measurement.current_state(), None);
    }

    #[tokio::test]
    async fn test_get_sends_bearer_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_header("authorization", "Bearer t1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"_links": {"tanks": {"href": "/tanks"}}}).to_string())
            .create_async()
            .await;
        let api = api(&server);
        let root: Resource = api.get("root", api.root(), Some("t1")).await.unwrap();
        assert_eq!(root.links.href("root", "tanks").unwrap(), "/tanks");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_bad_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .with_status(503)
            .create_async()
            .await;
        let api = api(&server);
        let result = api.get::<Resource>("root", api.root(), None).await;
        match result {
            Err(Error::Status { what, status, .. }) => {
                assert_eq!(what, "root");
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_login() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/login")
            .match_body(Matcher::Json(json!({"username": "user", "password": "pass"})))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(json!({"token": "t1"}).to_string())
            .create_async()
            .await;
        let api = api(&server);
        let url = format!("{}/login", server.url());
        assert_eq!(api.login(&url, "user", "pass").await.unwrap(), "t1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_login_requires_created() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/login")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"token": "t1"}).to_string())
            .create_async()
            .await;
        let api = api(&server);
        let url = format!("{}/login", server.url());
        assert!(matches!(
            api.login(&url, "user", "pass").await,
            Err(Error::Status { .. })
        ));
    }
}
