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

use clap::Parser;
use futures::future::join_all;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use mixergy::api::Api;
use mixergy::config::Config;
use mixergy::poll::poll;
use mixergy::tank::Tank;

#[derive(Parser)]
#[clap(author, version)]
struct Args {
    #[clap()]
    config_file: PathBuf,
}

#[cfg(unix)]
async fn wait_shutdown() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    };
    Ok(())
}

#[cfg(not(unix))]
async fn wait_shutdown() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Validate the configuration of a tank before polling starts.
async fn check_tank(tank: &mut Tank) {
    if !tank.test_authentication().await {
        warn!(
            "Could not log in for tank {}; will keep retrying",
            tank.serial_number()
        );
    } else if !tank.test_connection().await {
        warn!(
            "Tank {} not found on the account; will keep retrying",
            tank.serial_number()
        );
    } else {
        info!("Connected to tank {}", tank.serial_number());
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let config: Config = toml::from_str(&std::fs::read_to_string(args.config_file)?)?;
    if config.tanks.is_empty() {
        warn!("No tanks configured");
    }

    let api = Api::new(&config.api)?;
    let token = CancellationToken::new();
    let mut handles = Vec::new();
    for tank_config in &config.tanks {
        let mut tank = Tank::from_config(api.clone(), tank_config, config.poll.policy);
        check_tank(&mut tank).await;

        let view = tank.view().clone();
        tank.register_callback(Arc::new(move || info!("{view}")));

        let interval = config.poll.interval;
        let tank_token = token.clone();
        handles.push(tokio::spawn(async move {
            poll(&mut tank, interval, tank_token).await;
        }));
    }

    wait_shutdown().await?;
    token.cancel();
    for result in join_all(handles).await {
        result?;
    }
    Ok(())
}
