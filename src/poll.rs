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

use async_trait::async_trait;
use log::{info, warn};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::tank::Tank;

/// Something that can be refreshed by one fetch cycle.
#[async_trait]
pub trait Pollable: Send {
    fn name(&self) -> &str;
    async fn fetch_data(&mut self) -> Result<()>;
}

#[async_trait]
impl Pollable for Tank {
    fn name(&self) -> &str {
        self.serial_number()
    }

    async fn fetch_data(&mut self) -> Result<()> {
        Tank::fetch_data(self).await
    }
}

/// Run fetch cycles at a fixed interval until cancelled.
///
/// The first cycle runs immediately. Cycles never overlap: if one overruns
/// the interval, the next is delayed rather than run back-to-back.
pub async fn poll(device: &mut dyn Pollable, interval: Duration, token: CancellationToken) {
    let mut interval = tokio::time::interval(interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }
        let result = tokio::select! {
            _ = token.cancelled() => break,
            result = device.fetch_data() => result,
        };
        if let Err(err) = result {
            warn!("Failed to update tank {}: {err}", device.name());
        }
    }
    info!("Stopped polling tank {}", device.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct Fake {
        calls: usize,
        fail_every: usize,
        stop_after: usize,
        token: CancellationToken,
    }

    #[async_trait]
    impl Pollable for Fake {
        fn name(&self) -> &str {
            "FAKE"
        }

        async fn fetch_data(&mut self) -> Result<()> {
            self.calls += 1;
            if self.calls == self.stop_after {
                self.token.cancel();
            }
            if self.calls % self.fail_every == 0 {
                Err(Error::NotAuthenticated)
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_continues_after_failure() {
        let token = CancellationToken::new();
        let mut fake = Fake {
            calls: 0,
            fail_every: 2,
            stop_after: 5,
            token: token.clone(),
        };
        poll(&mut fake, Duration::from_millis(1), token).await;
        assert_eq!(fake.calls, 5);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let mut fake = Fake {
            calls: 0,
            fail_every: 1,
            stop_after: 0,
            token: token.clone(),
        };
        poll(&mut fake, Duration::from_secs(120), token).await;
        assert_eq!(fake.calls, 0);
    }
}
