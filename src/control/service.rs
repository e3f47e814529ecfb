use std::time::Duration;

use anyhow::Result;
use tokio::time;
use tracing::{error, info};

use crate::{
    kasa::{models::RelayState, SmartPlug},
    notify::Notifier,
    tado::HumiditySensor,
};

/// One-shot orchestration of the humidity → dehumidifier decision.
///
/// Generic over its collaborators so the decision sequence can be exercised
/// against fakes; production wiring uses `TadoClient`, `KasaClient`, and
/// `EmailNotifier`.
pub struct ControlService<S, P, N> {
    sensor: S,
    plug: P,
    notifier: N,
    humidity_threshold: f64,
    current_alert: f64,
    settle_delay: Duration,
}

impl<S, P, N> ControlService<S, P, N>
where
    S: HumiditySensor,
    P: SmartPlug,
    N: Notifier,
{
    pub fn new(
        sensor: S,
        plug: P,
        notifier: N,
        humidity_threshold: f64,
        current_alert: f64,
        settle_delay: Duration,
    ) -> Self {
        Self {
            sensor,
            plug,
            notifier,
            humidity_threshold,
            current_alert,
            settle_delay,
        }
    }

    /// Top-level invocation boundary.
    ///
    /// `Ok(Some(status))` — the pass completed. `Ok(None)` — the pass failed
    /// and the operator was notified instead. The error notification itself
    /// is not guarded: if it cannot be delivered, that error surfaces to the
    /// caller.
    pub async fn invoke(&self) -> Result<Option<String>> {
        match self.run_once().await {
            Ok(status) => Ok(Some(status)),
            Err(e) => {
                error!(error = %e, "Control pass failed");
                self.notifier
                    .notify(&format!("Dehumidifier control run failed: {e:#}"))
                    .await?;
                Ok(None)
            }
        }
    }

    /// One decision pass. Reads fresh state, applies the threshold rule, and
    /// returns a status string of the form `"Humidity: <value> <result>"`.
    pub async fn run_once(&self) -> Result<String> {
        let humidity = self.sensor.humidity().await?;
        let relay = self.plug.relay_state().await?;

        info!(
            humidity = %humidity,
            threshold = %self.humidity_threshold,
            relay = ?relay,
            "Control pass readings"
        );

        let result = if humidity > self.humidity_threshold {
            self.above_threshold(humidity, relay).await?
        } else {
            self.at_or_below_threshold(relay).await?
        };

        Ok(format!("Humidity: {humidity} {result}"))
    }

    /// Humidity above threshold: make sure the dehumidifier runs, then
    /// sample its current draw after the settle delay to catch a full
    /// reservoir.
    async fn above_threshold(&self, humidity: f64, relay: RelayState) -> Result<String> {
        // Deliberately unconditional — the alert re-fires on every pass
        // while humidity stays above threshold, even if the plug is already
        // on.
        self.notifier
            .notify(&format!(
                "Humidity is at {humidity}% (threshold {}%); making sure the dehumidifier \
                 is running.",
                self.humidity_threshold
            ))
            .await?;

        let mut result = match relay {
            RelayState::Off => self.plug.set_relay_state(RelayState::On).await?,
            RelayState::On => {
                info!("Dehumidifier already running");
                "already running".to_owned()
            }
        };

        // Let the compressor reach steady-state before sampling its draw.
        time::sleep(self.settle_delay).await;

        let current = self.plug.current_draw().await?;
        info!(current = %current, alert = %self.current_alert, "Post-delay current draw");

        if current < self.current_alert {
            // Switched on but pulling next to nothing: the water shutoff has
            // tripped and the reservoir needs emptying.
            self.notifier
                .notify(&format!(
                    "Dehumidifier is drawing {current} A (alert below {} A). Its reservoir \
                     is full and needs emptying; switching it off.",
                    self.current_alert
                ))
                .await?;
            self.plug.set_relay_state(RelayState::Off).await?;
            result = "reservoir full, switched off".to_owned();
        }

        Ok(result)
    }

    /// Humidity at or below threshold: make sure the dehumidifier is off.
    /// No notification in this branch.
    async fn at_or_below_threshold(&self, relay: RelayState) -> Result<String> {
        Ok(match relay {
            RelayState::On => {
                self.plug.set_relay_state(RelayState::Off).await?;
                "device turned off".to_owned()
            }
            RelayState::Off => "device already off".to_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
