//! The round clock.

use crate::hub::HubHandle;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

/// Period between ticks.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Sends a tick to the hub every period until the hub stops.
#[derive(Debug, Clone, Copy)]
pub struct RoundClock {
    period: Duration,
}

impl RoundClock {
    /// A clock with a custom period.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    /// Tick period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start ticking on a new task.
    ///
    /// The first tick fires one period from now.
    #[must_use]
    pub fn spawn(self, hub: HubHandle) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + self.period, self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if hub.tick().await.is_err() {
                    debug!("Hub closed, stopping round clock");
                    break;
                }
            }
        })
    }
}

impl Default for RoundClock {
    fn default() -> Self {
        Self::new(TICK_PERIOD)
    }
}
