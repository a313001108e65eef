//! Periodic remote health polling

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, timeout};

use crate::ssh::Transport;

use super::health::{HealthSnapshot, STATS_COMMAND};

/// Start polling `transport` for health readings.
///
/// The first tick fires immediately. Each tick is bounded by `tick_timeout`;
/// failed and timed out ticks are skipped. The task runs until aborted or
/// until `report` returns `ControlFlow::Break`.
pub fn spawn_poller<T, F>(
    transport: Arc<T>,
    period: Duration,
    tick_timeout: Duration,
    mut report: F,
) -> JoinHandle<()>
where
    T: Transport,
    F: FnMut(HealthSnapshot) -> ControlFlow<()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match timeout(tick_timeout, transport.exec(STATS_COMMAND)).await {
                Ok(Ok(output)) => {
                    if report(HealthSnapshot::parse(&output)).is_break() {
                        break;
                    }
                }
                Ok(Err(e)) => tracing::debug!("Health poll failed: {}", e),
                Err(_) => tracing::debug!("Health poll timed out after {:?}", tick_timeout),
            }
        }
    })
}
