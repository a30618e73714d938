use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use heater_core::Controller;

/// Refreshes right away, then once per `period` for as long as the task lives.
pub fn spawn_refresh_loop(controller: Arc<Controller>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let status = controller.refresh().await;
            debug!(
                temp = status.temp,
                desired_temp = status.desired_temp,
                heater_on = status.heater_on,
                "periodic refresh"
            );
        }
    })
}
