use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::element::{MediaEvent, PlaybackElement};
use crate::error::GovernorError;

use super::Shared;

/// Running monitoring task; aborted on drop
pub(crate) struct MonitorHandle {
    task: JoinHandle<()>,
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn the poll + event loop for `element` on the current runtime
pub(crate) fn spawn(
    shared: Arc<Shared>,
    element: Arc<dyn PlaybackElement>,
    poll_interval: Duration,
) -> Result<MonitorHandle, GovernorError> {
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| GovernorError::NoRuntime)?;
    let mut events = element.subscribe();

    let task = runtime.spawn(async move {
        tracing::debug!(
            "[Monitor] Started (poll every {}ms, events: {})",
            poll_interval.as_millis(),
            events.is_some()
        );
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => shared.sample(element.as_ref()),
                event = next_event(&mut events) => match event {
                    Some(MediaEvent::Waiting) => {
                        shared.stalled(element.as_ref());
                        shared.sample(element.as_ref());
                    }
                    Some(_) => shared.sample(element.as_ref()),
                    None => {}
                },
            }
        }
    });

    Ok(MonitorHandle { task })
}

/// Next element notification; pends forever once the element stops emitting
async fn next_event(events: &mut Option<broadcast::Receiver<MediaEvent>>) -> Option<MediaEvent> {
    let result = match events.as_mut() {
        Some(rx) => rx.recv().await,
        None => return std::future::pending().await,
    };

    match result {
        Ok(event) => Some(event),
        Err(RecvError::Lagged(skipped)) => {
            tracing::debug!("[Monitor] Skipped {} element events, resampling", skipped);
            Some(MediaEvent::Progress)
        }
        Err(RecvError::Closed) => {
            tracing::debug!("[Monitor] Element event channel closed, polling only");
            *events = None;
            None
        }
    }
}
