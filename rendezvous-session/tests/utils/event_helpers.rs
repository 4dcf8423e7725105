use anyhow::{Result, bail};
use rendezvous_core::SignalMessage;
use rendezvous_session::SessionEvent;
use std::time::Duration;
use tokio::sync::mpsc;

/// Timeout for events produced by mocks (ms).
pub const EVENT_TIMEOUT_MS: u64 = 2000;

/// Timeout for a real connection to come up (ms).
pub const CONNECTION_TIMEOUT_MS: u64 = 15000;

/// Quiet period after which an event stream counts as drained (ms).
pub const SETTLE_MS: u64 = 100;

/// Wait for the first event matching `pred`, skipping everything before it.
pub async fn wait_for_event<F>(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    timeout_ms: u64,
    pred: F,
) -> Result<SessionEvent>
where
    F: Fn(&SessionEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);

    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Some(event)) if pred(&event) => return Ok(event),
            Ok(Some(event)) => tracing::trace!("[EventHelper] skipping {:?}", event),
            Ok(None) => bail!("Event stream closed"),
            Err(_) => bail!("Timeout waiting for event"),
        }
    }
}

/// Everything emitted until the stream has been quiet for [`SETTLE_MS`].
pub async fn drain_events(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_millis(SETTLE_MS), events.recv()).await
    {
        seen.push(event);
    }
    seen
}

pub async fn next_signal(
    outbound: &mut mpsc::UnboundedReceiver<SignalMessage>,
) -> Result<SignalMessage> {
    match tokio::time::timeout(Duration::from_millis(EVENT_TIMEOUT_MS), outbound.recv()).await {
        Ok(Some(msg)) => Ok(msg),
        Ok(None) => bail!("Signal channel closed"),
        Err(_) => bail!("Timeout waiting for outbound signal"),
    }
}

/// Outbound messages sent until the link has been quiet for [`SETTLE_MS`].
pub async fn drain_signals(
    outbound: &mut mpsc::UnboundedReceiver<SignalMessage>,
) -> Vec<SignalMessage> {
    let mut seen = Vec::new();
    while let Ok(Some(msg)) =
        tokio::time::timeout(Duration::from_millis(SETTLE_MS), outbound.recv()).await
    {
        seen.push(msg);
    }
    seen
}
