use crate::error::EventBusError;
use crate::presentation::{PresentationMode, Trigger};
use crate::signal::SignalId;
use serde::Serialize;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Events emitted by a mounted signal screen
#[derive(Debug, Clone, Serialize)]
pub enum SignalEvent {
    /// A signal screen was mounted
    ScreenMounted {
        signal: SignalId,
        timestamp: SystemTime,
    },
    /// The presentation mode changed
    ModeChanged {
        from: PresentationMode,
        to: PresentationMode,
        trigger: Trigger,
        timestamp: SystemTime,
    },
    /// One half of the attention duty cycle elapsed
    DutyCycleTick { color_on: bool, timestamp: SystemTime },
    /// The motion detector accepted a shake
    ShakeDetected { magnitude: f64, timestamp: SystemTime },
    /// The exit affordance was activated
    BackRequested { timestamp: SystemTime },
    /// The screen was torn down
    ScreenUnmounted { timestamp: SystemTime },
}

impl SignalEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SignalEvent::ScreenMounted { signal, .. } => format!("Signal screen mounted: {}", signal),
            SignalEvent::ModeChanged { from, to, trigger, .. } => {
                format!("Mode {:?} -> {:?} ({})", from, to, trigger.as_str())
            }
            SignalEvent::DutyCycleTick { color_on, .. } => {
                format!("Duty cycle {}", if *color_on { "on" } else { "off" })
            }
            SignalEvent::ShakeDetected { magnitude, .. } => {
                format!("Shake detected with magnitude: {:.2}", magnitude)
            }
            SignalEvent::BackRequested { .. } => "Back requested".to_string(),
            SignalEvent::ScreenUnmounted { .. } => "Signal screen unmounted".to_string(),
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            SignalEvent::ScreenMounted { .. } => "screen_mounted",
            SignalEvent::ModeChanged { .. } => "mode_changed",
            SignalEvent::DutyCycleTick { .. } => "duty_cycle_tick",
            SignalEvent::ShakeDetected { .. } => "shake_detected",
            SignalEvent::BackRequested { .. } => "back_requested",
            SignalEvent::ScreenUnmounted { .. } => "screen_unmounted",
        }
    }
}

/// Event bus for observing screen activity using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SignalEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<SignalEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter applied to every received event
    pub fn subscribe_filtered(&self, filter: EventFilter, name: impl Into<String>) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.into())
    }

    /// Publish an event to all subscribers. Never blocks.
    ///
    /// Returns the number of subscribers that received it; zero when nobody
    /// is listening.
    pub fn publish(&self, event: SignalEvent) -> usize {
        match &event {
            SignalEvent::ModeChanged { .. } | SignalEvent::ShakeDetected { .. } => {
                info!("{}", event.description());
            }
            _ => debug!("Event: {}", event.description()),
        }

        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &SignalEvent) -> bool {
        match self {
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<SignalEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(receiver: broadcast::Receiver<SignalEvent>, filter: EventFilter, name: String) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<SignalEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!("Receiver '{}' received event: {}", self.name, event.description());
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<SignalEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::new(4);
        let delivered = bus.publish(SignalEvent::BackRequested {
            timestamp: SystemTime::now(),
        });
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_filtered_receiver_skips_other_events() {
        let bus = EventBus::new(10);
        let mut receiver =
            bus.subscribe_filtered(EventFilter::EventTypes(vec!["shake_detected"]), "test");

        bus.publish(SignalEvent::DutyCycleTick {
            color_on: false,
            timestamp: SystemTime::now(),
        });
        bus.publish(SignalEvent::ShakeDetected {
            magnitude: 31.5,
            timestamp: SystemTime::now(),
        });

        match receiver.recv().await.unwrap() {
            SignalEvent::ShakeDetected { magnitude, .. } => assert_eq!(magnitude, 31.5),
            other => panic!("Unexpected event: {:?}", other),
        }
        assert!(receiver.try_recv().unwrap().is_none());
    }
}
