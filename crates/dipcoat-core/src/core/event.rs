//! Event system for controller communication
//!
//! Provides:
//! - `ParsedEvent`, the typed form of one line received from the firmware
//! - `ControllerEvent`, everything published to collaborators
//! - `EventDispatcher` for publishing events to subscribers

use crate::data::{Axis, DeviceMode, DeviceStateSnapshot, HomeStatus, LimitSide, StatusSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Classification of a received line, carrying only the fields relevant to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventKind {
    /// Firmware switched mode
    Mode {
        /// New mode
        mode: DeviceMode,
    },
    /// Home search progress; `axis` is `None` for the whole-sequence completion
    Home {
        /// Axis concerned, if any
        axis: Option<Axis>,
        /// Search progress
        status: HomeStatus,
    },
    /// A limit switch tripped
    Limit {
        /// Axis concerned
        axis: Axis,
        /// Which switch
        side: LimitSide,
    },
    /// Absolute position report
    Position {
        /// Axis concerned
        axis: Axis,
        /// Position in steps
        position: i64,
    },
    /// Motion started or was interrupted
    Movement {
        /// Axis concerned
        axis: Axis,
        /// Motion stopped before completion
        interrupted: bool,
    },
    /// Emergency stop engaged or released
    Emergency {
        /// Emergency stop engaged
        active: bool,
    },
    /// Partial or full status report
    Status {
        /// Reported fields
        snapshot: StatusSnapshot,
    },
    /// Firmware-reported error
    Error {
        /// Text following `Error:`
        message: String,
    },
    /// Any other informational line
    Message,
}

impl EventKind {
    /// Short tag name, useful for logging
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Mode { .. } => "mode",
            Self::Home { .. } => "home",
            Self::Limit { .. } => "limit",
            Self::Position { .. } => "position",
            Self::Movement { .. } => "movement",
            Self::Emergency { .. } => "emergency",
            Self::Status { .. } => "status",
            Self::Error { .. } => "error",
            Self::Message => "message",
        }
    }
}

/// One decoded line from the firmware
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedEvent {
    /// Classification and payload
    #[serde(flatten)]
    pub kind: EventKind,
    /// The line as received (trimmed)
    pub raw: String,
    /// When the line was received
    pub received_at: DateTime<Utc>,
}

impl ParsedEvent {
    /// Create an event received now
    pub fn new(kind: EventKind, raw: impl Into<String>) -> Self {
        Self::at(kind, raw, Utc::now())
    }

    /// Create an event with an explicit receipt time
    pub fn at(kind: EventKind, raw: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            raw: raw.into(),
            received_at,
        }
    }
}

impl std::fmt::Display for ParsedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind.tag(), self.raw)
    }
}

/// Controller event types
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// A line was received and decoded
    Parsed(ParsedEvent),
    /// Mirrored state changed
    StateChanged(DeviceStateSnapshot),
    /// Serial link opened
    Connected {
        /// Port name
        port: String,
        /// Baud rate
        baud_rate: u32,
    },
    /// Serial link closed
    Disconnected {
        /// The close was not requested by the caller
        unexpected: bool,
    },
    /// A reconnection attempt was scheduled
    ReconnectScheduled {
        /// Delay before the attempt
        delay_ms: u64,
    },
    /// A reconnection attempt failed; another will be scheduled
    ReconnectFailed {
        /// Why the attempt failed
        reason: String,
    },
}

impl std::fmt::Display for ControllerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerEvent::Parsed(event) => write!(f, "Received {}", event),
            ControllerEvent::StateChanged(snapshot) => write!(
                f,
                "State: mode={} Y={} Z={} emergency={}",
                snapshot.device.mode,
                snapshot.device.axis_y.position,
                snapshot.device.axis_z.position,
                snapshot.device.emergency_stop
            ),
            ControllerEvent::Connected { port, baud_rate } => {
                write!(f, "Connected to {} at {} baud", port, baud_rate)
            }
            ControllerEvent::Disconnected { unexpected } => {
                if *unexpected {
                    write!(f, "Connection lost")
                } else {
                    write!(f, "Disconnected")
                }
            }
            ControllerEvent::ReconnectScheduled { delay_ms } => {
                write!(f, "Reconnecting in {}ms", delay_ms)
            }
            ControllerEvent::ReconnectFailed { reason } => {
                write!(f, "Reconnect failed: {}", reason)
            }
        }
    }
}

/// Event dispatcher for publishing events to subscribers
///
/// Every subscriber sees events in publish order. A subscriber that falls more
/// than `buffer_size` events behind receives `RecvError::Lagged`.
#[derive(Clone)]
pub struct EventDispatcher {
    /// Broadcast sender channel for controller events.
    tx: broadcast::Sender<ControllerEvent>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    ///
    /// # Arguments
    /// * `buffer_size` - Size of the broadcast buffer (default 1024)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size.max(1));
        Self { tx }
    }

    /// Subscribe to events; drop the receiver to unsubscribe
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of subscribers reached; publishing with nobody
    /// listening is not an error.
    pub fn publish(&self, event: ControllerEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_in_order() {
        let dispatcher = EventDispatcher::new(8);
        let mut rx = dispatcher.subscribe();
        assert_eq!(dispatcher.subscriber_count(), 1);

        dispatcher.publish(ControllerEvent::ReconnectScheduled { delay_ms: 1 });
        dispatcher.publish(ControllerEvent::Disconnected { unexpected: true });

        assert!(matches!(
            rx.recv().await.unwrap(),
            ControllerEvent::ReconnectScheduled { delay_ms: 1 }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            ControllerEvent::Disconnected { unexpected: true }
        ));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let dispatcher = EventDispatcher::default();
        assert_eq!(
            dispatcher.publish(ControllerEvent::Disconnected { unexpected: false }),
            0
        );
    }

    #[test]
    fn test_parsed_event_serializes_tagged() {
        let event = ParsedEvent::new(
            EventKind::Position {
                axis: Axis::Y,
                position: 1500,
            },
            "Y: 1500",
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "position");
        assert_eq!(value["axis"], "Y");
        assert_eq!(value["position"], 1500);
        assert_eq!(value["raw"], "Y: 1500");
        assert!(value.get("receivedAt").is_some());
    }
}
