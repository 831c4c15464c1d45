//! Command dispatcher
//!
//! Serializes commands onto the link. Fire-and-forget commands are written
//! straight through; commands that wait for a reply pass through an async
//! gate so at most one is outstanding, and are resolved by the next decoded
//! event whatever its kind.

use super::connection::ConnectionManager;
use dipcoat_core::{ControllerError, ParsedEvent, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// The single command awaiting a reply
#[derive(Debug)]
pub struct PendingCommand {
    /// Command text as written
    pub command: String,
    /// When the command was registered
    pub submitted_at: Instant,
    /// How long the caller waits
    pub timeout: Duration,
    responder: oneshot::Sender<ParsedEvent>,
}

impl PendingCommand {
    /// Time since the command was registered
    pub fn elapsed(&self) -> Duration {
        self.submitted_at.elapsed()
    }
}

/// Writes commands and correlates replies
pub struct CommandDispatcher {
    connection: Arc<ConnectionManager>,
    pending: Mutex<Option<PendingCommand>>,
    gate: tokio::sync::Mutex<()>,
}

impl CommandDispatcher {
    /// Create a dispatcher writing through `connection`
    pub fn new(connection: Arc<ConnectionManager>) -> Self {
        Self {
            connection,
            pending: Mutex::new(None),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Connection the dispatcher writes through
    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    /// Send `command`
    ///
    /// With `wait == false` this returns once the line is written. Otherwise
    /// it returns the next event decoded after the write, or `ResponseTimeout`
    /// when nothing arrives within `timeout`. A timeout leaves the link open.
    pub async fn send(
        &self,
        command: &str,
        wait: bool,
        timeout: Duration,
    ) -> Result<Option<ParsedEvent>> {
        if !self.connection.is_connected() {
            return Err(ControllerError::NotConnected.into());
        }

        if !wait {
            self.connection.write_line(command)?;
            return Ok(None);
        }

        let _gate = self.gate.lock().await;
        let (tx, rx) = oneshot::channel();
        *self.pending.lock() = Some(PendingCommand {
            command: command.to_string(),
            submitted_at: Instant::now(),
            timeout,
            responder: tx,
        });

        if let Err(e) = self.connection.write_line(command) {
            self.pending.lock().take();
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(event)) => {
                tracing::debug!("'{}' answered by {}", command, event);
                Ok(Some(event))
            }
            Ok(Err(_)) => Err(ControllerError::NotConnected.into()),
            Err(_) => {
                self.pending.lock().take();
                tracing::debug!("'{}' timed out after {}ms", command, timeout.as_millis());
                Err(ControllerError::ResponseTimeout {
                    command: command.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }
                .into())
            }
        }
    }

    /// Hand a decoded event to the waiting command, if any
    ///
    /// Returns whether a waiter was resolved.
    pub fn resolve(&self, event: &ParsedEvent) -> bool {
        let Some(pending) = self.pending.lock().take() else {
            return false;
        };
        tracing::trace!(
            "Resolving '{}' after {}ms",
            pending.command,
            pending.elapsed().as_millis()
        );
        pending.responder.send(event.clone()).is_ok()
    }

    /// Release the waiting command with `NotConnected`
    pub fn cancel_pending(&self) {
        if let Some(pending) = self.pending.lock().take() {
            tracing::debug!("Cancelling '{}', link closed", pending.command);
        }
    }

    /// Command currently awaiting a reply
    pub fn pending_command(&self) -> Option<String> {
        self.pending.lock().as_ref().map(|p| p.command.clone())
    }
}
