//! Dip coater controller
//!
//! Implements [`DeviceController`] on top of the connection manager and the
//! command dispatcher. Every received line is decoded, folded into the
//! mirrored state and published as `Parsed` followed by `StateChanged`.
//!
//! Safety preconditions (emergency stop, limit switches, argument checks) are
//! evaluated against the mirrored state before anything is written.

use super::command_creator::{steps_from_f64, DeviceCommand};
use super::response_parser;
use super::state_machine::apply_event;
use crate::communication::{
    CommandDispatcher, ConnectionConfig, ConnectionHandle, ConnectionManager, LinkHandler,
    SerialPortInfo, SerialPortProvider, SystemSerialPorts,
};
use async_trait::async_trait;
use dipcoat_core::{
    Axis, ControllerError, ControllerEvent, DeviceController, DeviceState, DeviceStateSnapshot,
    Error, EventDispatcher, ParsedEvent, RecipeParameters, Result,
};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;

/// Controller timing and link configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Serial link settings
    pub connection: ConnectionConfig,
    /// Wait for replies to mode changes and version requests
    pub response_timeout: Duration,
    /// Wait for a status reply
    pub status_timeout: Duration,
    /// Wait for the first reply to a home request
    pub home_timeout: Duration,
    /// Capacity of the event channel
    pub event_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            response_timeout: Duration::from_millis(5000),
            status_timeout: Duration::from_millis(2000),
            home_timeout: Duration::from_millis(30000),
            event_capacity: 1024,
        }
    }
}

struct Shared {
    me: Weak<Shared>,
    config: ControllerConfig,
    connection: Arc<ConnectionManager>,
    dispatcher: CommandDispatcher,
    state: Mutex<DeviceState>,
    events: EventDispatcher,
}

/// Controller for the dip coater firmware
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct DipCoaterController {
    shared: Arc<Shared>,
}

impl DipCoaterController {
    /// Create a controller using the system's serial ports
    pub fn new(config: ControllerConfig) -> Self {
        Self::with_provider(Arc::new(SystemSerialPorts), config)
    }

    /// Create a controller on a custom port provider
    pub fn with_provider(provider: Arc<dyn SerialPortProvider>, config: ControllerConfig) -> Self {
        let connection = ConnectionManager::new(provider, config.connection.clone());
        let events = EventDispatcher::new(config.event_capacity);

        let shared = Arc::new_cyclic(|me| Shared {
            me: me.clone(),
            dispatcher: CommandDispatcher::new(connection.clone()),
            connection,
            state: Mutex::new(DeviceState::new()),
            events,
            config,
        });

        let handler: Weak<dyn LinkHandler> = Arc::downgrade(&shared) as Weak<dyn LinkHandler>;
        shared.connection.set_handler(handler);

        Self { shared }
    }

    /// Controller configuration
    pub fn config(&self) -> &ControllerConfig {
        &self.shared.config
    }

    /// Connection manager owning the link
    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.shared.connection
    }

    /// Ports visible to the controller's provider
    pub fn list_ports(&self) -> Result<Vec<SerialPortInfo>> {
        self.shared.connection.list_ports()
    }

    /// Mirrored device state without link information
    pub fn device_state(&self) -> DeviceState {
        self.shared.state.lock().clone()
    }

    /// Ask the firmware for its version, returning the reply
    pub async fn request_version(&self) -> Result<ParsedEvent> {
        self.shared.request_version().await
    }

    /// Send a console line as-is
    ///
    /// The line must be non-empty and must not contain line breaks.
    pub async fn send_raw(&self, text: &str) -> Result<()> {
        self.shared.send_raw(text).await
    }
}

#[async_trait]
impl DeviceController for DipCoaterController {
    async fn connect(&self, port: Option<String>) -> Result<()> {
        self.shared.connect(port).await
    }

    async fn disconnect(&self) {
        self.shared.connection.disconnect().await;
    }

    async fn set_mode_manual(&self) -> Result<()> {
        self.shared.set_mode(DeviceCommand::ManualMode).await
    }

    async fn set_mode_automatic(&self) -> Result<()> {
        self.shared.set_mode(DeviceCommand::AutomaticMode).await
    }

    async fn execute_home(&self) -> Result<()> {
        self.shared.execute_home().await
    }

    async fn move_axis(&self, axis: Axis, steps: f64) -> Result<()> {
        self.shared.move_axis(axis, steps).await
    }

    async fn emergency_stop(&self) -> Result<()> {
        tracing::warn!("Emergency stop requested");
        self.shared.fire(DeviceCommand::Stop).await
    }

    async fn start_recipe(&self, params: RecipeParameters) -> Result<()> {
        self.shared.start_recipe(params).await
    }

    async fn pause_process(&self) -> Result<()> {
        self.shared.fire(DeviceCommand::Pause).await
    }

    async fn resume_process(&self) -> Result<()> {
        self.shared.fire(DeviceCommand::Resume).await
    }

    async fn request_status(&self) -> Result<()> {
        self.shared.request_status().await
    }

    fn get_state(&self) -> DeviceStateSnapshot {
        let state = self.shared.state.lock();
        self.shared.snapshot_of(&state)
    }

    fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.shared.events.subscribe()
    }
}

impl Shared {
    async fn connect(&self, port: Option<String>) -> Result<()> {
        self.connection.connect(port).await?;
        if let Err(e) = self.request_status().await {
            tracing::warn!("Initial status request failed: {}", e);
        }
        Ok(())
    }

    async fn send(
        &self,
        command: &DeviceCommand,
        wait: bool,
        timeout: Duration,
    ) -> Result<Option<ParsedEvent>> {
        let line = command.encode()?;
        tracing::debug!("Sending {}", command);
        self.dispatcher.send(&line, wait, timeout).await
    }

    async fn fire(&self, command: DeviceCommand) -> Result<()> {
        self.send(&command, false, Duration::ZERO).await.map(|_| ())
    }

    async fn set_mode(&self, command: DeviceCommand) -> Result<()> {
        self.send(&command, true, self.config.response_timeout)
            .await
            .map(|_| ())
    }

    async fn request_status(&self) -> Result<()> {
        self.send(&DeviceCommand::Status, true, self.config.status_timeout)
            .await
            .map(|_| ())
    }

    async fn request_version(&self) -> Result<ParsedEvent> {
        self.send(&DeviceCommand::Version, true, self.config.response_timeout)
            .await?
            .ok_or_else(|| Error::other("version request returned no reply"))
    }

    async fn send_raw(&self, text: &str) -> Result<()> {
        if text.contains(&['\n', '\r'][..]) {
            return Err(Error::invalid_argument("command must be a single line"));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::invalid_argument("command is empty"));
        }
        tracing::debug!("Sending raw '{}'", text);
        self.dispatcher
            .send(text, false, Duration::ZERO)
            .await
            .map(|_| ())
    }

    async fn execute_home(&self) -> Result<()> {
        // Checked and marked under one lock so a concurrent emergency line
        // cannot slip in before the write.
        self.try_update_state(|state| {
            if state.emergency_stop {
                return Err(ControllerError::EmergencyActive.into());
            }
            self.ensure_connected()?;
            state.axis_y.moving = true;
            state.axis_z.moving = true;
            Ok(())
        })?;

        let result = self
            .send(&DeviceCommand::Home, true, self.config.home_timeout)
            .await;
        if let Err(e) = result {
            tracing::warn!("Home failed: {}", e);
            self.update_state(|state| {
                state.axis_y.moving = false;
                state.axis_z.moving = false;
            });
            return Err(e);
        }
        Ok(())
    }

    async fn move_axis(&self, axis: Axis, steps: f64) -> Result<()> {
        let steps = steps_from_f64(steps)?;
        let previous = self.try_update_state(|state| {
            if state.emergency_stop {
                return Err(ControllerError::EmergencyActive.into());
            }
            if let Some(side) = state.axis(axis).blocking_limit(steps) {
                return Err(ControllerError::LimitReached { axis, side }.into());
            }
            self.ensure_connected()?;
            Ok(std::mem::replace(&mut state.axis_mut(axis).moving, true))
        })?;

        if let Err(e) = self.fire(DeviceCommand::Move { axis, steps }).await {
            self.update_state(|state| state.axis_mut(axis).moving = previous);
            return Err(e);
        }
        Ok(())
    }

    async fn start_recipe(&self, params: RecipeParameters) -> Result<()> {
        self.ensure_connected()?;
        tracing::info!("Starting recipe with {} cycles", params.cycles);
        self.fire(DeviceCommand::StartRecipe(params)).await
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connection.is_connected() {
            Ok(())
        } else {
            Err(ControllerError::NotConnected.into())
        }
    }

    /// Mutate the mirrored state and publish the result
    fn update_state<R>(&self, f: impl FnOnce(&mut DeviceState) -> R) -> R {
        let mut state = self.state.lock();
        let result = f(&mut state);
        self.events
            .publish(ControllerEvent::StateChanged(self.snapshot_of(&state)));
        result
    }

    /// Like [`update_state`](Self::update_state), but publishes only on success
    ///
    /// On error the closure must leave the state untouched.
    fn try_update_state<R>(&self, f: impl FnOnce(&mut DeviceState) -> Result<R>) -> Result<R> {
        let mut state = self.state.lock();
        let result = f(&mut state)?;
        self.events
            .publish(ControllerEvent::StateChanged(self.snapshot_of(&state)));
        Ok(result)
    }

    fn snapshot_of(&self, state: &DeviceState) -> DeviceStateSnapshot {
        DeviceStateSnapshot {
            device: state.clone(),
            connected: self.connection.is_connected(),
            port: self.connection.handle().map(|handle| handle.port),
        }
    }

    fn publish_state(&self) {
        let state = self.state.lock();
        self.events
            .publish(ControllerEvent::StateChanged(self.snapshot_of(&state)));
    }
}

impl LinkHandler for Shared {
    fn on_line(&self, line: &str) {
        let event = response_parser::decode(line);
        tracing::debug!("Decoded {}", event);

        {
            let mut state = self.state.lock();
            *state = apply_event(&state, &event);
            self.events.publish(ControllerEvent::Parsed(event.clone()));
            self.events
                .publish(ControllerEvent::StateChanged(self.snapshot_of(&state)));
        }

        self.dispatcher.resolve(&event);
    }

    fn on_link_up(&self, handle: &ConnectionHandle, reconnected: bool) {
        self.events.publish(ControllerEvent::Connected {
            port: handle.port.clone(),
            baud_rate: handle.baud_rate,
        });
        self.publish_state();

        if !reconnected {
            return;
        }
        let (Some(shared), Ok(runtime)) = (self.me.upgrade(), tokio::runtime::Handle::try_current())
        else {
            return;
        };
        runtime.spawn(async move {
            if let Err(e) = shared.request_status().await {
                tracing::warn!("Status request after reconnection failed: {}", e);
            }
        });
    }

    fn on_link_down(&self, unexpected: bool) {
        self.dispatcher.cancel_pending();
        self.events.publish(ControllerEvent::Disconnected { unexpected });
        self.publish_state();
    }

    fn on_reconnect_scheduled(&self, delay: Duration) {
        self.events.publish(ControllerEvent::ReconnectScheduled {
            delay_ms: delay.as_millis() as u64,
        });
    }

    fn on_reconnect_failed(&self, error: &Error) {
        self.events.publish(ControllerEvent::ReconnectFailed {
            reason: error.to_string(),
        });
    }
}
