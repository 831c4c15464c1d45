//! Connection manager
//!
//! Owns the single serial link to the firmware:
//! - opens it (discovering the port when none is given) and waits for the
//!   board to finish rebooting after the DTR toggle
//! - runs a blocking reader that frames incoming bytes into lines and hands
//!   them to a [`LinkHandler`] in arrival order
//! - serializes writes through a mutex around the port
//! - detects unexpected closure and reconnects on a constant delay, forever,
//!   until the caller disconnects explicitly
//!
//! Reconnection is a single slot: asking for a reconnection while one is
//! already scheduled or running joins the existing one.

use super::discovery::detect_port;
use super::framer::LineFramer;
use super::serial::{SerialPort, SerialPortInfo, SerialPortProvider};
use super::{ConnectionParams, ConnectionState};
use dipcoat_core::{ConnectionError, ControllerError, Error, Result};
use parking_lot::{Mutex, RwLock};
use std::io::{self, ErrorKind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Size of a single read from the port
const READ_CHUNK: usize = 256;

/// Timing and policy of the serial link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Baud rate used for every open
    pub baud_rate: u32,
    /// Wait after opening before the link is usable (firmware reboot)
    pub settle_delay: Duration,
    /// Constant delay between reconnection attempts
    pub reconnect_delay: Duration,
    /// Reconnect after an unexpected close
    pub auto_reconnect: bool,
    /// Read timeout configured on the port
    pub read_timeout: Duration,
    /// Pause of the reader after an idle read
    pub idle_poll: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            settle_delay: Duration::from_millis(2000),
            reconnect_delay: Duration::from_millis(5000),
            auto_reconnect: true,
            read_timeout: Duration::from_millis(10),
            idle_poll: Duration::from_millis(5),
        }
    }
}

/// Identity of an open (or last opened) link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    /// Port name
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Link currently open
    pub is_open: bool,
}

/// Receives everything the link produces
///
/// Callbacks run on the reader thread or on the task that noticed a state
/// change; they must not block.
pub trait LinkHandler: Send + Sync {
    /// A complete, non-empty line arrived
    fn on_line(&self, line: &str);

    /// The link became usable
    fn on_link_up(&self, handle: &ConnectionHandle, reconnected: bool);

    /// The link closed; `unexpected` is false for explicit closes
    fn on_link_down(&self, unexpected: bool);

    /// A reconnection attempt will run after `delay`
    fn on_reconnect_scheduled(&self, _delay: Duration) {}

    /// A reconnection attempt failed
    fn on_reconnect_failed(&self, _error: &Error) {}
}

/// Shared port handle used by the reader and by writers
type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

/// The currently open link
struct ActiveLink {
    generation: u64,
    port: SharedPort,
    handle: ConnectionHandle,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

/// Owner of the serial link lifecycle
pub struct ConnectionManager {
    provider: Arc<dyn SerialPortProvider>,
    config: ConnectionConfig,
    state: RwLock<ConnectionState>,
    link: Mutex<Option<ActiveLink>>,
    last_handle: RwLock<Option<ConnectionHandle>>,
    reconnect_target: RwLock<Option<ConnectionParams>>,
    generation: AtomicU64,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    handler: RwLock<Option<Weak<dyn LinkHandler>>>,
    lifecycle_gate: tokio::sync::Mutex<()>,
}

impl ConnectionManager {
    /// Create a manager; nothing is opened until [`connect`](Self::connect)
    pub fn new(provider: Arc<dyn SerialPortProvider>, config: ConnectionConfig) -> Arc<Self> {
        Arc::new(Self {
            provider,
            config,
            state: RwLock::new(ConnectionState::Disconnected),
            link: Mutex::new(None),
            last_handle: RwLock::new(None),
            reconnect_target: RwLock::new(None),
            generation: AtomicU64::new(0),
            reconnect_task: Mutex::new(None),
            handler: RwLock::new(None),
            lifecycle_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// Register the receiver of lines and link events
    pub fn set_handler(&self, handler: Weak<dyn LinkHandler>) {
        *self.handler.write() = Some(handler);
    }

    /// Link configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Whether the link is open and past its settle delay
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Current or last link, if any was ever opened
    pub fn handle(&self) -> Option<ConnectionHandle> {
        self.last_handle.read().clone()
    }

    /// Whether a reconnection attempt is scheduled or running
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Ports visible through the provider
    pub fn list_ports(&self) -> Result<Vec<SerialPortInfo>> {
        self.provider.list_ports()
    }

    /// Open the link
    ///
    /// Closes any open link first. When `port` is `None` the port is chosen by
    /// discovery. Returns once the settle delay has elapsed.
    pub async fn connect(self: &Arc<Self>, port: Option<String>) -> Result<ConnectionHandle> {
        let _gate = self.lifecycle_gate.lock().await;
        self.cancel_reconnect();
        self.close_link().await;

        let port = match port {
            Some(port) => port,
            None => self.discover()?,
        };

        let params = ConnectionParams {
            timeout_ms: self.config.read_timeout.as_millis() as u64,
            ..ConnectionParams::serial(port, self.config.baud_rate)
        };
        *self.reconnect_target.write() = Some(params.clone());

        self.open_link(&params, false).await
    }

    /// Close the link and cancel any scheduled reconnection
    ///
    /// Safe to call when already disconnected.
    pub async fn disconnect(&self) {
        self.cancel_reconnect();
        let _gate = self.lifecycle_gate.lock().await;
        self.cancel_reconnect();
        *self.reconnect_target.write() = None;
        self.close_link().await;
    }

    /// Write one command line, appending the `\n` terminator
    ///
    /// Fails with `NotConnected` unless the link is usable. A write error that
    /// indicates the port is gone also triggers unexpected-close handling.
    pub fn write_line(self: &Arc<Self>, line: &str) -> Result<()> {
        let (port, generation) = {
            let guard = self.link.lock();
            match guard.as_ref() {
                Some(link) if self.is_connected() => (link.port.clone(), link.generation),
                _ => return Err(ControllerError::NotConnected.into()),
            }
        };

        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');

        let result = {
            let mut port = port.lock();
            write_all(port.as_mut(), &data).and_then(|_| port.flush())
        };

        match result {
            Ok(()) => {
                tracing::debug!("> {}", line);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Write of '{}' failed: {}", line, e);
                if !is_transient(&e) {
                    self.handle_link_lost(generation, &e.to_string());
                }
                Err(ConnectionError::WriteError {
                    reason: e.to_string(),
                }
                .into())
            }
        }
    }

    fn discover(&self) -> Result<String> {
        let ports = self.provider.list_ports()?;
        match detect_port(&ports) {
            Some(port) => {
                tracing::info!("Auto-detected port {} ({})", port.port_name, port.description);
                Ok(port.port_name.clone())
            }
            None => Err(ConnectionError::NoDeviceFound.into()),
        }
    }

    async fn open_link(
        self: &Arc<Self>,
        params: &ConnectionParams,
        reconnected: bool,
    ) -> Result<ConnectionHandle> {
        self.set_state(ConnectionState::Connecting);

        let port = match self.provider.open(params) {
            Ok(port) => port,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let port: SharedPort = Arc::new(Mutex::new(port));
        let stop = Arc::new(AtomicBool::new(false));
        let handle = ConnectionHandle {
            port: params.port.clone(),
            baud_rate: params.baud_rate,
            is_open: true,
        };

        let reader = self.spawn_reader(port.clone(), stop.clone(), generation);
        *self.link.lock() = Some(ActiveLink {
            generation,
            port,
            handle: handle.clone(),
            stop,
            reader: Some(reader),
        });
        *self.last_handle.write() = Some(handle.clone());
        tracing::info!(
            "Opened {} at {} baud, waiting {}ms for the board to boot",
            params.port,
            params.baud_rate,
            self.config.settle_delay.as_millis()
        );

        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        if !self.is_current(generation) {
            return Err(ConnectionError::ConnectionLost {
                reason: format!("{} closed while the board was booting", params.port),
            }
            .into());
        }

        self.set_state(ConnectionState::Connected);
        if let Some(handler) = self.handler() {
            handler.on_link_up(&handle, reconnected);
        }
        Ok(handle)
    }

    fn spawn_reader(
        self: &Arc<Self>,
        port: SharedPort,
        stop: Arc<AtomicBool>,
        generation: u64,
    ) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        let idle_poll = self.config.idle_poll;

        tokio::task::spawn_blocking(move || {
            let mut framer = LineFramer::new();
            let mut buf = [0u8; READ_CHUNK];

            while !stop.load(Ordering::Acquire) && manager.strong_count() > 0 {
                let result = port.lock().read(&mut buf);
                match result {
                    Ok(0) => std::thread::sleep(idle_poll),
                    Ok(n) => {
                        for line in framer.push(&buf[..n]) {
                            if stop.load(Ordering::Acquire) {
                                return;
                            }
                            tracing::debug!("< {}", line);
                            let Some(manager) = manager.upgrade() else {
                                return;
                            };
                            if let Some(handler) = manager.handler() {
                                handler.on_line(&line);
                            }
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => {}
                    Err(e) if is_transient(&e) => std::thread::sleep(idle_poll),
                    Err(e) => {
                        if let Some(manager) = manager.upgrade() {
                            manager.handle_link_lost(generation, &e.to_string());
                        }
                        return;
                    }
                }
            }
        })
    }

    /// Tear down link `generation` after an unexpected close
    ///
    /// Ignored when that link is no longer the current one.
    fn handle_link_lost(self: &Arc<Self>, generation: u64, reason: &str) {
        let link = {
            let mut guard = self.link.lock();
            match guard.as_ref() {
                Some(link) if link.generation == generation => guard.take(),
                _ => None,
            }
        };
        let Some(link) = link else {
            return;
        };

        link.stop.store(true, Ordering::Release);
        let closed = link.port.lock().close();
        if let Err(e) = closed {
            tracing::debug!("Closing lost port failed: {}", e);
        }
        self.mark_closed();
        tracing::warn!("Connection to {} lost: {}", link.handle.port, reason);

        if let Some(handler) = self.handler() {
            handler.on_link_down(true);
        }
        if self.config.auto_reconnect {
            self.schedule_reconnect();
        }
    }

    /// Schedule a reconnection attempt unless one is already pending
    fn schedule_reconnect(self: &Arc<Self>) {
        let delay = self.config.reconnect_delay;
        {
            let mut slot = self.reconnect_task.lock();
            if slot.as_ref().is_some_and(|task| !task.is_finished()) {
                tracing::debug!("Reconnection already scheduled");
                return;
            }

            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                tracing::warn!("No async runtime available, cannot schedule reconnection");
                return;
            };
            let manager = Arc::downgrade(self);
            *slot = Some(runtime.spawn(Self::reconnect_loop(manager, delay)));
        }

        tracing::info!("Reconnecting in {}ms", delay.as_millis());
        if let Some(handler) = self.handler() {
            handler.on_reconnect_scheduled(delay);
        }
    }

    async fn reconnect_loop(manager: Weak<Self>, delay: Duration) {
        loop {
            tokio::time::sleep(delay).await;

            let Some(this) = manager.upgrade() else {
                return;
            };
            let Some(params) = this.reconnect_target.read().clone() else {
                return;
            };

            let _gate = this.lifecycle_gate.lock().await;
            if this.link.lock().is_none() {
                tracing::info!("Attempting reconnection to {}", params.port);
                if let Err(e) = this.open_link(&params, true).await {
                    tracing::warn!("Reconnection to {} failed: {}", params.port, e);
                    if let Some(handler) = this.handler() {
                        handler.on_reconnect_failed(&e);
                        handler.on_reconnect_scheduled(delay);
                    }
                    continue;
                }
            }

            // Release the slot only while the link is still up; a loss noticed
            // in between keeps this loop going instead of scheduling another.
            let mut slot = this.reconnect_task.lock();
            if this.link.lock().is_some() {
                tracing::info!("Reconnected to {}", params.port);
                slot.take();
                return;
            }
        }
    }

    fn cancel_reconnect(&self) {
        if let Some(task) = self.reconnect_task.lock().take() {
            if !task.is_finished() {
                tracing::debug!("Cancelling scheduled reconnection");
            }
            task.abort();
        }
    }

    /// Close the current link, if any, and wait for its reader to stop
    async fn close_link(&self) {
        let link = self.link.lock().take();
        let Some(mut link) = link else {
            self.set_state(ConnectionState::Disconnected);
            return;
        };

        self.set_state(ConnectionState::Closing);
        link.stop.store(true, Ordering::Release);
        let closed = link.port.lock().close();
        if let Err(e) = closed {
            tracing::debug!("Closing {} failed: {}", link.handle.port, e);
        }
        if let Some(reader) = link.reader.take() {
            if let Err(e) = reader.await {
                tracing::debug!("Reader task ended abnormally: {}", e);
            }
        }
        self.mark_closed();
        tracing::info!("Disconnected from {}", link.handle.port);

        if let Some(handler) = self.handler() {
            handler.on_link_down(false);
        }
    }

    fn mark_closed(&self) {
        self.set_state(ConnectionState::Disconnected);
        if let Some(handle) = self.last_handle.write().as_mut() {
            handle.is_open = false;
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.link
            .lock()
            .as_ref()
            .is_some_and(|link| link.generation == generation)
    }

    fn set_state(&self, state: ConnectionState) {
        let mut guard = self.state.write();
        if *guard != state {
            tracing::debug!("Connection state {} -> {}", *guard, state);
            *guard = state;
        }
    }

    fn handler(&self) -> Option<Arc<dyn LinkHandler>> {
        self.handler.read().as_ref().and_then(Weak::upgrade)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(task) = self.reconnect_task.get_mut().take() {
            task.abort();
        }
        if let Some(link) = self.link.get_mut().take() {
            link.stop.store(true, Ordering::Release);
        }
    }
}

/// Errors that leave the port usable
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

fn write_all(port: &mut dyn SerialPort, mut data: &[u8]) -> io::Result<()> {
    while !data.is_empty() {
        match port.write(data) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    "port accepted no bytes",
                ))
            }
            Ok(n) => data = &data[n..],
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
