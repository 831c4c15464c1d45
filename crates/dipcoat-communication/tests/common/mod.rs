#![allow(dead_code)]
//! In-memory serial ports for driving the connection and controller without
//! hardware.

use dipcoat_communication::{
    ConnectionConfig, ConnectionParams, ControllerConfig, SerialPort, SerialPortInfo,
    SerialPortProvider,
};
use dipcoat_core::{ConnectionError, Result};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Replies = Arc<Mutex<HashMap<String, Vec<String>>>>;

/// One opened port: bytes the host wrote, bytes queued for the host to read
pub struct MockLink {
    inbound: Mutex<VecDeque<u8>>,
    written: Mutex<Vec<u8>>,
    broken: AtomicBool,
    closed_by_host: AtomicBool,
    replies: Replies,
}

impl MockLink {
    fn new(replies: Replies) -> Self {
        Self {
            inbound: Mutex::new(VecDeque::new()),
            written: Mutex::new(Vec::new()),
            broken: AtomicBool::new(false),
            closed_by_host: AtomicBool::new(false),
            replies,
        }
    }

    /// Queue a line for the host, terminated like the firmware does
    pub fn inject_line(&self, line: &str) {
        let mut inbound = self.inbound.lock().unwrap();
        inbound.extend(line.as_bytes());
        inbound.extend(b"\r\n");
    }

    /// Simulate the cable being pulled
    pub fn break_link(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn written_bytes(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn written_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.written_bytes())
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn clear_written(&self) {
        self.written.lock().unwrap().clear();
    }

    pub fn closed_by_host(&self) -> bool {
        self.closed_by_host.load(Ordering::SeqCst)
    }
}

struct MockPort {
    name: String,
    link: Arc<MockLink>,
}

impl SerialPort for MockPort {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.link.broken.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        let mut written = self.link.written.lock().unwrap();
        let start = written.len();
        written.extend_from_slice(data);

        // Auto-reply to every complete line in this write
        let text = String::from_utf8_lossy(&written[start..]).to_string();
        drop(written);
        let replies = self.link.replies.lock().unwrap().clone();
        for line in text.lines() {
            if let Some(reply) = replies.get(line.trim()) {
                for reply_line in reply {
                    self.link.inject_line(reply_line);
                }
            }
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.link.broken.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        let mut inbound = self.link.inbound.lock().unwrap();
        if inbound.is_empty() {
            drop(inbound);
            std::thread::sleep(Duration::from_millis(1));
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(inbound.len());
        for (slot, byte) in buf.iter_mut().zip(inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn close(&mut self) -> io::Result<()> {
        self.link.closed_by_host.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Provider handing out [`MockLink`]s, one per successful open
pub struct MockProvider {
    ports: Vec<SerialPortInfo>,
    links: Mutex<Vec<Arc<MockLink>>>,
    open_attempts: AtomicUsize,
    refuse_open: AtomicBool,
    replies: Replies,
}

impl MockProvider {
    pub fn new(ports: Vec<SerialPortInfo>) -> Arc<Self> {
        Arc::new(Self {
            ports,
            links: Mutex::new(Vec::new()),
            open_attempts: AtomicUsize::new(0),
            refuse_open: AtomicBool::new(false),
            replies: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// A provider with a single Arduino Uno on `/dev/ttyACM0`
    pub fn with_arduino() -> Arc<Self> {
        Self::new(vec![SerialPortInfo::new("/dev/ttyACM0", "USB Arduino Uno")
            .with_manufacturer("Arduino (www.arduino.cc)")
            .with_usb_ids(0x2341, 0x0043)])
    }

    /// Reply with `lines` whenever `command` is written
    pub fn reply(&self, command: &str, lines: &[&str]) {
        self.replies.lock().unwrap().insert(
            command.to_string(),
            lines.iter().map(|l| l.to_string()).collect(),
        );
    }

    pub fn set_refuse_open(&self, refuse: bool) {
        self.refuse_open.store(refuse, Ordering::SeqCst);
    }

    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }

    pub fn link_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    /// Most recently opened link
    pub fn link(&self) -> Arc<MockLink> {
        self.links
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no port opened yet")
    }
}

impl SerialPortProvider for MockProvider {
    fn list_ports(&self) -> Result<Vec<SerialPortInfo>> {
        Ok(self.ports.clone())
    }

    fn open(&self, params: &ConnectionParams) -> Result<Box<dyn SerialPort>> {
        self.open_attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse_open.load(Ordering::SeqCst) {
            return Err(ConnectionError::PortNotFound {
                port: params.port.clone(),
            }
            .into());
        }
        let link = Arc::new(MockLink::new(self.replies.clone()));
        self.links.lock().unwrap().push(link.clone());
        Ok(Box::new(MockPort {
            name: params.port.clone(),
            link,
        }))
    }
}

/// Short timings so tests finish quickly
pub fn test_connection_config() -> ConnectionConfig {
    ConnectionConfig {
        baud_rate: 9600,
        settle_delay: Duration::ZERO,
        reconnect_delay: Duration::from_millis(100),
        auto_reconnect: true,
        read_timeout: Duration::from_millis(1),
        idle_poll: Duration::from_millis(1),
    }
}

pub fn test_controller_config() -> ControllerConfig {
    ControllerConfig {
        connection: test_connection_config(),
        response_timeout: Duration::from_millis(300),
        status_timeout: Duration::from_millis(100),
        home_timeout: Duration::from_millis(300),
        event_capacity: 256,
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    condition()
}
