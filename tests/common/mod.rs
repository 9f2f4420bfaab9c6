//! Recording stand-ins for the platform radio and session stack.

#![allow(dead_code)]

use drumkit_link::gatt::{CentralRadio, PeerId, PeripheralRadio, ServiceDefinition};
use drumkit_link::session::{OutboundStream, SessionLink};
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use uuid::Uuid;

static TRACING: Once = Once::new();

/// Route library logs to the test harness output
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Shared call log
#[derive(Debug)]
pub struct Recorder<C> {
    calls: Arc<Mutex<Vec<C>>>,
}

impl<C> Clone for Recorder<C> {
    fn clone(&self) -> Self {
        Self {
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<C> Default for Recorder<C> {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<C: Clone> Recorder<C> {
    pub fn push(&self, call: C) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<C> {
        self.calls.lock().unwrap().clone()
    }

    /// Return and forget everything recorded so far
    pub fn take(&self) -> Vec<C> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    pub fn count(&self, predicate: impl Fn(&C) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    Scan(Uuid),
    StopScan,
    Connect(PeerId),
    Cancel(PeerId),
    DiscoverServices(PeerId),
    DiscoverAttributes(PeerId, Uuid),
    SetNotify(PeerId, Uuid, bool),
    AddService(Uuid, usize),
    Advertise(Uuid),
    StopAdvertising,
    Update(Uuid, Vec<u8>),
}

pub struct MockCentralRadio {
    pub calls: Recorder<RadioCall>,
}

impl MockCentralRadio {
    pub fn new() -> (Self, Recorder<RadioCall>) {
        let calls = Recorder::default();
        (Self { calls: calls.clone() }, calls)
    }
}

impl CentralRadio for MockCentralRadio {
    fn scan_for_service(&mut self, service: Uuid) {
        self.calls.push(RadioCall::Scan(service));
    }

    fn stop_scan(&mut self) {
        self.calls.push(RadioCall::StopScan);
    }

    fn connect(&mut self, peer: PeerId) {
        self.calls.push(RadioCall::Connect(peer));
    }

    fn cancel_connection(&mut self, peer: PeerId) {
        self.calls.push(RadioCall::Cancel(peer));
    }

    fn discover_services(&mut self, peer: PeerId, _services: &[Uuid]) {
        self.calls.push(RadioCall::DiscoverServices(peer));
    }

    fn discover_attributes(&mut self, peer: PeerId, service: Uuid, _attributes: &[Uuid]) {
        self.calls.push(RadioCall::DiscoverAttributes(peer, service));
    }

    fn set_notify(&mut self, peer: PeerId, attribute: Uuid, enabled: bool) {
        self.calls.push(RadioCall::SetNotify(peer, attribute, enabled));
    }
}

pub struct MockPeripheralRadio {
    pub calls: Recorder<RadioCall>,
    accept_updates: Arc<AtomicBool>,
}

impl MockPeripheralRadio {
    /// Radio plus its call log and a switch for the transmit queue
    pub fn new() -> (Self, Recorder<RadioCall>, Arc<AtomicBool>) {
        let calls = Recorder::default();
        let accept = Arc::new(AtomicBool::new(true));
        let radio = Self {
            calls: calls.clone(),
            accept_updates: Arc::clone(&accept),
        };
        (radio, calls, accept)
    }
}

impl PeripheralRadio for MockPeripheralRadio {
    fn add_service(&mut self, service: &ServiceDefinition) {
        self.calls
            .push(RadioCall::AddService(service.uuid, service.attributes.len()));
    }

    fn start_advertising(&mut self, service: Uuid) {
        self.calls.push(RadioCall::Advertise(service));
    }

    fn stop_advertising(&mut self) {
        self.calls.push(RadioCall::StopAdvertising);
    }

    fn update_value(&mut self, attribute: Uuid, value: &[u8]) -> bool {
        self.calls.push(RadioCall::Update(attribute, value.to_vec()));
        self.accept_updates.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCall {
    Advertise { identity: String, service_type: String },
    StopAdvertising,
    Browse { identity: String, service_type: String },
    StopBrowsing,
    Invite { peer: String, timeout: Duration },
    Respond { from: String, accept: bool },
    StartStream { name: String, peer: String },
}

/// Bytes written to a stream the transport opened
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Stream whose transmit buffer never drains
#[derive(Debug, Clone, Default)]
pub struct StalledWriter {
    attempts: Arc<Mutex<usize>>,
}

impl StalledWriter {
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

impl AsyncWrite for StalledWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
        *self.attempts.lock().unwrap() += 1;
        Poll::Pending
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Pending
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

pub struct MockSessionLink {
    pub calls: Recorder<LinkCall>,
    pub written: SharedBuffer,
    stream: Option<OutboundStream>,
}

impl MockSessionLink {
    pub fn new() -> (Self, Recorder<LinkCall>, SharedBuffer) {
        let calls = Recorder::default();
        let written = SharedBuffer::default();
        let link = Self {
            calls: calls.clone(),
            written: written.clone(),
            stream: None,
        };
        (link, calls, written)
    }

    /// Link whose first opened stream is `stream` instead of the shared buffer
    pub fn with_stream(stream: OutboundStream) -> (Self, Recorder<LinkCall>) {
        let (mut link, calls, _) = Self::new();
        link.stream = Some(stream);
        (link, calls)
    }
}

impl SessionLink for MockSessionLink {
    fn start_advertising(&mut self, identity: &str, service_type: &str) {
        self.calls.push(LinkCall::Advertise {
            identity: identity.to_string(),
            service_type: service_type.to_string(),
        });
    }

    fn stop_advertising(&mut self) {
        self.calls.push(LinkCall::StopAdvertising);
    }

    fn start_browsing(&mut self, identity: &str, service_type: &str) {
        self.calls.push(LinkCall::Browse {
            identity: identity.to_string(),
            service_type: service_type.to_string(),
        });
    }

    fn stop_browsing(&mut self) {
        self.calls.push(LinkCall::StopBrowsing);
    }

    fn invite(&mut self, peer: &str, timeout: Duration) {
        self.calls.push(LinkCall::Invite {
            peer: peer.to_string(),
            timeout,
        });
    }

    fn respond_to_invitation(&mut self, from: &str, accept: bool) {
        self.calls.push(LinkCall::Respond {
            from: from.to_string(),
            accept,
        });
    }

    fn start_stream(&mut self, name: &str, peer: &str) -> io::Result<OutboundStream> {
        self.calls.push(LinkCall::StartStream {
            name: name.to_string(),
            peer: peer.to_string(),
        });
        match self.stream.take() {
            Some(stream) => Ok(stream),
            None => Ok(Box::new(self.written.clone())),
        }
    }
}

/// Reader that hands out one queued chunk per read and is pending when empty
pub struct ChunkedReader {
    chunks: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl ChunkedReader {
    pub fn new() -> (Self, Arc<Mutex<VecDeque<Vec<u8>>>>) {
        let chunks = Arc::new(Mutex::new(VecDeque::new()));
        (
            Self {
                chunks: Arc::clone(&chunks),
            },
            chunks,
        )
    }
}

impl AsyncRead for ChunkedReader {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let Some(chunk) = self.chunks.lock().unwrap().pop_front() else {
            return Poll::Pending;
        };
        let len = chunk.len().min(buf.remaining());
        buf.put_slice(&chunk[..len]);
        Poll::Ready(Ok(()))
    }
}

/// Reader that fails every read
pub struct BrokenReader;

impl AsyncRead for BrokenReader {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "stream reset")))
    }
}

pub fn peer(n: u128) -> PeerId {
    Uuid::from_u128(0xA000 + n)
}
