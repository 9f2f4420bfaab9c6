//! One task per transport instance.
//!
//! Every mutation of a transport's peer table or session goes through its task,
//! so platform callbacks, control requests and outgoing hits are applied one at
//! a time without a lock. Decoded hits fan out on a broadcast channel.

use crate::diagnostics::Diagnostics;
use crate::error::{DrumError, Result};
use crate::event::{HitEvent, HitReceiver};
use crate::instrument::InstrumentId;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

const STOP_TIMEOUT: Duration = Duration::from_millis(500);

/// Outgoing hits that may wait for the task at once; more are dropped
const SEND_SLOTS: usize = 8;

/// A transport state machine that can be driven by [`spawn`]
pub trait HitTransport: Send + 'static {
    /// Platform callback type injected through an [`EventSink`]
    type Event: Send + 'static;
    /// Role specific requests
    type Control: Send + 'static;

    fn name(&self) -> &'static str;
    fn handle(&mut self, event: Self::Event);
    fn control(&mut self, control: Self::Control) -> Result<()>;
    fn send_hit(&mut self, instrument: InstrumentId) -> Result<()>;
    fn drain_hits(&mut self) -> Vec<HitEvent>;
    fn diagnostics(&self) -> Diagnostics;
    fn shutdown(&mut self);
}

enum Command<T: HitTransport> {
    Event(T::Event),
    Control(T::Control, oneshot::Sender<Result<()>>),
    Diagnostics(oneshot::Sender<Diagnostics>),
}

struct SendRequest {
    instrument: InstrumentId,
    reply: oneshot::Sender<Result<()>>,
}

/// Cloneable entry point for platform callbacks
///
/// `send` never waits, so it is safe to call from a radio or session callback
/// thread.
pub struct EventSink<T: HitTransport> {
    tx: mpsc::UnboundedSender<Command<T>>,
}

impl<T: HitTransport> Clone for EventSink<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T: HitTransport> EventSink<T> {
    /// Queue one platform callback; fails once the task has stopped
    pub fn send(&self, event: T::Event) -> Result<()> {
        self.tx
            .send(Command::Event(event))
            .map_err(|_| DrumError::ChannelClosed)
    }
}

/// Cloneable handle for pushing local hits out through a transport
#[derive(Clone)]
pub struct HitSender {
    tx: mpsc::Sender<SendRequest>,
}

impl HitSender {
    /// Send a hit, reporting why it was dropped
    pub async fn send_result(&self, instrument: InstrumentId) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .try_send(SendRequest { instrument, reply })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => DrumError::SendFailed("transport busy".to_string()),
                mpsc::error::TrySendError::Closed(_) => DrumError::ChannelClosed,
            })?;
        rx.await.map_err(|_| DrumError::ChannelClosed)?
    }

    /// Send a hit; false if no peer or stream could take it
    ///
    /// There is no outgoing queue: a hit that cannot be delivered now is dropped.
    pub async fn send(&self, instrument: InstrumentId) -> bool {
        match self.send_result(instrument).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Hit for {} not sent: {}", instrument, e);
                false
            }
        }
    }
}

/// Owner side of a running transport task
pub struct TransportHandle<T: HitTransport> {
    commands: mpsc::UnboundedSender<Command<T>>,
    hits: broadcast::Sender<HitEvent>,
    sender: HitSender,
    stop_tx: Option<broadcast::Sender<()>>,
    task_handle: Option<JoinHandle<T>>,
}

/// Move `transport` onto its own task
pub fn spawn<T: HitTransport>(transport: T, hit_capacity: usize) -> TransportHandle<T> {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (send_tx, send_rx) = mpsc::channel(SEND_SLOTS);
    let (hits_tx, _) = broadcast::channel(hit_capacity.max(1));
    let (stop_tx, stop_rx) = broadcast::channel(1);

    tracing::info!("Starting {} transport task", transport.name());
    let task_handle = tokio::spawn(run(transport, commands_rx, send_rx, hits_tx.clone(), stop_rx));

    TransportHandle {
        commands: commands_tx,
        hits: hits_tx,
        sender: HitSender { tx: send_tx },
        stop_tx: Some(stop_tx),
        task_handle: Some(task_handle),
    }
}

async fn run<T: HitTransport>(
    mut transport: T,
    mut commands: mpsc::UnboundedReceiver<Command<T>>,
    mut sends: mpsc::Receiver<SendRequest>,
    hits: broadcast::Sender<HitEvent>,
    mut stop_rx: broadcast::Receiver<()>,
) -> T {
    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                tracing::info!("{} transport stopped", transport.name());
                break;
            }
            command = commands.recv() => {
                match command {
                    Some(Command::Event(event)) => transport.handle(event),
                    Some(Command::Control(control, reply)) => {
                        let _ = reply.send(transport.control(control));
                    }
                    Some(Command::Diagnostics(reply)) => {
                        let _ = reply.send(transport.diagnostics());
                    }
                    None => {
                        tracing::debug!("All {} handles dropped", transport.name());
                        break;
                    }
                }
                publish(&mut transport, &hits);
            }
            Some(request) = sends.recv() => {
                let _ = request.reply.send(transport.send_hit(request.instrument));
            }
        }
    }

    transport.shutdown();
    transport
}

fn publish<T: HitTransport>(transport: &mut T, hits: &broadcast::Sender<HitEvent>) {
    for hit in transport.drain_hits() {
        // No subscribers is fine; the hit is simply not wanted
        let _ = hits.send(hit);
    }
}

impl<T: HitTransport> TransportHandle<T> {
    /// Sink for the platform adapter to inject callbacks
    pub fn event_sink(&self) -> EventSink<T> {
        EventSink {
            tx: self.commands.clone(),
        }
    }

    /// Sender for local hits, cloneable across tasks
    pub fn hit_sender(&self) -> HitSender {
        self.sender.clone()
    }

    /// Subscribe to hits decoded by this transport
    pub fn subscribe_hits(&self) -> HitReceiver {
        HitReceiver::new(self.hits.subscribe())
    }

    /// Inject one platform callback
    pub fn inject(&self, event: T::Event) -> Result<()> {
        self.commands
            .send(Command::Event(event))
            .map_err(|_| DrumError::ChannelClosed)
    }

    /// Apply a role specific request and wait for its outcome
    pub async fn control(&self, control: T::Control) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Control(control, reply))
            .map_err(|_| DrumError::ChannelClosed)?;
        rx.await.map_err(|_| DrumError::ChannelClosed)?
    }

    pub async fn send_hit(&self, instrument: InstrumentId) -> Result<()> {
        self.sender.send_result(instrument).await
    }

    pub async fn diagnostics(&self) -> Result<Diagnostics> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Diagnostics(reply))
            .map_err(|_| DrumError::ChannelClosed)?;
        rx.await.map_err(|_| DrumError::ChannelClosed)
    }

    /// Stop the task, tearing the transport down, and hand the state machine back
    ///
    /// Teardown requests are issued without waiting for the platform to confirm.
    pub async fn stop(&mut self) -> Option<T> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        let handle = self.task_handle.take()?;
        match tokio::time::timeout(STOP_TIMEOUT, handle).await {
            Ok(Ok(transport)) => Some(transport),
            Ok(Err(e)) => {
                tracing::error!("Transport task failed: {}", e);
                None
            }
            Err(_) => {
                tracing::warn!("Transport task did not stop within {:?}", STOP_TIMEOUT);
                None
            }
        }
    }
}

impl<T: HitTransport> Drop for TransportHandle<T> {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}
