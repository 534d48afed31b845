//! Connection manager: owns the realtime link and keeps it alive.
//!
//! A background task holds the transport. The handle talks to it over an
//! unbounded command channel and observes it through a `watch` of the
//! connection state plus an unbounded stream of [`ConnectionEvent`]s.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

use super::reconnect::{should_attempt_reconnect, should_exit_immediately};
use crate::{
    config::{ClientConfig, ReconnectPolicy},
    domain::{
        event::{ConnectionEvent, ConnectionState, InboundEvent, OutboundEvent},
        port::{ConnectionPort, EventSink},
        value_object::UserId,
    },
    infrastructure::{
        dto::websocket::{ClientFrame, ServerFrame},
        transport::{Connector, FrameSink, Link, TransportError},
    },
};

/// Handle to the connection task.
///
/// Dropping the handle closes the connection; frames already queued are
/// still flushed by the task.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    shutdown_timeout: Duration,
    state: Arc<watch::Sender<ConnectionState>>,
    /// Consecutive failed connect attempts since the last established link.
    retries: Arc<AtomicU32>,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    cmd_tx: Option<mpsc::UnboundedSender<ClientFrame>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    closed: Option<Arc<AtomicBool>>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Create an idle manager and the receiver for its events.
    ///
    /// The receiver outlives individual links: one stream across reconnects.
    #[must_use = "connection events must be consumed"]
    pub fn new(
        connector: Arc<dyn Connector>,
        config: &ClientConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let manager = Self {
            connector,
            policy: config.reconnect,
            shutdown_timeout: config.shutdown_timeout,
            state: Arc::new(state),
            retries: Arc::new(AtomicU32::new(0)),
            events_tx,
            cmd_tx: None,
            shutdown_tx: None,
            closed: None,
            task: None,
        };
        (manager, events_rx)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Failed connect attempts in the current retry cycle; zero once connected.
    pub fn retry_count(&self) -> u32 {
        self.retries.load(Ordering::Acquire)
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Start connecting as `user_id`. No-op while the handle is open and its
    /// task is alive.
    ///
    /// A task left over from an earlier `close` keeps draining on its own and
    /// no longer publishes state or events.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(&mut self, user_id: &UserId) {
        let is_open =
            self.closed.is_some() && self.task.as_ref().is_some_and(|task| !task.is_finished());
        if is_open {
            tracing::debug!("Connection already open; ignoring open for '{}'", user_id);
            return;
        }

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let closed = Arc::new(AtomicBool::new(false));

        self.state.send_replace(ConnectionState::Connecting);
        self.retries.store(0, Ordering::Release);
        let ctx = LoopContext {
            connector: Arc::clone(&self.connector),
            user_id: user_id.clone(),
            policy: self.policy,
            cmd_rx,
            shutdown_rx,
            state: Arc::clone(&self.state),
            retries: Arc::clone(&self.retries),
            events: self.events_tx.clone(),
            closed: Arc::clone(&closed),
        };

        self.task = Some(tokio::spawn(connection_loop(ctx)));
        self.cmd_tx = Some(cmd_tx);
        self.shutdown_tx = Some(shutdown_tx);
        self.closed = Some(closed);
    }

    /// Close the connection and stop retrying.
    ///
    /// Returns immediately; the task flushes queued frames in the background.
    pub fn close(&mut self) {
        let Some(closed) = self.closed.take() else {
            return;
        };
        closed.store(true, Ordering::Release);
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        self.cmd_tx = None;
        self.state.send_replace(ConnectionState::Disconnected);
        tracing::info!("Connection closed");
        let _ = self.events_tx.send(ConnectionEvent::Closed);
    }

    /// Close and wait for the task to flush, bounded by the shutdown timeout.
    pub async fn shutdown(&mut self) {
        self.close();
        let Some(mut task) = self.task.take() else {
            return;
        };
        if tokio::time::timeout(self.shutdown_timeout, &mut task)
            .await
            .is_err()
        {
            tracing::warn!(
                "Connection task did not stop within {:?}; aborting",
                self.shutdown_timeout
            );
            task.abort();
        }
    }

    /// Queue an event for the server. Dropped unless connected.
    pub fn send(&self, event: OutboundEvent) -> bool {
        let state = self.state();
        if state != ConnectionState::Connected {
            tracing::debug!("Dropping {} while {:?}", event.kind(), state);
            return false;
        }
        let Some(cmd_tx) = &self.cmd_tx else {
            return false;
        };

        let kind = event.kind();
        match ClientFrame::try_from(event) {
            Ok(frame) => cmd_tx.send(frame).is_ok(),
            Err(e) => {
                tracing::warn!("Dropping {}: {}", kind, e);
                false
            }
        }
    }
}

impl EventSink for ConnectionManager {
    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    fn emit(&self, event: OutboundEvent) -> bool {
        self.send(event)
    }
}

impl ConnectionPort for ConnectionManager {
    fn open(&mut self, user_id: &UserId) {
        ConnectionManager::open(self, user_id);
    }

    fn close(&mut self) {
        ConnectionManager::close(self);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}

// ── Connection loop ─────────────────────────────────────────────────

struct LoopContext {
    connector: Arc<dyn Connector>,
    user_id: UserId,
    policy: ReconnectPolicy,
    cmd_rx: mpsc::UnboundedReceiver<ClientFrame>,
    shutdown_rx: oneshot::Receiver<()>,
    state: Arc<watch::Sender<ConnectionState>>,
    retries: Arc<AtomicU32>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    /// Set by the handle on close; the loop then stops publishing.
    closed: Arc<AtomicBool>,
}

enum PumpExit {
    Shutdown,
    Lost(String),
}

impl LoopContext {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn set_state(&self, next: ConnectionState) {
        // Checked under the watch lock so a concurrent close always wins.
        self.state.send_if_modified(|current| {
            if self.is_closed() || *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn set_retries(&self, retries: u32) {
        if !self.is_closed() {
            self.retries.store(retries, Ordering::Release);
        }
    }

    fn emit(&self, event: ConnectionEvent) {
        if !self.is_closed() {
            let _ = self.events.send(event);
        }
    }

    fn dispatch(&self, text: &str) {
        let frame = match serde_json::from_str::<ServerFrame>(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Ignoring unrecognized frame: {} (raw: {})", e, text);
                return;
            }
        };
        match InboundEvent::try_from(frame) {
            Ok(event) => self.emit(ConnectionEvent::Inbound(event)),
            Err(e) => tracing::warn!("Ignoring malformed frame: {} (raw: {})", e, text),
        }
    }

    async fn flush_queued(&mut self, sink: &mut FrameSink) {
        while let Ok(frame) = self.cmd_rx.try_recv() {
            if let Err(e) = write_frame(sink, &frame).await {
                tracing::warn!("Failed to flush queued frame: {}", e);
                break;
            }
        }
    }

    /// Frames queued for a link that is gone are not replayed.
    fn discard_queued(&mut self) {
        let mut dropped = 0;
        while self.cmd_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!("Discarded {} frames queued on the lost link", dropped);
        }
    }

    /// Sleep for the retry interval. `false` if shut down meanwhile.
    async fn wait_before_retry(&mut self) -> bool {
        tokio::select! {
            _ = &mut self.shutdown_rx => false,
            _ = tokio::time::sleep(self.policy.interval) => true,
        }
    }
}

async fn connection_loop(mut ctx: LoopContext) {
    let mut failures: u32 = 0;
    let mut has_connected = false;

    loop {
        ctx.set_state(ConnectionState::Connecting);
        tracing::info!(
            "Connecting as '{}' (attempt {}/{})",
            ctx.user_id,
            failures + 1,
            ctx.policy.max_attempts
        );

        let result = tokio::select! {
            _ = &mut ctx.shutdown_rx => break,
            result = ctx.connector.connect(&ctx.user_id) => result,
        };

        match result {
            Ok(link) => {
                failures = 0;
                ctx.set_retries(0);
                ctx.set_state(ConnectionState::Connected);
                tracing::info!("Connected to chat server");
                ctx.emit(ConnectionEvent::Established {
                    reconnected: has_connected,
                });
                has_connected = true;

                match pump(&mut ctx, link).await {
                    PumpExit::Shutdown => break,
                    PumpExit::Lost(reason) => {
                        tracing::warn!("Connection lost: {}", reason);
                        ctx.set_state(ConnectionState::Disconnected);
                        ctx.discard_queued();
                        ctx.emit(ConnectionEvent::Lost { reason });
                    }
                }
            }
            Err(error) => {
                tracing::warn!("Connection attempt failed: {}", error);
                failures += 1;
                ctx.set_retries(failures);

                if should_exit_immediately(&error) {
                    ctx.set_state(ConnectionState::Disconnected);
                    ctx.emit(match error {
                        TransportError::Unauthorized => ConnectionEvent::Unauthorized,
                        _ => ConnectionEvent::Failed { attempts: failures },
                    });
                    break;
                }

                ctx.emit(ConnectionEvent::Error {
                    detail: error.to_string(),
                });

                if !should_attempt_reconnect(&error, failures, ctx.policy.max_attempts) {
                    tracing::error!("Failed to reconnect after {} attempts", failures);
                    ctx.set_state(ConnectionState::Disconnected);
                    ctx.emit(ConnectionEvent::Failed { attempts: failures });
                    break;
                }
            }
        }

        tracing::info!("Reconnecting in {:?}", ctx.policy.interval);
        if !ctx.wait_before_retry().await {
            break;
        }
    }

    tracing::debug!("Connection loop exited");
}

/// Drive one established link until it drops or the handle shuts down.
async fn pump(ctx: &mut LoopContext, link: Link) -> PumpExit {
    let Link {
        mut sink,
        mut stream,
    } = link;

    let announce = ClientFrame::UserOnline(ctx.user_id.as_str().to_owned());
    if let Err(e) = write_frame(&mut sink, &announce).await {
        return PumpExit::Lost(e.to_string());
    }

    loop {
        tokio::select! {
            biased;

            _ = &mut ctx.shutdown_rx => {
                ctx.flush_queued(&mut sink).await;
                let _ = sink.close().await;
                return PumpExit::Shutdown;
            }

            command = ctx.cmd_rx.recv() => match command {
                Some(frame) => {
                    if let Err(e) = write_frame(&mut sink, &frame).await {
                        return PumpExit::Lost(e.to_string());
                    }
                }
                None => {
                    let _ = sink.close().await;
                    return PumpExit::Shutdown;
                }
            },

            incoming = stream.next() => match incoming {
                Some(Ok(text)) => ctx.dispatch(&text),
                Some(Err(e)) => return PumpExit::Lost(e.to_string()),
                None => return PumpExit::Lost("server closed the connection".to_string()),
            },
        }
    }
}

async fn write_frame(sink: &mut FrameSink, frame: &ClientFrame) -> Result<(), TransportError> {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to serialize frame: {}", e);
            return Ok(());
        }
    };
    sink.send(json).await
}
