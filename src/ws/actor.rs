//! Session actor.
//!
//! The actor mailbox is the session's event loop: connection state, the reconnect counter, the
//! handler table and the observer list are plain fields touched only inside message handlers.
//! Socket IO, the keepalive ticker and backoff timers run on tokio tasks and report back through
//! messages tagged with the connection epoch they belong to; events from an older epoch are
//! ignored.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, error, info, warn};

use super::writer::{
    WriterClose, WriterWrite, WsWriterActor, spawn_writer_supervised_with,
    spawn_writer_supervisor,
};
use crate::config::{Origin, session_address};
use crate::core::{
    CLOSE_NORMAL, ClientIdentity, CodecError, ConnectionObserver, ConnectionState, Dispatcher,
    Envelope, InboundMessage, KeepaliveMonitor, MessageHandler, ObserverId, ObserverList,
    OutboundMessage, ReconnectPlan, RouteOutcome, SendOutcome, SessionError, SessionHealth,
    SessionResult, SessionStats, WebSocketBufferConfig, WsDisconnectCause, WsFrame,
    WsReconnectStrategy, WsTlsConfig, decode, encode_envelope, frame_bytes, kinds,
};
use crate::supervision::TypedSupervisor;
use crate::transport::WsTransport;
use kameo::prelude::{Actor, ActorRef, Context, Message as KameoMessage, WeakActorRef};

const WRITER_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Arguments passed when spawning a session actor.
pub struct SessionActorArgs<T: WsTransport> {
    pub identity: ClientIdentity,
    pub origin: Origin,
    pub transport: T,
    pub reconnect: Box<dyn WsReconnectStrategy>,
    pub ws_buffers: WebSocketBufferConfig,
    pub tls: WsTlsConfig,
}

pub struct SessionActor<T: WsTransport> {
    identity: ClientIdentity,
    origin: Origin,
    transport: T,
    tls: WsTlsConfig,
    ws_buffers: WebSocketBufferConfig,
    actor_ref: ActorRef<Self>,

    state: ConnectionState,
    epoch: u64,
    /// Address of the current (or last) connection; reconnects reuse it.
    address: Option<String>,
    reconnect: Box<dyn WsReconnectStrategy>,
    waiters: Vec<oneshot::Sender<SessionResult<()>>>,

    dispatcher: Dispatcher,
    observers: ObserverList,
    keepalive: KeepaliveMonitor,
    health: SessionHealth,

    connect_task: Option<JoinHandle<()>>,
    reader_task: Option<JoinHandle<()>>,
    keepalive_task: Option<JoinHandle<()>>,
    retry_task: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    writer_ref: Option<ActorRef<WsWriterActor<T::Writer>>>,
    writer_supervisor_ref: Option<ActorRef<TypedSupervisor<WsWriterActor<T::Writer>>>>,
}

impl<T: WsTransport> Actor for SessionActor<T> {
    type Args = SessionActorArgs<T>;
    type Error = SessionError;

    fn name() -> &'static str {
        "SessionActor"
    }

    async fn on_start(args: Self::Args, ctx: ActorRef<Self>) -> SessionResult<Self> {
        let SessionActorArgs {
            identity,
            origin,
            transport,
            reconnect,
            ws_buffers,
            tls,
        } = args;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        debug!(client_id = %identity, "session actor started");

        Ok(Self {
            identity,
            origin,
            transport,
            tls,
            ws_buffers,
            actor_ref: ctx,
            state: ConnectionState::Disconnected,
            epoch: 0,
            address: None,
            reconnect,
            waiters: Vec::new(),
            dispatcher: Dispatcher::new(),
            observers: ObserverList::new(),
            keepalive: KeepaliveMonitor::new(),
            health: SessionHealth::new(),
            connect_task: None,
            reader_task: None,
            keepalive_task: None,
            retry_task: None,
            shutdown_tx,
            shutdown_rx,
            writer_ref: None,
            writer_supervisor_ref: None,
        })
    }

    async fn on_stop(
        &mut self,
        _ctx: WeakActorRef<Self>,
        _reason: kameo::error::ActorStopReason,
    ) -> SessionResult<()> {
        abort_task(&mut self.retry_task);
        abort_task(&mut self.connect_task);
        self.teardown_connection(None).await;
        self.fail_waiters(|| SessionError::SessionStopped);
        Ok(())
    }

    fn on_panic(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        err: kameo::prelude::PanicError,
    ) -> impl std::future::Future<
        Output = Result<std::ops::ControlFlow<kameo::prelude::ActorStopReason>, Self::Error>,
    > + Send {
        async move {
            error!(error = ?err, "SessionActor panicked");
            Ok(std::ops::ControlFlow::Break(
                kameo::prelude::ActorStopReason::Panicked(err),
            ))
        }
    }
}

/// Open the session. `reply` resolves once `Connected`, or with the error that ended the attempt.
pub struct Connect {
    pub address: Option<String>,
    pub reply: oneshot::Sender<SessionResult<()>>,
}

/// Explicit, terminal close: no automatic reconnect follows.
pub struct Disconnect;

pub(crate) struct ConnectionEstablished<T: WsTransport> {
    epoch: u64,
    reader: T::Reader,
    writer: T::Writer,
}

pub(crate) struct ConnectionFailed {
    epoch: u64,
    error: String,
}

pub(crate) struct TransportClosed {
    epoch: u64,
    cause: WsDisconnectCause,
}

pub(crate) struct Inbound {
    epoch: u64,
    decoded: Result<Envelope, CodecError>,
}

pub(crate) struct ReconnectDue {
    epoch: u64,
}

pub(crate) struct KeepaliveTick {
    epoch: u64,
}

/// Hand one envelope to the connection writer.
pub struct SendEnvelope {
    pub envelope: Envelope,
}

pub struct RegisterHandler {
    pub kind: String,
    pub handler: Box<dyn MessageHandler>,
}

pub struct UnregisterHandler {
    pub kind: String,
}

pub struct Subscribe {
    pub observer: Box<dyn ConnectionObserver>,
}

pub struct Unsubscribe {
    pub id: ObserverId,
}

pub struct GetConnectionState;

pub struct GetReconnectAttempts;

pub struct GetSessionStats;

pub struct StartKeepalive {
    pub interval: Duration,
}

pub struct StopKeepalive;

impl<T: WsTransport> KameoMessage<Connect> for SessionActor<T> {
    type Reply = ();

    async fn handle(&mut self, msg: Connect, _ctx: &mut Context<Self, Self::Reply>) {
        let address = match msg.address {
            Some(address) => match validate_address(&address) {
                Ok(()) => address,
                Err(err) => {
                    warn!(client_id = %self.identity, address = %address, "rejecting connect");
                    let _ = msg.reply.send(Err(err));
                    return;
                }
            },
            None => session_address(&self.origin, &self.identity),
        };

        match self.state {
            ConnectionState::Connected => {
                debug!(client_id = %self.identity, "connect while connected; keeping transport");
                let _ = msg.reply.send(Ok(()));
            }
            ConnectionState::Connecting => {
                debug!(client_id = %self.identity, "connect while connecting; joining attempt");
                self.waiters.push(msg.reply);
            }
            ConnectionState::Disconnected => {
                if let Some(timer) = self.retry_task.take() {
                    // Caller intent preempts the pending backoff; the budget keeps counting.
                    timer.abort();
                } else {
                    self.reconnect.reset();
                }
                self.address = Some(address);
                self.waiters.push(msg.reply);
                self.start_connect();
            }
        }
    }
}

impl<T: WsTransport> KameoMessage<Disconnect> for SessionActor<T> {
    type Reply = SessionResult<()>;

    async fn handle(&mut self, _msg: Disconnect, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        abort_task(&mut self.retry_task);
        abort_task(&mut self.connect_task);
        self.teardown_connection(Some(WsFrame::close(CLOSE_NORMAL, "client disconnect")))
            .await;
        self.state = ConnectionState::Disconnected;
        self.fail_waiters(|| SessionError::Aborted("disconnect requested".to_string()));
        info!(
            client_id = %self.identity,
            attempts = self.reconnect.attempts(),
            "session disconnected"
        );
        self.notify_observers(false);
        Ok(())
    }
}

impl<T: WsTransport> KameoMessage<ConnectionEstablished<T>> for SessionActor<T> {
    type Reply = ();

    async fn handle(
        &mut self,
        msg: ConnectionEstablished<T>,
        _ctx: &mut Context<Self, Self::Reply>,
    ) {
        self.connect_task = None;
        if msg.epoch != self.epoch || self.state != ConnectionState::Connecting {
            debug!(
                client_id = %self.identity,
                epoch = msg.epoch,
                "discarding connection opened after it was cancelled"
            );
            let mut writer = msg.writer;
            tokio::spawn(async move {
                let _ = writer.close().await;
            });
            return;
        }
        self.on_connection_established(msg.reader, msg.writer).await;
    }
}

impl<T: WsTransport> KameoMessage<ConnectionFailed> for SessionActor<T> {
    type Reply = ();

    async fn handle(&mut self, msg: ConnectionFailed, _ctx: &mut Context<Self, Self::Reply>) {
        self.connect_task = None;
        if msg.epoch != self.epoch || self.state != ConnectionState::Connecting {
            return;
        }
        self.state = ConnectionState::Disconnected;
        self.health.record_error("connect", &msg.error);
        warn!(
            client_id = %self.identity,
            address = self.address.as_deref().unwrap_or_default(),
            error = %msg.error,
            "websocket connect failed"
        );
        let error = msg.error.clone();
        self.fail_waiters(|| SessionError::ConnectFailed(error.clone()));
        self.schedule_reconnect(&WsDisconnectCause::HandshakeFailed { message: msg.error });
    }
}

impl<T: WsTransport> KameoMessage<TransportClosed> for SessionActor<T> {
    type Reply = ();

    async fn handle(&mut self, msg: TransportClosed, _ctx: &mut Context<Self, Self::Reply>) {
        if msg.epoch != self.epoch || self.state != ConnectionState::Connected {
            return;
        }
        info!(
            client_id = %self.identity,
            cause = ?msg.cause,
            "websocket connection closed"
        );
        self.connection_lost(msg.cause).await;
    }
}

impl<T: WsTransport> KameoMessage<Inbound> for SessionActor<T> {
    type Reply = ();

    async fn handle(&mut self, msg: Inbound, _ctx: &mut Context<Self, Self::Reply>) {
        if msg.epoch != self.epoch || self.state != ConnectionState::Connected {
            return;
        }
        let message = msg
            .decoded
            .and_then(|envelope| {
                self.health.record_inbound();
                InboundMessage::from_envelope(envelope)
            });
        match message {
            Ok(message) => self.route(message),
            Err(err) => {
                self.health.record_decode_failure(&err.to_string());
                warn!(client_id = %self.identity, error = %err, "dropping undecodable frame");
            }
        }
    }
}

impl<T: WsTransport> KameoMessage<ReconnectDue> for SessionActor<T> {
    type Reply = ();

    async fn handle(&mut self, msg: ReconnectDue, _ctx: &mut Context<Self, Self::Reply>) {
        if msg.epoch != self.epoch || self.state != ConnectionState::Disconnected {
            return;
        }
        self.retry_task = None;
        info!(
            client_id = %self.identity,
            attempt = self.reconnect.attempts(),
            "reconnecting"
        );
        self.start_connect();
    }
}

impl<T: WsTransport> KameoMessage<KeepaliveTick> for SessionActor<T> {
    type Reply = ();

    async fn handle(&mut self, msg: KeepaliveTick, _ctx: &mut Context<Self, Self::Reply>) {
        if msg.epoch != self.epoch || !self.state.is_connected() || !self.keepalive.is_enabled() {
            return;
        }
        let envelope = match OutboundMessage::Ping.to_envelope() {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "failed to build keepalive ping");
                return;
            }
        };
        if self.write_envelope(&envelope).await == SendOutcome::Sent {
            self.keepalive.record_ping();
            debug!(client_id = %self.identity, "keepalive ping sent");
        }
    }
}

impl<T: WsTransport> KameoMessage<SendEnvelope> for SessionActor<T> {
    type Reply = SessionResult<SendOutcome>;

    async fn handle(&mut self, msg: SendEnvelope, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        if !self.state.is_connected() {
            warn!(
                client_id = %self.identity,
                kind = %msg.envelope.kind,
                state = ?self.state,
                "websocket is not connected; dropping message"
            );
            return Ok(SendOutcome::NotConnected);
        }
        Ok(self.write_envelope(&msg.envelope).await)
    }
}

impl<T: WsTransport> KameoMessage<RegisterHandler> for SessionActor<T> {
    type Reply = SessionResult<bool>;

    async fn handle(&mut self, msg: RegisterHandler, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let replaced = self.dispatcher.register(msg.kind.clone(), msg.handler);
        if replaced {
            debug!(kind = %msg.kind, "replaced message handler");
        }
        Ok(replaced)
    }
}

impl<T: WsTransport> KameoMessage<UnregisterHandler> for SessionActor<T> {
    type Reply = SessionResult<bool>;

    async fn handle(&mut self, msg: UnregisterHandler, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        Ok(self.dispatcher.unregister(&msg.kind))
    }
}

impl<T: WsTransport> KameoMessage<Subscribe> for SessionActor<T> {
    type Reply = SessionResult<ObserverId>;

    async fn handle(&mut self, msg: Subscribe, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        Ok(self.observers.subscribe(msg.observer))
    }
}

impl<T: WsTransport> KameoMessage<Unsubscribe> for SessionActor<T> {
    type Reply = SessionResult<bool>;

    async fn handle(&mut self, msg: Unsubscribe, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        Ok(self.observers.unsubscribe(msg.id))
    }
}

impl<T: WsTransport> KameoMessage<GetConnectionState> for SessionActor<T> {
    type Reply = SessionResult<ConnectionState>;

    async fn handle(&mut self, _msg: GetConnectionState, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        Ok(self.state)
    }
}

impl<T: WsTransport> KameoMessage<GetReconnectAttempts> for SessionActor<T> {
    type Reply = SessionResult<u32>;

    async fn handle(&mut self, _msg: GetReconnectAttempts, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        Ok(self.reconnect.attempts())
    }
}

impl<T: WsTransport> KameoMessage<GetSessionStats> for SessionActor<T> {
    type Reply = SessionResult<SessionStats>;

    async fn handle(&mut self, _msg: GetSessionStats, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        Ok(self.health.get_stats())
    }
}

impl<T: WsTransport> KameoMessage<StartKeepalive> for SessionActor<T> {
    type Reply = SessionResult<()>;

    async fn handle(&mut self, msg: StartKeepalive, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        if !self.keepalive.enable(msg.interval) {
            return Err(SessionError::InvalidState(
                "keepalive interval must be non-zero".to_string(),
            ));
        }
        info!(
            client_id = %self.identity,
            interval_ms = msg.interval.as_millis() as u64,
            "keepalive enabled"
        );
        if self.state.is_connected() {
            self.start_keepalive_ticker();
        }
        Ok(())
    }
}

impl<T: WsTransport> KameoMessage<StopKeepalive> for SessionActor<T> {
    type Reply = SessionResult<()>;

    async fn handle(&mut self, _msg: StopKeepalive, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.keepalive.disable();
        abort_task(&mut self.keepalive_task);
        Ok(())
    }
}

impl<T: WsTransport> SessionActor<T> {
    fn start_connect(&mut self) {
        let Some(url) = self.address.clone() else {
            self.fail_waiters(|| SessionError::InvalidAddress("no session address".to_string()));
            return;
        };
        self.state = ConnectionState::Connecting;
        info!(client_id = %self.identity, address = %url, "opening websocket");

        let epoch = self.epoch;
        let self_ref = self.actor_ref.clone();
        let transport = self.transport.clone();
        let buffers = self.ws_buffers;
        let tls = self.tls;

        self.connect_task = Some(tokio::spawn(async move {
            match transport.connect(url, buffers, tls).await {
                Ok((reader, writer)) => {
                    let _ = self_ref
                        .tell(ConnectionEstablished::<T> {
                            epoch,
                            reader,
                            writer,
                        })
                        .send()
                        .await;
                }
                Err(err) => {
                    let _ = self_ref
                        .tell(ConnectionFailed {
                            epoch,
                            error: err.to_string(),
                        })
                        .send()
                        .await;
                }
            }
        }));
    }

    async fn on_connection_established(&mut self, reader: T::Reader, writer: T::Writer) {
        self.state = ConnectionState::Connected;
        self.reconnect.reset();
        self.keepalive.reset();
        self.health.connection_opened();

        if self.writer_supervisor_ref.is_none() {
            self.writer_supervisor_ref = Some(spawn_writer_supervisor::<T::Writer>());
        }
        if let Some(supervisor) = self.writer_supervisor_ref.as_ref() {
            let writer =
                spawn_writer_supervised_with(supervisor, writer, self.shutdown_rx.clone()).await;
            self.writer_ref = Some(writer);
        }

        self.reader_task = Some(spawn_reader::<T>(
            reader,
            self.actor_ref.clone(),
            self.shutdown_rx.clone(),
            self.epoch,
        ));

        if self.keepalive.is_enabled() {
            self.start_keepalive_ticker();
        }

        info!(
            client_id = %self.identity,
            address = self.address.as_deref().unwrap_or_default(),
            "websocket connected"
        );
        self.notify_observers(true);
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }
    }

    async fn connection_lost(&mut self, cause: WsDisconnectCause) {
        self.teardown_connection(None).await;
        self.state = ConnectionState::Disconnected;
        self.notify_observers(false);
        self.schedule_reconnect(&cause);
    }

    /// Stop the IO tasks of the current connection and retire its epoch.
    async fn teardown_connection(&mut self, close_frame: Option<WsFrame>) {
        abort_task(&mut self.reader_task);
        abort_task(&mut self.keepalive_task);

        // Writes already queued drain ahead of the close frame.
        if let Some(writer) = self.writer_ref.take() {
            let close = writer.ask(WriterClose { frame: close_frame });
            if tokio::time::timeout(WRITER_CLOSE_TIMEOUT, close).await.is_err() {
                debug!(client_id = %self.identity, "writer close timed out");
            }
            let _ = writer.stop_gracefully().await;
            if let Some(supervisor) = self.writer_supervisor_ref.as_ref() {
                writer.unlink(supervisor).await;
            }
        }

        let _ = self.shutdown_tx.send(true);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown_tx = shutdown_tx;
        self.shutdown_rx = shutdown_rx;
        self.keepalive.reset();
        self.health.connection_closed();
        self.epoch = self.epoch.wrapping_add(1);
    }

    fn schedule_reconnect(&mut self, cause: &WsDisconnectCause) {
        match self.reconnect.plan_next() {
            ReconnectPlan::Retry { attempt, delay } => {
                self.health.record_reconnect();
                warn!(
                    client_id = %self.identity,
                    address = self.address.as_deref().unwrap_or_default(),
                    cause = ?cause,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "scheduling reconnect"
                );
                let epoch = self.epoch;
                let actor_ref = self.actor_ref.clone();
                abort_task(&mut self.retry_task);
                self.retry_task = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = actor_ref.tell(ReconnectDue { epoch }).send().await;
                }));
            }
            ReconnectPlan::Exhausted { attempts } => {
                error!(
                    client_id = %self.identity,
                    address = self.address.as_deref().unwrap_or_default(),
                    cause = ?cause,
                    attempts,
                    "max reconnection attempts reached; session stays disconnected"
                );
            }
        }
    }

    fn start_keepalive_ticker(&mut self) {
        abort_task(&mut self.keepalive_task);
        let Some(interval) = self.keepalive.interval() else {
            return;
        };
        let epoch = self.epoch;
        let actor_ref = self.actor_ref.clone();
        self.keepalive_task = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if actor_ref.tell(KeepaliveTick { epoch }).send().await.is_err() {
                    break;
                }
            }
        }));
    }

    fn route(&mut self, message: InboundMessage) {
        if matches!(message, InboundMessage::Pong) {
            if let Some(rtt) = self.keepalive.record_pong() {
                self.health.record_rtt(rtt);
            }
            if !self.dispatcher.contains(kinds::PONG) {
                return;
            }
        }
        match self.dispatcher.route(&message) {
            RouteOutcome::Delivered => {}
            RouteOutcome::Unroutable => self.health.record_route_miss(),
            RouteOutcome::HandlerPanicked => self.health.record_handler_failure(message.kind()),
        }
    }

    async fn write_envelope(&mut self, envelope: &Envelope) -> SendOutcome {
        let wire = match encode_envelope(envelope) {
            Ok(wire) => wire,
            Err(err) => {
                self.health.record_error("encode", &err.to_string());
                warn!(kind = %envelope.kind, error = %err, "failed to encode envelope");
                return SendOutcome::EncodeFailed;
            }
        };
        let Some(writer) = self.writer_ref.clone() else {
            return SendOutcome::NotConnected;
        };
        match writer
            .tell(WriterWrite {
                frame: WsFrame::text(wire),
            })
            .send()
            .await
        {
            Ok(()) => {
                self.health.record_outbound();
                SendOutcome::Sent
            }
            Err(err) => {
                let error = err.to_string();
                self.health.record_error("write", &error);
                warn!(client_id = %self.identity, error = %error, "websocket writer unavailable");
                self.connection_lost(WsDisconnectCause::WriteFailure { error })
                    .await;
                SendOutcome::NotConnected
            }
        }
    }

    fn notify_observers(&mut self, connected: bool) {
        let failures = self.observers.notify(connected);
        self.health.record_observer_failures(failures, connected);
    }

    fn fail_waiters(&mut self, error: impl Fn() -> SessionError) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(error()));
        }
    }
}

fn spawn_reader<T: WsTransport>(
    mut reader: T::Reader,
    actor_ref: ActorRef<SessionActor<T>>,
    mut shutdown_rx: watch::Receiver<bool>,
    epoch: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let cause = loop {
            tokio::select! {
                res = shutdown_rx.changed() => {
                    if res.is_err() || *shutdown_rx.borrow_and_update() {
                        return;
                    }
                }
                frame = reader.next() => match frame {
                    Some(Ok(WsFrame::Close(frame))) => {
                        break WsDisconnectCause::RemoteClosed {
                            code: frame.as_ref().map(|f| f.code),
                            reason: frame
                                .map(|f| String::from_utf8_lossy(f.reason.as_ref()).into_owned())
                                .unwrap_or_default(),
                        };
                    }
                    Some(Ok(frame)) if frame.is_data() => {
                        let decoded = decode(frame_bytes(&frame).unwrap_or_default());
                        if actor_ref.tell(Inbound { epoch, decoded }).send().await.is_err() {
                            return;
                        }
                    }
                    // Protocol ping/pong frames are answered by the transport.
                    Some(Ok(_)) => {}
                    Some(Err(err)) => break WsDisconnectCause::ReadFailure { error: err.to_string() },
                    None => break WsDisconnectCause::StreamEnded,
                }
            }
        };
        let _ = actor_ref.tell(TransportClosed { epoch, cause }).send().await;
    })
}

fn validate_address(address: &str) -> SessionResult<()> {
    let rest = address
        .strip_prefix("ws://")
        .or_else(|| address.strip_prefix("wss://"));
    match rest {
        Some(rest) if !rest.is_empty() => Ok(()),
        _ => Err(SessionError::InvalidAddress(address.to_string())),
    }
}

fn abort_task(handle: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = handle.take() {
        handle.abort();
    }
}
