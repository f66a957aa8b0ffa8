use crate::core::{SessionError, SessionResult, WsFrame};
use crate::supervision::TypedSupervisor;
use futures_util::{Sink, SinkExt};
use kameo::prelude::{Actor, ActorRef, Context, Message as KameoMessage};
use tokio::sync::watch;
use tracing::debug;

/// Writer actor that owns the transport writer of one connection and serializes its writes.
pub struct WsWriterActor<W>
where
    W: Sink<WsFrame, Error = SessionError> + Send + Sync + Unpin + 'static,
{
    writer: W,
    shutdown_rx: watch::Receiver<bool>,
}

impl<W> WsWriterActor<W>
where
    W: Sink<WsFrame, Error = SessionError> + Send + Sync + Unpin + 'static,
{
    pub fn new(writer: W, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            writer,
            shutdown_rx,
        }
    }
}

impl<W> Actor for WsWriterActor<W>
where
    W: Sink<WsFrame, Error = SessionError> + Send + Sync + Unpin + 'static,
{
    type Args = Self;
    type Error = SessionError;

    async fn on_start(args: Self::Args, _ctx: ActorRef<Self>) -> Result<Self, Self::Error> {
        Ok(args)
    }

    fn on_panic(
        &mut self,
        _actor_ref: kameo::actor::WeakActorRef<Self>,
        err: kameo::prelude::PanicError,
    ) -> impl std::future::Future<
        Output = Result<std::ops::ControlFlow<kameo::prelude::ActorStopReason>, Self::Error>,
    > + Send {
        async move {
            tracing::error!(error = ?err, "WsWriterActor panicked");
            Ok(std::ops::ControlFlow::Break(
                kameo::prelude::ActorStopReason::Panicked(err),
            ))
        }
    }
}

/// Write one frame to the wire.
#[derive(Clone)]
pub struct WriterWrite {
    pub frame: WsFrame,
}

impl<W> KameoMessage<WriterWrite> for WsWriterActor<W>
where
    W: Sink<WsFrame, Error = SessionError> + Send + Sync + Unpin + 'static,
{
    type Reply = SessionResult<()>;

    async fn handle(
        &mut self,
        msg: WriterWrite,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if *self.shutdown_rx.borrow() {
            return Err(SessionError::InvalidState("writer stopped".to_string()));
        }
        debug!(target: "chat-ws-writer", "sending websocket frame to wire");
        self.writer.send(msg.frame).await?;
        Ok(())
    }
}

/// Flush and close the sink; used when the session tears a connection down.
pub struct WriterClose {
    pub frame: Option<WsFrame>,
}

impl<W> KameoMessage<WriterClose> for WsWriterActor<W>
where
    W: Sink<WsFrame, Error = SessionError> + Send + Sync + Unpin + 'static,
{
    type Reply = SessionResult<()>;

    async fn handle(
        &mut self,
        msg: WriterClose,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if let Some(frame) = msg.frame {
            self.writer.feed(frame).await?;
        }
        self.writer.close().await
    }
}

/// Spawn the supervisor writers link to.
pub fn spawn_writer_supervisor<W>() -> ActorRef<TypedSupervisor<WsWriterActor<W>>>
where
    W: Sink<WsFrame, Error = SessionError> + Send + Sync + Unpin + 'static,
{
    TypedSupervisor::spawn(TypedSupervisor::new("chat-ws-writer"))
}

/// Spawn a writer and link it to an existing supervisor.
pub async fn spawn_writer_supervised_with<W>(
    supervisor: &ActorRef<TypedSupervisor<WsWriterActor<W>>>,
    writer: W,
    shutdown_rx: watch::Receiver<bool>,
) -> ActorRef<WsWriterActor<W>>
where
    W: Sink<WsFrame, Error = SessionError> + Send + Sync + Unpin + 'static,
{
    let actor = WsWriterActor::spawn(WsWriterActor::new(writer, shutdown_rx));
    actor.link(supervisor).await;
    actor
}
