//! Link-based parent for per-connection child actors.
//!
//! Connection writers are restarted by reconnecting, never in place, so the supervisor only
//! gives them a stable parent to link to and logs when one dies.

use std::convert::Infallible;
use std::marker::PhantomData;
use std::ops::ControlFlow;

use kameo::{
    Actor,
    actor::{ActorID, ActorRef, WeakActorRef},
    error::ActorStopReason,
};
use tracing::debug;

/// Typed link-based supervisor for homogeneous actors.
pub struct TypedSupervisor<A>
where
    A: Actor + Send + Sync + 'static,
{
    name: String,
    _phantom: PhantomData<fn() -> A>,
}

impl<A> TypedSupervisor<A>
where
    A: Actor + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _phantom: PhantomData,
        }
    }
}

impl<A> Actor for TypedSupervisor<A>
where
    A: Actor + Send + Sync + 'static,
{
    type Args = Self;
    type Error = Infallible;

    async fn on_start(args: Self::Args, _actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        Ok(args)
    }

    fn on_link_died(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        id: ActorID,
        reason: ActorStopReason,
    ) -> impl std::future::Future<
        Output = Result<ControlFlow<ActorStopReason>, Self::Error>,
    > + Send {
        debug!(supervisor = %self.name, child = %id, reason = ?reason, "supervised actor stopped");
        async { Ok(ControlFlow::Continue(())) }
    }
}
