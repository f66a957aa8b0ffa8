use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{error, warn};

use super::protocol::InboundMessage;

/// Callback for one inbound message kind.
pub trait MessageHandler: Send + 'static {
    fn handle(&mut self, message: &InboundMessage);
}

impl<F> MessageHandler for F
where
    F: FnMut(&InboundMessage) + Send + 'static,
{
    #[inline]
    fn handle(&mut self, message: &InboundMessage) {
        self(message)
    }
}

/// What happened to one routed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Delivered,
    /// No handler for the kind; logged and dropped.
    Unroutable,
    /// The handler panicked; logged, the registry stays usable.
    HandlerPanicked,
}

/// Handler table keyed by message kind.
///
/// At most one handler per kind: registering a kind again replaces the previous handler (last
/// writer wins). Entries survive reconnects until they are unregistered.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Box<dyn MessageHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when an existing handler was replaced.
    pub fn register(&mut self, kind: impl Into<String>, handler: Box<dyn MessageHandler>) -> bool {
        self.handlers.insert(kind.into(), handler).is_some()
    }

    /// Returns `true` when a handler was removed.
    pub fn unregister(&mut self, kind: &str) -> bool {
        self.handlers.remove(kind).is_some()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn route(&mut self, message: &InboundMessage) -> RouteOutcome {
        let kind = message.kind();
        let Some(handler) = self.handlers.get_mut(kind) else {
            warn!(kind, "no handler registered for message type");
            return RouteOutcome::Unroutable;
        };
        match catch_unwind(AssertUnwindSafe(|| handler.handle(message))) {
            Ok(()) => RouteOutcome::Delivered,
            Err(panic) => {
                error!(kind, panic = %panic_message(&panic), "message handler panicked");
                RouteOutcome::HandlerPanicked
            }
        }
    }
}

pub(crate) fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::{ChatChunk, Notice};
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<(String, InboundMessage)>>>;

    fn recorder(name: &str, log: &Log) -> Box<dyn MessageHandler> {
        let name = name.to_string();
        let log = log.clone();
        Box::new(move |msg: &InboundMessage| {
            log.lock().unwrap().push((name.clone(), msg.clone()));
        })
    }

    fn chunk(content: &str) -> InboundMessage {
        InboundMessage::ChatChunk(ChatChunk {
            content: content.to_string(),
        })
    }

    #[test]
    fn routes_to_exactly_the_matching_handler_once() {
        let log: Log = Arc::default();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("chat_chunk", recorder("chunk", &log));
        dispatcher.register("processing", recorder("processing", &log));

        assert_eq!(dispatcher.route(&chunk("Hi")), RouteOutcome::Delivered);

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0], ("chunk".to_string(), chunk("Hi")));
    }

    #[test]
    fn registering_again_replaces_previous_handler() {
        let log: Log = Arc::default();
        let mut dispatcher = Dispatcher::new();
        assert!(!dispatcher.register("chat_chunk", recorder("first", &log)));
        assert!(dispatcher.register("chat_chunk", recorder("second", &log)));
        assert_eq!(dispatcher.len(), 1);

        dispatcher.route(&chunk("x"));
        let names: Vec<String> = log.lock().unwrap().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, vec!["second".to_string()]);
    }

    #[test]
    fn unregistered_kind_is_unroutable_and_harmless() {
        let log: Log = Arc::default();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("chat_chunk", recorder("chunk", &log));
        assert!(dispatcher.unregister("chat_chunk"));
        assert!(!dispatcher.unregister("chat_chunk"));

        assert_eq!(dispatcher.route(&chunk("lost")), RouteOutcome::Unroutable);
        assert!(log.lock().unwrap().is_empty());
        assert!(dispatcher.is_empty());
    }

    struct Faulty;

    impl MessageHandler for Faulty {
        fn handle(&mut self, _message: &InboundMessage) {
            panic!("handler bug");
        }
    }

    #[test]
    fn panicking_handler_is_isolated() {
        let log: Log = Arc::default();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("processing", Box::new(Faulty));
        dispatcher.register("chat_chunk", recorder("chunk", &log));

        let processing = InboundMessage::Processing(Notice::default());
        assert_eq!(dispatcher.route(&processing), RouteOutcome::HandlerPanicked);
        assert_eq!(dispatcher.route(&chunk("after")), RouteOutcome::Delivered);
        assert_eq!(dispatcher.route(&processing), RouteOutcome::HandlerPanicked);
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
