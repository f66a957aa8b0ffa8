use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::error;

use super::dispatch::panic_message;

/// Subscriber notified on every transition into or out of `Connected`.
pub trait ConnectionObserver: Send + 'static {
    fn on_connection_change(&mut self, connected: bool);
}

impl<F> ConnectionObserver for F
where
    F: FnMut(bool) + Send + 'static,
{
    #[inline]
    fn on_connection_change(&mut self, connected: bool) {
        self(connected)
    }
}

/// Identity of one subscription; returned by `subscribe`, consumed by `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Ordered observer list, invoked synchronously in subscription order.
#[derive(Default)]
pub struct ObserverList {
    next_id: u64,
    observers: Vec<(ObserverId, Box<dyn ConnectionObserver>)>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Box<dyn ConnectionObserver>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.observers.push((id, observer));
        id
    }

    /// Returns `true` when the subscription existed.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Notify every observer; returns how many of them panicked.
    pub fn notify(&mut self, connected: bool) -> usize {
        let mut failures = 0;
        for (id, observer) in self.observers.iter_mut() {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                observer.on_connection_change(connected)
            }));
            if let Err(panic) = outcome {
                failures += 1;
                error!(
                    observer = ?id,
                    connected,
                    panic = %panic_message(&panic),
                    "connection observer panicked"
                );
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<(&'static str, bool)>>>) -> Box<dyn ConnectionObserver> {
        let log = log.clone();
        Box::new(move |connected: bool| log.lock().unwrap().push((name, connected)))
    }

    #[test]
    fn observers_run_in_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut list = ObserverList::new();
        list.subscribe(recorder("a", &log));
        list.subscribe(recorder("b", &log));

        list.notify(true);
        list.notify(false);

        assert_eq!(
            *log.lock().unwrap(),
            vec![("a", true), ("b", true), ("a", false), ("b", false)]
        );
    }

    #[test]
    fn unsubscribe_removes_only_that_subscription() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut list = ObserverList::new();
        let a = list.subscribe(recorder("a", &log));
        list.subscribe(recorder("b", &log));

        assert!(list.unsubscribe(a));
        assert!(!list.unsubscribe(a));
        list.notify(true);

        assert_eq!(*log.lock().unwrap(), vec![("b", true)]);
        assert_eq!(list.len(), 1);
    }

    struct Faulty;

    impl ConnectionObserver for Faulty {
        fn on_connection_change(&mut self, _connected: bool) {
            panic!("observer bug");
        }
    }

    #[test]
    fn failing_observer_does_not_stop_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut list = ObserverList::new();
        list.subscribe(Box::new(Faulty));
        list.subscribe(recorder("after", &log));

        assert_eq!(list.notify(false), 1);
        assert_eq!(*log.lock().unwrap(), vec![("after", false)]);
    }
}
