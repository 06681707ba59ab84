//! Push-based event delivery and scoped processor attachment.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::event::BuildEvent;
use crate::processor::{EventProcessor, SessionOutcome, StructuralViolation};
use crate::result::AnalyzerResult;

/// Callback invoked for every published event.
pub type Handler = Arc<dyn Fn(&BuildEvent) + Send + Sync>;

/// Identifies one subscription on an [`EventSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

/// Something that pushes build events to subscribers, such as a live engine
/// or a log replay.
pub trait EventSource: Send + Sync {
    fn subscribe(&self, handler: Handler) -> HandlerId;

    /// Removes a subscription. Returns `false` if it was already gone.
    fn unsubscribe(&self, id: HandlerId) -> bool;
}

/// In-memory [`EventSource`] that delivers synchronously on [`publish`](Self::publish).
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<BTreeMap<HandlerId, Handler>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` to every handler in subscription order.
    pub fn publish(&self, event: &BuildEvent) {
        // Handlers may unsubscribe while being called
        let handlers: Vec<Handler> = self.handlers.read().values().cloned().collect();
        for handler in handlers {
            handler(event);
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }
}

impl EventSource for EventBus {
    fn subscribe(&self, handler: Handler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().insert(id, handler);
        id
    }

    fn unsubscribe(&self, id: HandlerId) -> bool {
        self.handlers.write().remove(&id).is_some()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handler_count())
            .finish_non_exhaustive()
    }
}

/// An [`EventProcessor`] subscribed to a source for as long as it lives.
///
/// Dropping it, or calling [`detach`](Self::detach), removes the
/// subscription; detaching twice is a no-op.
pub struct AttachedProcessor<'a> {
    source: &'a dyn EventSource,
    processor: Arc<Mutex<EventProcessor>>,
    handler: Option<HandlerId>,
}

impl<'a> AttachedProcessor<'a> {
    pub fn attach(source: &'a dyn EventSource, processor: EventProcessor) -> Self {
        let processor = Arc::new(Mutex::new(processor));
        let shared = Arc::clone(&processor);
        let handler = source.subscribe(Arc::new(move |event: &BuildEvent| {
            // Violations are kept on the processor itself
            let _ = shared.lock().process(event);
        }));
        tracing::debug!(?handler, "processor attached");
        Self {
            source,
            processor,
            handler: Some(handler),
        }
    }

    pub fn detach(&mut self) {
        if let Some(handler) = self.handler.take() {
            self.source.unsubscribe(handler);
            tracing::debug!(?handler, "processor detached");
        }
    }

    pub const fn is_attached(&self) -> bool {
        self.handler.is_some()
    }

    /// Snapshot of the results captured so far.
    pub fn results(&self) -> Vec<AnalyzerResult> {
        self.processor.lock().results()
    }

    pub fn violation(&self) -> Option<StructuralViolation> {
        self.processor.lock().violation().cloned()
    }

    /// Detaches and returns what the session produced.
    pub fn finish(self) -> SessionOutcome {
        let processor = Arc::clone(&self.processor);
        drop(self);
        match Arc::try_unwrap(processor) {
            Ok(processor) => processor.into_inner().finish(),
            // A publish still in flight holds the handler
            Err(shared) => shared.lock().clone().finish(),
        }
    }
}

impl Drop for AttachedProcessor<'_> {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for AttachedProcessor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachedProcessor")
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap as Map;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::types::BuildStatus;

    const APP: &str = "/src/app/app.csproj";

    fn session() -> Vec<BuildEvent> {
        vec![
            BuildEvent::build_started(),
            BuildEvent::project_started(APP, &[("TargetFramework", "net8.0")], Map::new()),
            BuildEvent::project_finished(APP, true),
            BuildEvent::build_finished(true),
        ]
    }

    #[test]
    fn bus_delivers_to_every_handler() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let count = Arc::clone(&count);
            bus.subscribe(Arc::new(move |_: &BuildEvent| {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }

        bus.publish(&BuildEvent::build_started());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_reports_whether_handler_existed() {
        let bus = EventBus::new();
        let id = bus.subscribe(Arc::new(|_: &BuildEvent| {}));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.handler_count(), 0);
    }

    #[test]
    fn attached_processor_consumes_published_events() {
        let bus = EventBus::new();
        let attached = AttachedProcessor::attach(&bus, EventProcessor::default());
        for event in session() {
            bus.publish(&event);
        }

        assert_eq!(attached.results().len(), 1);
        let outcome = attached.finish();
        assert_eq!(bus.handler_count(), 0);
        assert_eq!(outcome.overall_success, BuildStatus::Succeeded);
        assert_eq!(outcome.projects.len(), 1);
    }

    #[test]
    fn detach_is_idempotent_and_stops_delivery() {
        let bus = EventBus::new();
        let mut attached = AttachedProcessor::attach(&bus, EventProcessor::default());
        assert!(attached.is_attached());

        attached.detach();
        attached.detach();
        assert!(!attached.is_attached());
        assert_eq!(bus.handler_count(), 0);

        for event in session() {
            bus.publish(&event);
        }
        assert!(attached.results().is_empty());
    }

    #[test]
    fn drop_unsubscribes_so_source_can_be_reused() {
        let bus = EventBus::new();
        {
            let _restore = AttachedProcessor::attach(&bus, EventProcessor::default());
            assert_eq!(bus.handler_count(), 1);
        }
        assert_eq!(bus.handler_count(), 0);

        let build = AttachedProcessor::attach(&bus, EventProcessor::default());
        for event in session() {
            bus.publish(&event);
        }
        assert_eq!(build.finish().projects.len(), 1);
    }

    #[test]
    fn violation_is_visible_through_attachment() {
        let bus = EventBus::new();
        let attached = AttachedProcessor::attach(&bus, EventProcessor::default());
        bus.publish(&BuildEvent::project_finished(APP, true));
        assert!(matches!(
            attached.violation(),
            Some(StructuralViolation::EmptyResultStack { .. })
        ));
    }

    #[test]
    fn events_from_worker_threads_reach_processor() {
        let bus = EventBus::new();
        let attached = AttachedProcessor::attach(&bus, EventProcessor::default());
        bus.publish(&BuildEvent::project_started(
            APP,
            &[("TargetFramework", "net8.0")],
            Map::new(),
        ));

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| bus.publish(&BuildEvent::error("CS0168: unused variable")));
            }
        });

        assert_eq!(attached.results()[0].errors().len(), 4);
    }
}
