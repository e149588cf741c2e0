//! Delivery of profiler events to the agent.
//!
//! The runtime calls the hook methods (`class_loaded`, `thread_started`, ...)
//! at the matching points; each hook builds its event only when the agent has
//! enabled that kind. Explicit requests bypass the enable bitmap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::EventError;
use crate::event::{describe_allocation, ClassLoadData, Event, EventData, EventKind, GcStats, ThreadStartData};
use crate::runtime::{ClassId, ClassInfo, GarbageCollector, GcPause, ObjectId, RuntimeObjects, Scheduler};
use crate::sys::jni::jint;

/// Receives events; the agent's `NotifyEvent` sits behind this.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: &Event);
}

impl<F> EventSink for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn notify(&self, event: &Event) {
        self(event)
    }
}

/// What an explicit request is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTarget {
    Class(ClassId),
    Object(ObjectId),
    /// A `java.lang.Thread` object.
    Thread(ObjectId),
}

pub struct EventDispatcher {
    enabled: AtomicU64,
    sink: RwLock<Option<Arc<dyn EventSink>>>,
    gc: Arc<dyn GarbageCollector>,
    scheduler: Arc<dyn Scheduler>,
    objects: Arc<dyn RuntimeObjects>,
}

fn bit(kind: EventKind) -> u64 {
    1u64 << kind.raw()
}

impl EventDispatcher {
    pub fn new(gc: Arc<dyn GarbageCollector>, scheduler: Arc<dyn Scheduler>, objects: Arc<dyn RuntimeObjects>) -> Self {
        EventDispatcher {
            enabled: AtomicU64::new(0),
            sink: RwLock::new(None),
            gc,
            scheduler,
            objects,
        }
    }

    pub fn set_sink(&self, sink: Arc<dyn EventSink>) {
        *self.sink.write() = Some(sink);
    }

    pub fn clear_sink(&self) {
        *self.sink.write() = None;
    }

    pub fn has_sink(&self) -> bool {
        self.sink.read().is_some()
    }

    // -------------------------------------------------------------------------
    // Event control
    // -------------------------------------------------------------------------

    pub fn enable(&self, kind: EventKind) -> Result<(), EventError> {
        if kind.is_dump() {
            return Err(EventError::NotAvailable(kind));
        }
        self.enabled.fetch_or(bit(kind), Ordering::AcqRel);
        debug!(?kind, "event enabled");
        Ok(())
    }

    pub fn disable(&self, kind: EventKind) -> Result<(), EventError> {
        if kind.is_dump() {
            return Err(EventError::NotAvailable(kind));
        }
        self.enabled.fetch_and(!bit(kind), Ordering::AcqRel);
        debug!(?kind, "event disabled");
        Ok(())
    }

    pub fn is_enabled(&self, kind: EventKind) -> bool {
        self.enabled.load(Ordering::Acquire) & bit(kind) != 0
    }

    pub fn enable_raw(&self, raw: jint) -> Result<(), EventError> {
        self.enable(EventKind::from_raw(raw).ok_or(EventError::UnknownKind(raw))?)
    }

    pub fn disable_raw(&self, raw: jint) -> Result<(), EventError> {
        self.disable(EventKind::from_raw(raw).ok_or(EventError::UnknownKind(raw))?)
    }

    /// Builds and posts one event describing `target`, whatever the bitmap says.
    pub fn request(&self, kind: EventKind, target: RequestTarget) -> Result<(), EventError> {
        let data = match (kind, target) {
            (EventKind::ClassLoad, RequestTarget::Class(id)) => {
                let class = self.objects.class(id).ok_or(EventError::InvalidTarget(kind))?;
                EventData::ClassLoad(ClassLoadData::from_class(&class))
            }
            (EventKind::ObjectAlloc, RequestTarget::Object(object)) => {
                let data = describe_allocation(object, &*self.objects, &*self.gc)
                    .ok_or(EventError::InvalidTarget(kind))?;
                EventData::ObjectAlloc(data)
            }
            (EventKind::ThreadStart, RequestTarget::Thread(thread)) => {
                let desc = self.objects.thread(thread).ok_or(EventError::InvalidTarget(kind))?;
                EventData::ThreadStart(ThreadStartData::from(desc))
            }
            (EventKind::ClassLoad | EventKind::ObjectAlloc | EventKind::ThreadStart, _) => {
                return Err(EventError::InvalidTarget(kind));
            }
            _ => return Err(EventError::NotAvailable(kind)),
        };
        self.post(Event::requested(data));
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Delivery
    // -------------------------------------------------------------------------

    /// Stamps the caller's environment on `event` and hands it to the sink.
    pub fn post(&self, mut event: Event) {
        let Some(sink) = self.sink.read().clone() else {
            trace!(kind = ?event.kind(), "no sink installed, event dropped");
            return;
        };
        event.env_id = self.scheduler.current_env();

        let _pause = event.kind().pauses_gc().then(|| GcPause::new(&*self.gc));
        trace!(kind = ?event.kind(), requested = event.requested, "posting event");
        sink.notify(&event);
    }

    fn post_if_enabled(&self, kind: EventKind, build: impl FnOnce() -> Option<EventData>) {
        if !self.is_enabled(kind) {
            return;
        }
        match build() {
            Some(data) => self.post(Event::new(data)),
            None => debug!(?kind, "event target vanished before it could be described"),
        }
    }

    // -------------------------------------------------------------------------
    // Runtime hooks
    // -------------------------------------------------------------------------

    pub fn class_loaded(&self, class: &ClassInfo) {
        self.post_if_enabled(EventKind::ClassLoad, || Some(EventData::ClassLoad(ClassLoadData::from_class(class))));
    }

    pub fn class_unloaded(&self, class: ClassId) {
        self.post_if_enabled(EventKind::ClassUnload, || Some(EventData::ClassUnload { class }));
    }

    pub fn object_allocated(&self, object: ObjectId) {
        self.post_if_enabled(EventKind::ObjectAlloc, || {
            describe_allocation(object, &*self.objects, &*self.gc).map(EventData::ObjectAlloc)
        });
    }

    pub fn object_freed(&self, object: ObjectId) {
        self.post_if_enabled(EventKind::ObjectFree, || Some(EventData::ObjectFree { object }));
    }

    pub fn thread_started(&self, thread: ObjectId) {
        self.post_if_enabled(EventKind::ThreadStart, || {
            self.objects
                .thread(thread)
                .map(|desc| EventData::ThreadStart(ThreadStartData::from(desc)))
        });
    }

    pub fn thread_ended(&self) {
        self.post_if_enabled(EventKind::ThreadEnd, || Some(EventData::ThreadEnd));
    }

    pub fn gc_started(&self) {
        self.post_if_enabled(EventKind::GcStart, || Some(EventData::GcStart));
    }

    pub fn gc_finished(&self, stats: GcStats) {
        self.post_if_enabled(EventKind::GcFinish, || Some(EventData::GcFinish(stats)));
    }

    pub fn jvm_init_done(&self) {
        self.post_if_enabled(EventKind::JvmInitDone, || Some(EventData::JvmInitDone));
    }

    pub fn jvm_shut_down(&self) {
        self.post_if_enabled(EventKind::JvmShutDown, || Some(EventData::JvmShutDown));
    }

    pub fn data_dump_requested(&self) {
        self.post_if_enabled(EventKind::DataDumpRequest, || Some(EventData::DataDumpRequest));
    }

    pub fn data_reset_requested(&self) {
        self.post_if_enabled(EventKind::DataResetRequest, || Some(EventData::DataResetRequest));
    }
}
