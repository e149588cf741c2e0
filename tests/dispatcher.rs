mod common;

use std::sync::{Arc, Mutex};

use common::{class, field, method, FakeRuntime};
use jvm_native_bridge::dispatcher::{EventDispatcher, RequestTarget};
use jvm_native_bridge::error::EventError;
use jvm_native_bridge::event::{array_kind, Event, EventData, EventKind, GcStats, LineRecord, MethodSummary};
use jvm_native_bridge::runtime::{ClassId, ElementType, EnvId, ObjectId, ThreadDescriptor};
use jvm_native_bridge::sys::jvmpi;

struct Harness {
    runtime: FakeRuntime,
    events: EventDispatcher,
    seen: Arc<Mutex<Vec<(Event, i64)>>>,
}

/// A dispatcher whose sink records each event with the GC disable depth at
/// delivery time.
fn harness() -> Harness {
    let runtime = FakeRuntime::new();
    let events = EventDispatcher::new(runtime.gc.clone(), runtime.scheduler.clone(), runtime.objects.clone());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let gc = runtime.gc.clone();
    let log = seen.clone();
    events.set_sink(Arc::new(move |event: &Event| {
        log.lock().unwrap().push((event.clone(), gc.depth()));
    }));

    Harness { runtime, events, seen }
}

impl Harness {
    fn seen(&self) -> Vec<(Event, i64)> {
        self.seen.lock().unwrap().clone()
    }
}

fn sample_class() -> jvm_native_bridge::runtime::ClassInfo {
    let mut info = class(0x500, "com/acme/Widget");
    info.source_file = Some("Widget.java".into());
    info.interface_count = 2;
    info.methods = vec![
        method(0x501, 0x500, "<init>", "()V", Some(&[(0, 10), (4, 11), (9, 14)])),
        method(0x502, 0x500, "size", "()I", None),
        method(0x503, 0x500, "grow", "(I)V", Some(&[(0, 30)])),
    ];
    info.static_fields = vec![field("COUNT", "I")];
    info.instance_fields = vec![field("width", "I"), field("name", "Ljava/lang/String;")];
    info
}

// =============================================================================
// Event control
// =============================================================================

#[test]
fn dump_kinds_are_not_available() {
    let h = harness();
    for kind in [EventKind::HeapDump, EventKind::MonitorDump, EventKind::ObjectDump] {
        assert_eq!(h.events.enable(kind), Err(EventError::NotAvailable(kind)));
        assert!(!h.events.is_enabled(kind));
        assert_eq!(h.events.disable(kind), Err(EventError::NotAvailable(kind)));
    }
}

#[test]
fn enabled_kinds_read_back_set() {
    let h = harness();
    for kind in EventKind::ALL.iter().copied().filter(|k| !k.is_dump()) {
        assert!(!h.events.is_enabled(kind));
        h.events.enable(kind).expect("enable");
        assert!(h.events.is_enabled(kind), "{kind:?}");
    }
    h.events.disable(EventKind::GcStart).expect("disable");
    assert!(!h.events.is_enabled(EventKind::GcStart));
    assert!(h.events.is_enabled(EventKind::GcFinish));
}

#[test]
fn raw_event_numbers_round_through_kinds() {
    let h = harness();
    h.events.enable_raw(jvmpi::JVMPI_EVENT_CLASS_LOAD).expect("enable");
    assert!(h.events.is_enabled(EventKind::ClassLoad));
    assert_eq!(h.events.enable_raw(36), Err(EventError::UnknownKind(36)));
    assert_eq!(EventKind::from_raw(jvmpi::JVMPI_EVENT_GC_FINISH), Some(EventKind::GcFinish));
    assert_eq!(EventKind::ALL.len(), 37);
}

// =============================================================================
// Hooks
// =============================================================================

#[test]
fn hooks_post_only_enabled_kinds() {
    let h = harness();
    h.events.gc_started();
    h.events.jvm_init_done();
    assert!(h.seen().is_empty());

    h.events.enable(EventKind::GcStart).expect("enable");
    h.events.gc_started();
    h.events.jvm_init_done();
    let seen = h.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.data, EventData::GcStart);
    assert!(!seen[0].0.requested);
}

#[test]
fn events_carry_the_posting_environment() {
    let h = harness();
    h.runtime.scheduler.set_current(Some(EnvId(0x77)));
    h.events.enable(EventKind::ThreadEnd).expect("enable");
    h.events.thread_ended();
    assert_eq!(h.seen()[0].0.env_id, Some(EnvId(0x77)));
}

#[test]
fn heap_touching_events_pause_the_collector() {
    let h = harness();
    let widget = h.runtime.objects.add_class(sample_class());
    h.runtime.objects.add_object(ObjectId(0x900), widget.id);
    for kind in [EventKind::ClassLoad, EventKind::ClassUnload, EventKind::ObjectAlloc, EventKind::GcFinish] {
        h.events.enable(kind).expect("enable");
    }

    h.events.class_loaded(&widget);
    h.events.class_unloaded(widget.id);
    h.events.object_allocated(ObjectId(0x900));
    h.events.gc_finished(GcStats::default());

    let depths: Vec<i64> = h.seen().iter().map(|(_, depth)| *depth).collect();
    assert_eq!(depths, vec![1, 1, 1, 0]);
    assert_eq!(h.runtime.gc.depth(), 0);
}

#[test]
fn collector_resumes_when_the_sink_panics() {
    let runtime = FakeRuntime::new();
    let events = EventDispatcher::new(runtime.gc.clone(), runtime.scheduler.clone(), runtime.objects.clone());
    events.set_sink(Arc::new(|_: &Event| panic!("agent bug")));
    events.enable(EventKind::ClassUnload).expect("enable");

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| events.class_unloaded(ClassId(1))));
    assert!(result.is_err());
    assert_eq!(runtime.gc.depth(), 0);
}

#[test]
fn class_load_reports_methods_and_fields() {
    let h = harness();
    let widget = h.runtime.objects.add_class(sample_class());
    h.events.enable(EventKind::ClassLoad).expect("enable");
    h.events.class_loaded(&widget);

    let EventData::ClassLoad(data) = &h.seen()[0].0.data else {
        panic!("expected class load");
    };
    assert_eq!(data.name, "com/acme/Widget");
    assert_eq!(data.source_name.as_deref(), Some("Widget.java"));
    assert_eq!(data.interface_count, 2);
    assert_eq!(data.methods.len(), 3);
    assert_eq!(data.statics.len(), 1);
    assert_eq!(data.instances.len(), 2);
    assert_eq!(data.statics[0].name, "COUNT");
    assert_eq!(data.instances[1].signature, "Ljava/lang/String;");
}

#[test]
fn method_summary_line_range() {
    let init = method(1, 1, "<init>", "()V", Some(&[(0, 10), (4, 11), (9, 14)]));
    let summary = MethodSummary::from_method(&init);
    assert_eq!((summary.start_line, summary.end_line), (10, 14));

    let single = MethodSummary::from_method(&method(2, 1, "x", "()V", Some(&[(0, 3)])));
    assert_eq!((single.start_line, single.end_line), (3, 3));

    let none = MethodSummary::from_method(&method(3, 1, "y", "()V", None));
    assert_eq!((none.start_line, none.end_line), (-1, -1));
}

#[test]
fn line_records_are_relative_to_code_start() {
    let m = method(1, 1, "m", "()V", Some(&[(0x4000, 7), (0x4010, 8)]));
    assert_eq!(
        LineRecord::for_method(&m),
        vec![LineRecord { offset: 0, line: 7 }, LineRecord { offset: 0x10, line: 8 }]
    );
}

#[test]
fn object_alloc_describes_array_kind_and_size() {
    let h = harness();
    let mut ints = class(0x600, "[I");
    ints.array_element = Some(ElementType::Int);
    let ints = h.runtime.objects.add_class(ints);
    h.runtime.objects.add_object(ObjectId(0x901), ints.id);
    h.runtime.gc.set_size(ObjectId(0x901), 48);

    h.events.enable(EventKind::ObjectAlloc).expect("enable");
    h.events.object_allocated(ObjectId(0x901));
    // Unknown objects are skipped.
    h.events.object_allocated(ObjectId(0x999));

    let seen = h.seen();
    assert_eq!(seen.len(), 1);
    let EventData::ObjectAlloc(data) = &seen[0].0.data else {
        panic!("expected object alloc");
    };
    assert_eq!(data.arena_id, -1);
    assert_eq!(data.class, ClassId(0x600));
    assert_eq!(data.is_array, jvmpi::JVMPI_INT);
    assert_eq!(data.size, 48);

    assert_eq!(array_kind(None), jvmpi::JVMPI_NORMAL_OBJECT);
    assert_eq!(array_kind(Some(ElementType::Reference)), jvmpi::JVMPI_CLASS);
    assert_eq!(array_kind(Some(ElementType::Long)), jvmpi::JVMPI_LONG);
}

// =============================================================================
// Requests
// =============================================================================

#[test]
fn requested_class_load_ignores_the_bitmap() {
    let h = harness();
    let widget = h.runtime.objects.add_class(sample_class());
    assert!(!h.events.is_enabled(EventKind::ClassLoad));

    h.events
        .request(EventKind::ClassLoad, RequestTarget::Class(widget.id))
        .expect("request");

    let seen = h.seen();
    assert_eq!(seen.len(), 1);
    let event = &seen[0].0;
    assert!(event.requested);
    assert_eq!(event.raw_type(), jvmpi::JVMPI_EVENT_CLASS_LOAD | jvmpi::JVMPI_REQUESTED_EVENT);
    let EventData::ClassLoad(data) = &event.data else {
        panic!("expected class load");
    };
    assert_eq!((data.methods.len(), data.statics.len() + data.instances.len()), (3, 3));
    assert_eq!(seen[0].1, 1);
}

#[test]
fn requested_thread_start_names_thread_and_group() {
    let h = harness();
    h.runtime.objects.add_thread(ThreadDescriptor {
        thread: ObjectId(0x40),
        name: Some("worker-1".into()),
        group_name: Some("main".into()),
        parent_name: None,
        env: EnvId(0x4000),
    });

    h.events
        .request(EventKind::ThreadStart, RequestTarget::Thread(ObjectId(0x40)))
        .expect("request");
    let EventData::ThreadStart(data) = &h.seen()[0].0.data else {
        panic!("expected thread start");
    };
    assert_eq!(data.thread_name.as_deref(), Some("worker-1"));
    assert_eq!(data.group_name.as_deref(), Some("main"));
    assert_eq!(data.parent_name, None);
    assert_eq!(data.env, EnvId(0x4000));
}

#[test]
fn requested_object_alloc() {
    let h = harness();
    let widget = h.runtime.objects.add_class(sample_class());
    h.runtime.objects.add_object(ObjectId(0x902), widget.id);
    h.events
        .request(EventKind::ObjectAlloc, RequestTarget::Object(ObjectId(0x902)))
        .expect("request");
    assert!(matches!(h.seen()[0].0.data, EventData::ObjectAlloc(ref d) if d.is_array == jvmpi::JVMPI_NORMAL_OBJECT));
}

#[test]
fn unsupported_requests_are_refused() {
    let h = harness();
    assert_eq!(
        h.events.request(EventKind::HeapDump, RequestTarget::Object(ObjectId(1))),
        Err(EventError::NotAvailable(EventKind::HeapDump))
    );
    assert_eq!(
        h.events.request(EventKind::MethodEntry, RequestTarget::Class(ClassId(1))),
        Err(EventError::NotAvailable(EventKind::MethodEntry))
    );
    assert_eq!(
        h.events.request(EventKind::ClassLoad, RequestTarget::Class(ClassId(0xbad))),
        Err(EventError::InvalidTarget(EventKind::ClassLoad))
    );
    assert_eq!(
        h.events.request(EventKind::ClassLoad, RequestTarget::Object(ObjectId(1))),
        Err(EventError::InvalidTarget(EventKind::ClassLoad))
    );
    assert!(h.seen().is_empty());
}

#[test]
fn events_without_a_sink_are_dropped() {
    let runtime = FakeRuntime::new();
    let events = EventDispatcher::new(runtime.gc.clone(), runtime.scheduler.clone(), runtime.objects.clone());
    assert!(!events.has_sink());
    events.enable(EventKind::ClassUnload).expect("enable");
    events.class_unloaded(ClassId(3));
    assert_eq!(runtime.gc.disables.load(std::sync::atomic::Ordering::SeqCst), 0);
}
