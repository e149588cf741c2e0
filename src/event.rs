//! Profiler events and the records they carry.
//!
//! [`EventKind`] is the closed set of event numbers an agent can name.
//! [`Event`] is what the dispatcher hands to the sink; only the kinds this
//! runtime actually produces have a payload variant in [`EventData`].

use crate::runtime::{ClassId, ClassInfo, ElementType, EnvId, FieldInfo, GarbageCollector, MethodId, MethodInfo, ObjectId, RuntimeObjects, ThreadDescriptor};
use crate::sys::jni::jint;
use crate::sys::jvmpi;

macro_rules! event_kinds {
    ($($variant:ident = $raw:path),* $(,)?) => {
        /// Every event number of the profiler interface.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum EventKind {
            $($variant),*
        }

        impl EventKind {
            pub const ALL: &'static [EventKind] = &[$(EventKind::$variant),*];

            pub fn from_raw(raw: jint) -> Option<Self> {
                match raw {
                    $(r if r == $raw => Some(EventKind::$variant),)*
                    _ => None,
                }
            }

            pub fn raw(self) -> jint {
                match self {
                    $(EventKind::$variant => $raw),*
                }
            }
        }
    };
}

event_kinds! {
    MethodEntry = jvmpi::JVMPI_EVENT_METHOD_ENTRY,
    MethodEntry2 = jvmpi::JVMPI_EVENT_METHOD_ENTRY2,
    MethodExit = jvmpi::JVMPI_EVENT_METHOD_EXIT,
    ObjectAlloc = jvmpi::JVMPI_EVENT_OBJECT_ALLOC,
    ObjectFree = jvmpi::JVMPI_EVENT_OBJECT_FREE,
    ObjectMove = jvmpi::JVMPI_EVENT_OBJECT_MOVE,
    CompiledMethodLoad = jvmpi::JVMPI_EVENT_COMPILED_METHOD_LOAD,
    CompiledMethodUnload = jvmpi::JVMPI_EVENT_COMPILED_METHOD_UNLOAD,
    InstructionStart = jvmpi::JVMPI_EVENT_INSTRUCTION_START,
    ThreadStart = jvmpi::JVMPI_EVENT_THREAD_START,
    ThreadEnd = jvmpi::JVMPI_EVENT_THREAD_END,
    ClassLoadHook = jvmpi::JVMPI_EVENT_CLASS_LOAD_HOOK,
    HeapDump = jvmpi::JVMPI_EVENT_HEAP_DUMP,
    JniGlobalRefAlloc = jvmpi::JVMPI_EVENT_JNI_GLOBALREF_ALLOC,
    JniGlobalRefFree = jvmpi::JVMPI_EVENT_JNI_GLOBALREF_FREE,
    JniWeakGlobalRefAlloc = jvmpi::JVMPI_EVENT_JNI_WEAK_GLOBALREF_ALLOC,
    JniWeakGlobalRefFree = jvmpi::JVMPI_EVENT_JNI_WEAK_GLOBALREF_FREE,
    ClassLoad = jvmpi::JVMPI_EVENT_CLASS_LOAD,
    ClassUnload = jvmpi::JVMPI_EVENT_CLASS_UNLOAD,
    DataDumpRequest = jvmpi::JVMPI_EVENT_DATA_DUMP_REQUEST,
    DataResetRequest = jvmpi::JVMPI_EVENT_DATA_RESET_REQUEST,
    JvmInitDone = jvmpi::JVMPI_EVENT_JVM_INIT_DONE,
    JvmShutDown = jvmpi::JVMPI_EVENT_JVM_SHUT_DOWN,
    ArenaNew = jvmpi::JVMPI_EVENT_ARENA_NEW,
    ArenaDelete = jvmpi::JVMPI_EVENT_ARENA_DELETE,
    ObjectDump = jvmpi::JVMPI_EVENT_OBJECT_DUMP,
    MonitorContendedEnter = jvmpi::JVMPI_EVENT_MONITOR_CONTENDED_ENTER,
    MonitorContendedEntered = jvmpi::JVMPI_EVENT_MONITOR_CONTENDED_ENTERED,
    MonitorContendedExit = jvmpi::JVMPI_EVENT_MONITOR_CONTENDED_EXIT,
    MonitorWait = jvmpi::JVMPI_EVENT_MONITOR_WAIT,
    MonitorWaited = jvmpi::JVMPI_EVENT_MONITOR_WAITED,
    MonitorDump = jvmpi::JVMPI_EVENT_MONITOR_DUMP,
    GcStart = jvmpi::JVMPI_EVENT_GC_START,
    GcFinish = jvmpi::JVMPI_EVENT_GC_FINISH,
    RawMonitorContendedEnter = jvmpi::JVMPI_EVENT_RAW_MONITOR_CONTENDED_ENTER,
    RawMonitorContendedEntered = jvmpi::JVMPI_EVENT_RAW_MONITOR_CONTENDED_ENTERED,
    RawMonitorContendedExit = jvmpi::JVMPI_EVENT_RAW_MONITOR_CONTENDED_EXIT,
}

impl EventKind {
    /// Heap, monitor and object dumps, which this runtime cannot produce.
    pub fn is_dump(self) -> bool {
        matches!(self, EventKind::HeapDump | EventKind::MonitorDump | EventKind::ObjectDump)
    }

    /// Kinds whose payload points into the heap; the collector is held off
    /// while the agent looks at them.
    pub fn pauses_gc(self) -> bool {
        matches!(self, EventKind::ClassLoad | EventKind::ClassUnload | EventKind::ObjectAlloc)
    }
}

// =============================================================================
// Payload records
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSummary {
    pub id: MethodId,
    pub name: String,
    pub signature: String,
    /// -1 when the method has no line table.
    pub start_line: i32,
    pub end_line: i32,
}

impl MethodSummary {
    pub fn from_method(method: &MethodInfo) -> Self {
        let (start_line, end_line) = match method.lines.as_deref() {
            Some([first, .., last]) => (first.line, last.line),
            Some([only]) => (only.line, only.line),
            _ => (-1, -1),
        };
        MethodSummary {
            id: method.id,
            name: method.name.clone(),
            signature: method.signature.clone(),
            start_line,
            end_line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSummary {
    pub name: String,
    pub signature: String,
}

impl From<&FieldInfo> for FieldSummary {
    fn from(field: &FieldInfo) -> Self {
        FieldSummary {
            name: field.name.clone(),
            signature: field.signature.clone(),
        }
    }
}

/// A line-table row with its pc made relative to the method's code start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRecord {
    pub offset: jint,
    pub line: jint,
}

impl LineRecord {
    pub fn for_method(method: &MethodInfo) -> Vec<LineRecord> {
        method
            .lines
            .iter()
            .flatten()
            .map(|entry| LineRecord {
                offset: entry.start_pc.wrapping_sub(method.code_start) as jint,
                line: entry.line,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLoadData {
    pub class: ClassId,
    pub name: String,
    pub source_name: Option<String>,
    pub interface_count: usize,
    pub methods: Vec<MethodSummary>,
    pub statics: Vec<FieldSummary>,
    pub instances: Vec<FieldSummary>,
}

impl ClassLoadData {
    pub fn from_class(class: &ClassInfo) -> Self {
        ClassLoadData {
            class: class.id,
            name: class.name.clone(),
            source_name: class.source_file.clone(),
            interface_count: class.interface_count,
            methods: class.methods.iter().map(|m| MethodSummary::from_method(m)).collect(),
            statics: class.static_fields.iter().map(FieldSummary::from).collect(),
            instances: class.instance_fields.iter().map(FieldSummary::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectAllocData {
    /// Always -1; the heap has no arenas.
    pub arena_id: jint,
    pub class: ClassId,
    /// `JVMPI_NORMAL_OBJECT`, `JVMPI_CLASS` for reference arrays, or the
    /// primitive code of the element type.
    pub is_array: jint,
    pub size: usize,
    pub object: ObjectId,
}

impl ObjectAllocData {
    pub fn describe(object: ObjectId, class: &ClassInfo, gc: &dyn GarbageCollector) -> Self {
        ObjectAllocData {
            arena_id: -1,
            class: class.id,
            is_array: array_kind(class.array_element),
            size: gc.object_size(object),
            object,
        }
    }
}

/// The `is_array` code for an object of a class with `element` type.
pub fn array_kind(element: Option<ElementType>) -> jint {
    match element {
        None => jvmpi::JVMPI_NORMAL_OBJECT,
        Some(ElementType::Reference) => jvmpi::JVMPI_CLASS,
        Some(ElementType::Boolean) => jvmpi::JVMPI_BOOLEAN,
        Some(ElementType::Char) => jvmpi::JVMPI_CHAR,
        Some(ElementType::Float) => jvmpi::JVMPI_FLOAT,
        Some(ElementType::Double) => jvmpi::JVMPI_DOUBLE,
        Some(ElementType::Byte) => jvmpi::JVMPI_BYTE,
        Some(ElementType::Short) => jvmpi::JVMPI_SHORT,
        Some(ElementType::Int) => jvmpi::JVMPI_INT,
        Some(ElementType::Long) => jvmpi::JVMPI_LONG,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadStartData {
    pub thread_name: Option<String>,
    pub group_name: Option<String>,
    pub parent_name: Option<String>,
    pub thread: ObjectId,
    pub env: EnvId,
}

impl From<ThreadDescriptor> for ThreadStartData {
    fn from(desc: ThreadDescriptor) -> Self {
        ThreadStartData {
            thread_name: desc.name,
            group_name: desc.group_name,
            parent_name: desc.parent_name,
            thread: desc.thread,
            env: desc.env,
        }
    }
}

/// Heap figures reported with `GC_FINISH`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    pub used_objects: i64,
    pub used_object_space: i64,
    pub total_object_space: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventData {
    ClassLoad(ClassLoadData),
    ClassUnload { class: ClassId },
    ObjectAlloc(ObjectAllocData),
    ObjectFree { object: ObjectId },
    ThreadStart(ThreadStartData),
    ThreadEnd,
    GcStart,
    GcFinish(GcStats),
    JvmInitDone,
    JvmShutDown,
    DataDumpRequest,
    DataResetRequest,
}

impl EventData {
    pub fn kind(&self) -> EventKind {
        match self {
            EventData::ClassLoad(_) => EventKind::ClassLoad,
            EventData::ClassUnload { .. } => EventKind::ClassUnload,
            EventData::ObjectAlloc(_) => EventKind::ObjectAlloc,
            EventData::ObjectFree { .. } => EventKind::ObjectFree,
            EventData::ThreadStart(_) => EventKind::ThreadStart,
            EventData::ThreadEnd => EventKind::ThreadEnd,
            EventData::GcStart => EventKind::GcStart,
            EventData::GcFinish(_) => EventKind::GcFinish,
            EventData::JvmInitDone => EventKind::JvmInitDone,
            EventData::JvmShutDown => EventKind::JvmShutDown,
            EventData::DataDumpRequest => EventKind::DataDumpRequest,
            EventData::DataResetRequest => EventKind::DataResetRequest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Environment of the posting thread; stamped by the dispatcher.
    pub env_id: Option<EnvId>,
    /// Set when the agent asked for this event explicitly.
    pub requested: bool,
    pub data: EventData,
}

impl Event {
    pub fn new(data: EventData) -> Self {
        Event {
            env_id: None,
            requested: false,
            data,
        }
    }

    pub fn requested(data: EventData) -> Self {
        Event {
            env_id: None,
            requested: true,
            data,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.data.kind()
    }

    /// The event number as seen by the agent, including the requested flag.
    pub fn raw_type(&self) -> jint {
        let raw = self.kind().raw();
        if self.requested {
            raw | jvmpi::JVMPI_REQUESTED_EVENT
        } else {
            raw
        }
    }
}

/// Looks up `object`'s class and describes the allocation.
pub fn describe_allocation(
    object: ObjectId,
    objects: &dyn RuntimeObjects,
    gc: &dyn GarbageCollector,
) -> Option<ObjectAllocData> {
    let class = objects.class_of(object)?;
    Some(ObjectAllocData::describe(object, &class, gc))
}
