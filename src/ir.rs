//! The portable trace IR the metadata translates to.
//!
//! Only field classes which carry information for trace consumers make it
//! here: header scopes, length fields and tag fields nobody else needs are
//! decoder business and stay in the CTF field class tree.

use std::sync::Arc;

use crate::{
    clock_class::ClockClass as CtfClockClass,
    field_class::{DisplayBase, EnumMapping, EnumRange},
    trace_class::{EnvValue, LogLevel},
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraceClass {
    pub uuid: Option<[u8; 16]>,
    pub environment: Vec<(String, EnvValue)>,
    pub clock_classes: Vec<Arc<ClockClass>>,
    pub stream_classes: Vec<StreamClass>,
    /// CTF clock class each IR clock class was created from.
    pub(crate) clock_class_origins: Vec<Arc<CtfClockClass>>,
}

impl TraceClass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stream_class_by_id(&self, id: u64) -> Option<&StreamClass> {
        self.stream_classes.iter().find(|sc| sc.id == id)
    }

    pub(crate) fn stream_class_by_id_mut(&mut self, id: u64) -> Option<&mut StreamClass> {
        self.stream_classes.iter_mut().find(|sc| sc.id == id)
    }

    pub fn environment_entry(&self, name: &str) -> Option<&EnvValue> {
        self.environment
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| value)
    }

    /// IR counterpart of a CTF clock class, matched by identity.
    pub(crate) fn clock_class_for(&self, cc: &Arc<CtfClockClass>) -> Option<&Arc<ClockClass>> {
        self.clock_class_origins
            .iter()
            .position(|origin| Arc::ptr_eq(origin, cc))
            .map(|i| &self.clock_classes[i])
    }

    pub(crate) fn add_clock_class(&mut self, origin: Arc<CtfClockClass>, cc: Arc<ClockClass>) {
        self.clock_class_origins.push(origin);
        self.clock_classes.push(cc);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockClass {
    pub name: String,
    pub description: Option<String>,
    pub frequency: u64,
    pub precision: u64,
    pub offset_seconds: i64,
    pub offset_cycles: u64,
    pub uuid: Option<[u8; 16]>,
    pub origin_is_unix_epoch: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamClass {
    pub id: u64,
    pub default_clock_class: Option<Arc<ClockClass>>,
    pub packet_context: Option<FieldClass>,
    pub event_common_context: Option<FieldClass>,
    pub supports_packets: bool,
    pub packets_have_beginning_default_clock_snapshot: bool,
    pub packets_have_end_default_clock_snapshot: bool,
    pub supports_discarded_events: bool,
    pub discarded_events_have_default_clock_snapshots: bool,
    pub supports_discarded_packets: bool,
    pub discarded_packets_have_default_clock_snapshots: bool,
    pub event_classes: Vec<EventClass>,
}

impl StreamClass {
    pub fn event_class_by_id(&self, id: u64) -> Option<&EventClass> {
        self.event_classes.iter().find(|ec| ec.id == id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventClass {
    pub id: u64,
    pub name: String,
    pub log_level: Option<LogLevel>,
    pub emf_uri: Option<String>,
    pub specific_context: Option<FieldClass>,
    pub payload: Option<FieldClass>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPathScope {
    PacketContext,
    EventCommonContext,
    EventSpecificContext,
    EventPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPathItem {
    Index(usize),
    CurrentArrayElement,
}

/// Location of a length or selector field class in the IR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    pub scope: FieldPathScope,
    pub items: Vec<FieldPathItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerFieldClass {
    /// Number of bits a value of this class can span.
    pub field_value_range: u32,
    pub preferred_display_base: DisplayBase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationFieldClass {
    pub int: IntegerFieldClass,
    pub mappings: Vec<EnumMapping>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructureMember {
    pub name: String,
    pub fc: FieldClass,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantOption {
    pub name: String,
    pub fc: FieldClass,
    /// Selector values choosing this option; empty without a selector.
    pub ranges: Vec<EnumRange>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldClass {
    UnsignedInteger(IntegerFieldClass),
    SignedInteger(IntegerFieldClass),
    UnsignedEnumeration(EnumerationFieldClass),
    SignedEnumeration(EnumerationFieldClass),
    Real {
        single_precision: bool,
    },
    String,
    Structure {
        members: Vec<StructureMember>,
    },
    StaticArray {
        elem: Box<FieldClass>,
        length: u64,
    },
    DynamicArray {
        elem: Box<FieldClass>,
        length_field_path: Option<FieldPath>,
    },
    Variant {
        selector_field_path: Option<FieldPath>,
        selector_is_signed: bool,
        options: Vec<VariantOption>,
    },
}

impl FieldClass {
    pub fn member(&self, name: &str) -> Option<&FieldClass> {
        match self {
            FieldClass::Structure { members } => {
                members.iter().find(|m| m.name == name).map(|m| &m.fc)
            }
            _ => None,
        }
    }

    pub fn member_count(&self) -> usize {
        match self {
            FieldClass::Structure { members } => members.len(),
            _ => 0,
        }
    }
}
