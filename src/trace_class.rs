use std::sync::Arc;
use thiserror::Error;

use crate::{
    clock_class::ClockClass,
    field_class::FieldClass,
    field_path::{FieldPath, Scope},
    CtfError, Result,
};

/// How far the metadata update pipeline got with an object.
///
/// Objects only move forward. Once `Translated`, an object has an IR
/// counterpart and its field classes can no longer change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Phase {
    #[default]
    Unresolved,
    Resolved,
    Validated,
    Translated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogLevel {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    DebugSystem = 7,
    DebugProgram = 8,
    DebugProcess = 9,
    DebugModule = 10,
    DebugUnit = 11,
    DebugFunction = 12,
    DebugLine = 13,
    Debug = 14,
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("Invalid log level {0}")]
pub struct LogLevelParseError(u8);

impl TryFrom<u8> for LogLevel {
    fn try_from(value: u8) -> std::result::Result<Self, LogLevelParseError> {
        match value {
            0 => Ok(Self::Emergency),
            1 => Ok(Self::Alert),
            2 => Ok(Self::Critical),
            3 => Ok(Self::Error),
            4 => Ok(Self::Warning),
            5 => Ok(Self::Notice),
            6 => Ok(Self::Info),
            7 => Ok(Self::DebugSystem),
            8 => Ok(Self::DebugProgram),
            9 => Ok(Self::DebugProcess),
            10 => Ok(Self::DebugModule),
            11 => Ok(Self::DebugUnit),
            12 => Ok(Self::DebugFunction),
            13 => Ok(Self::DebugLine),
            14 => Ok(Self::Debug),
            _ => Err(LogLevelParseError(value)),
        }
    }

    type Error = LogLevelParseError;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    Int(i64),
    Str(String),
}

fn frozen(what: String) -> CtfError {
    CtfError::Frozen(what)
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventClass {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) log_level: Option<LogLevel>,
    pub(crate) emf_uri: Option<String>,
    pub(crate) spec_context_fc: Option<FieldClass>,
    pub(crate) payload_fc: Option<FieldClass>,
    pub(crate) phase: Phase,
}

impl EventClass {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            log_level: None,
            emf_uri: None,
            spec_context_fc: None,
            payload_fc: None,
            phase: Phase::default(),
        }
    }

    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = Some(log_level);
        self
    }

    pub fn with_emf_uri(mut self, emf_uri: impl Into<String>) -> Self {
        self.emf_uri = Some(emf_uri.into());
        self
    }

    pub fn with_specific_context(mut self, fc: FieldClass) -> Self {
        self.spec_context_fc = Some(fc);
        self
    }

    pub fn with_payload(mut self, fc: FieldClass) -> Self {
        self.payload_fc = Some(fc);
        self
    }

    pub fn set_specific_context(&mut self, fc: FieldClass) -> Result<()> {
        if self.is_translated() {
            return Err(frozen(format!("event class {}", self.id)));
        }
        self.spec_context_fc = Some(fc);
        Ok(())
    }

    pub fn set_payload(&mut self, fc: FieldClass) -> Result<()> {
        if self.is_translated() {
            return Err(frozen(format!("event class {}", self.id)));
        }
        self.payload_fc = Some(fc);
        Ok(())
    }

    /// Sets the log level from its numeric metadata value.
    pub fn set_log_level(&mut self, value: u8) -> Result<()> {
        if self.is_translated() {
            return Err(frozen(format!("event class {}", self.id)));
        }
        self.log_level = Some(LogLevel::try_from(value)?);
        Ok(())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    pub fn emf_uri(&self) -> Option<&str> {
        self.emf_uri.as_deref()
    }

    pub fn specific_context(&self) -> Option<&FieldClass> {
        self.spec_context_fc.as_ref()
    }

    pub fn payload(&self) -> Option<&FieldClass> {
        self.payload_fc.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_translated(&self) -> bool {
        self.phase == Phase::Translated
    }

    pub(crate) fn advance(&mut self, phase: Phase) {
        if self.phase < phase {
            self.phase = phase;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamClass {
    pub(crate) id: u64,
    pub(crate) packet_context_fc: Option<FieldClass>,
    pub(crate) event_header_fc: Option<FieldClass>,
    pub(crate) event_common_context_fc: Option<FieldClass>,
    pub(crate) event_classes: Vec<EventClass>,
    pub(crate) default_clock_class: Option<Arc<ClockClass>>,
    pub(crate) packets_have_ts_begin: bool,
    pub(crate) packets_have_ts_end: bool,
    pub(crate) has_discarded_events: bool,
    pub(crate) discarded_events_have_default_cs: bool,
    pub(crate) has_discarded_packets: bool,
    pub(crate) discarded_packets_have_default_cs: bool,
    pub(crate) phase: Phase,
}

impl StreamClass {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            packet_context_fc: None,
            event_header_fc: None,
            event_common_context_fc: None,
            event_classes: Vec::new(),
            default_clock_class: None,
            packets_have_ts_begin: false,
            packets_have_ts_end: false,
            has_discarded_events: false,
            discarded_events_have_default_cs: false,
            has_discarded_packets: false,
            discarded_packets_have_default_cs: false,
            phase: Phase::default(),
        }
    }

    pub fn with_packet_context(mut self, fc: FieldClass) -> Self {
        self.packet_context_fc = Some(fc);
        self
    }

    pub fn with_event_header(mut self, fc: FieldClass) -> Self {
        self.event_header_fc = Some(fc);
        self
    }

    pub fn with_event_common_context(mut self, fc: FieldClass) -> Self {
        self.event_common_context_fc = Some(fc);
        self
    }

    pub fn with_default_clock_class(mut self, clock_class: Arc<ClockClass>) -> Self {
        self.default_clock_class = Some(clock_class);
        self
    }

    pub fn with_event_class(mut self, ec: EventClass) -> Result<Self> {
        self.add_event_class(ec)?;
        Ok(self)
    }

    /// Event classes may be added to a translated stream class; only the
    /// new ones go through the pipeline.
    pub fn add_event_class(&mut self, ec: EventClass) -> Result<()> {
        if self.event_class_by_id(ec.id).is_some() {
            return Err(CtfError::DuplicateId(format!(
                "event class {} in stream class {}",
                ec.id, self.id
            )));
        }
        self.event_classes.push(ec);
        Ok(())
    }

    pub fn set_packet_context(&mut self, fc: FieldClass) -> Result<()> {
        self.ensure_mutable()?;
        self.packet_context_fc = Some(fc);
        Ok(())
    }

    pub fn set_event_header(&mut self, fc: FieldClass) -> Result<()> {
        self.ensure_mutable()?;
        self.event_header_fc = Some(fc);
        Ok(())
    }

    pub fn set_event_common_context(&mut self, fc: FieldClass) -> Result<()> {
        self.ensure_mutable()?;
        self.event_common_context_fc = Some(fc);
        Ok(())
    }

    pub fn set_default_clock_class(&mut self, clock_class: Arc<ClockClass>) -> Result<()> {
        self.ensure_mutable()?;
        self.default_clock_class = Some(clock_class);
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.is_translated() {
            return Err(frozen(format!("stream class {}", self.id)));
        }
        Ok(())
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn packet_context(&self) -> Option<&FieldClass> {
        self.packet_context_fc.as_ref()
    }

    pub fn event_header(&self) -> Option<&FieldClass> {
        self.event_header_fc.as_ref()
    }

    pub fn event_common_context(&self) -> Option<&FieldClass> {
        self.event_common_context_fc.as_ref()
    }

    pub fn event_classes(&self) -> &[EventClass] {
        &self.event_classes
    }

    pub fn event_class_by_id(&self, id: u64) -> Option<&EventClass> {
        self.event_classes.iter().find(|ec| ec.id == id)
    }

    pub fn event_class_by_id_mut(&mut self, id: u64) -> Option<&mut EventClass> {
        self.event_classes.iter_mut().find(|ec| ec.id == id)
    }

    pub fn default_clock_class(&self) -> Option<&Arc<ClockClass>> {
        self.default_clock_class.as_ref()
    }

    pub fn packets_have_ts_begin(&self) -> bool {
        self.packets_have_ts_begin
    }

    pub fn packets_have_ts_end(&self) -> bool {
        self.packets_have_ts_end
    }

    pub fn has_discarded_events(&self) -> bool {
        self.has_discarded_events
    }

    pub fn discarded_events_have_default_cs(&self) -> bool {
        self.discarded_events_have_default_cs
    }

    pub fn has_discarded_packets(&self) -> bool {
        self.has_discarded_packets
    }

    pub fn discarded_packets_have_default_cs(&self) -> bool {
        self.discarded_packets_have_default_cs
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_translated(&self) -> bool {
        self.phase == Phase::Translated
    }

    pub(crate) fn advance(&mut self, phase: Phase) {
        if self.phase < phase {
            self.phase = phase;
        }
    }

    /// Whether this stream class or one of its event classes still has to
    /// go through the pipeline.
    pub(crate) fn has_pending_work(&self) -> bool {
        !self.is_translated() || self.event_classes.iter().any(|ec| !ec.is_translated())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraceClass {
    pub(crate) uuid: Option<[u8; 16]>,
    pub(crate) environment: Vec<(String, EnvValue)>,
    pub(crate) packet_header_fc: Option<FieldClass>,
    pub(crate) stream_classes: Vec<StreamClass>,
    pub(crate) clock_classes: Vec<Arc<ClockClass>>,
    pub(crate) stored_value_count: usize,
    pub(crate) is_static: bool,
    pub(crate) phase: Phase,
}

impl TraceClass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uuid(mut self, uuid: [u8; 16]) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn with_packet_header(mut self, fc: FieldClass) -> Self {
        self.packet_header_fc = Some(fc);
        self
    }

    pub fn with_environment_entry(mut self, name: impl Into<String>, value: EnvValue) -> Self {
        self.environment.push((name.into(), value));
        self
    }

    pub fn with_stream_class(mut self, sc: StreamClass) -> Result<Self> {
        self.add_stream_class(sc)?;
        Ok(self)
    }

    pub fn set_packet_header(&mut self, fc: FieldClass) -> Result<()> {
        if self.is_translated() {
            return Err(frozen("trace class".to_string()));
        }
        self.packet_header_fc = Some(fc);
        Ok(())
    }

    /// Registers a clock class and returns the handle integer field
    /// classes map to.
    pub fn add_clock_class(&mut self, clock_class: ClockClass) -> Arc<ClockClass> {
        let clock_class = Arc::new(clock_class);
        self.clock_classes.push(Arc::clone(&clock_class));
        clock_class
    }

    pub fn add_stream_class(&mut self, sc: StreamClass) -> Result<()> {
        if self.is_static {
            return Err(CtfError::StaticTraceClass(sc.id));
        }
        if self.stream_class_by_id(sc.id).is_some() {
            return Err(CtfError::DuplicateId(format!("stream class {}", sc.id)));
        }
        self.stream_classes.push(sc);
        Ok(())
    }

    /// No stream class can be added once a trace class is static.
    pub fn set_static(&mut self) {
        self.is_static = true;
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn uuid(&self) -> Option<&[u8; 16]> {
        self.uuid.as_ref()
    }

    pub fn environment(&self) -> &[(String, EnvValue)] {
        &self.environment
    }

    pub fn packet_header(&self) -> Option<&FieldClass> {
        self.packet_header_fc.as_ref()
    }

    pub fn stream_classes(&self) -> &[StreamClass] {
        &self.stream_classes
    }

    pub fn stream_class_by_id(&self, id: u64) -> Option<&StreamClass> {
        self.stream_classes.iter().find(|sc| sc.id == id)
    }

    pub fn stream_class_by_id_mut(&mut self, id: u64) -> Option<&mut StreamClass> {
        self.stream_classes.iter_mut().find(|sc| sc.id == id)
    }

    pub fn clock_classes(&self) -> &[Arc<ClockClass>] {
        &self.clock_classes
    }

    /// Size of the decode-time stored value array.
    pub fn stored_value_count(&self) -> usize {
        self.stored_value_count
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_translated(&self) -> bool {
        self.phase == Phase::Translated
    }

    pub(crate) fn advance(&mut self, phase: Phase) {
        if self.phase < phase {
            self.phase = phase;
        }
    }

    /// Root field class of `scope` as seen from stream class `sc` and
    /// event class `ec` (indexes into their containers).
    pub fn scope_field_class(
        &self,
        scope: Scope,
        sc: Option<usize>,
        ec: Option<usize>,
    ) -> Option<&FieldClass> {
        match scope {
            Scope::PacketHeader => self.packet_header_fc.as_ref(),
            Scope::PacketContext => self.stream_classes.get(sc?)?.packet_context_fc.as_ref(),
            Scope::EventHeader => self.stream_classes.get(sc?)?.event_header_fc.as_ref(),
            Scope::EventCommonContext => self
                .stream_classes
                .get(sc?)?
                .event_common_context_fc
                .as_ref(),
            Scope::EventSpecificContext => self
                .stream_classes
                .get(sc?)?
                .event_classes
                .get(ec?)?
                .spec_context_fc
                .as_ref(),
            Scope::EventPayload => self
                .stream_classes
                .get(sc?)?
                .event_classes
                .get(ec?)?
                .payload_fc
                .as_ref(),
        }
    }

    fn scope_field_class_mut(
        &mut self,
        scope: Scope,
        sc: Option<usize>,
        ec: Option<usize>,
    ) -> Option<&mut FieldClass> {
        match scope {
            Scope::PacketHeader => self.packet_header_fc.as_mut(),
            Scope::PacketContext => self.stream_classes.get_mut(sc?)?.packet_context_fc.as_mut(),
            Scope::EventHeader => self.stream_classes.get_mut(sc?)?.event_header_fc.as_mut(),
            Scope::EventCommonContext => self
                .stream_classes
                .get_mut(sc?)?
                .event_common_context_fc
                .as_mut(),
            Scope::EventSpecificContext => self
                .stream_classes
                .get_mut(sc?)?
                .event_classes
                .get_mut(ec?)?
                .spec_context_fc
                .as_mut(),
            Scope::EventPayload => self
                .stream_classes
                .get_mut(sc?)?
                .event_classes
                .get_mut(ec?)?
                .payload_fc
                .as_mut(),
        }
    }

    /// Field class designated by `path` as seen from stream class `sc` and
    /// event class `ec`.
    pub fn field_class_at(
        &self,
        path: &FieldPath,
        sc: Option<usize>,
        ec: Option<usize>,
    ) -> Option<&FieldClass> {
        self.scope_field_class(path.root(), sc, ec)?
            .descendant(path.indexes())
    }

    pub(crate) fn field_class_at_mut(
        &mut self,
        path: &FieldPath,
        sc: Option<usize>,
        ec: Option<usize>,
    ) -> Option<&mut FieldClass> {
        self.scope_field_class_mut(path.root(), sc, ec)?
            .descendant_mut(path.indexes())
    }

    /// Root field classes of every scope not translated yet, in decoding
    /// order.
    pub(crate) fn pending_roots_mut(&mut self) -> Vec<ScopeRoot<'_>> {
        let mut roots = Vec::new();

        if !self.is_translated() {
            if let Some(fc) = self.packet_header_fc.as_mut() {
                roots.push(ScopeRoot::new(Scope::PacketHeader, None, None, fc));
            }
        }

        for (sc_idx, sc) in self.stream_classes.iter_mut().enumerate() {
            if !sc.is_translated() {
                let stream_roots = [
                    (Scope::PacketContext, sc.packet_context_fc.as_mut()),
                    (Scope::EventHeader, sc.event_header_fc.as_mut()),
                    (Scope::EventCommonContext, sc.event_common_context_fc.as_mut()),
                ];
                for (scope, fc) in stream_roots {
                    if let Some(fc) = fc {
                        roots.push(ScopeRoot::new(scope, Some(sc_idx), None, fc));
                    }
                }
            }

            for (ec_idx, ec) in sc.event_classes.iter_mut().enumerate() {
                if ec.is_translated() {
                    continue;
                }
                let event_roots = [
                    (Scope::EventSpecificContext, ec.spec_context_fc.as_mut()),
                    (Scope::EventPayload, ec.payload_fc.as_mut()),
                ];
                for (scope, fc) in event_roots {
                    if let Some(fc) = fc {
                        roots.push(ScopeRoot::new(scope, Some(sc_idx), Some(ec_idx), fc));
                    }
                }
            }
        }

        roots
    }
}

/// A scope root handed out to the passes, with the indexes of the stream
/// and event classes owning it.
pub(crate) struct ScopeRoot<'a> {
    pub scope: Scope,
    pub sc: Option<usize>,
    pub ec: Option<usize>,
    pub fc: &'a mut FieldClass,
}

impl<'a> ScopeRoot<'a> {
    fn new(scope: Scope, sc: Option<usize>, ec: Option<usize>, fc: &'a mut FieldClass) -> Self {
        Self { scope, sc, ec, fc }
    }
}
