//! Resolution and translation of CTF metadata field classes.
//!
//! The input is a [`TraceClass`] whose field class trees come straight out
//! of a metadata parser: sequence lengths and variant tags are still path
//! strings, and no field carries a meaning, a stored value index, an IR
//! flag or a computed alignment. [`MetadataUpdate`] runs the passes which
//! fill all of that in, checks the result and mirrors it as an
//! [`ir::TraceClass`].

mod alignment;
mod clock_class;
mod config;
mod default_clock;
mod field_class;
mod field_path;
mod in_ir;
pub mod ir;
mod meaning;
mod pipeline;
mod resolve;
mod storing;
mod stream_config;
mod text;
mod trace_class;
mod translate;
mod validate;

#[cfg(test)]
mod tests;

pub use crate::clock_class::ClockClass;
pub use crate::config::DecoderConfig;
pub use crate::field_class::{
    ArrayFieldClass, ByteOrder, DisplayBase, Encoding, EnumFieldClass, EnumMapping, EnumRange,
    FieldClass, FieldClassKind, FloatFieldClass, IntFieldClass, Meaning, NamedFieldClass,
    SequenceFieldClass, StringFieldClass, StructFieldClass, VariantFieldClass, VariantRange,
};
pub use crate::field_path::{FieldPath, PathIndex, Scope};
pub use crate::pipeline::MetadataUpdate;
pub use crate::trace_class::{
    EnvValue, EventClass, LogLevel, LogLevelParseError, Phase, StreamClass, TraceClass,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CtfError {
    #[error("Invalid path string: {0}")]
    PathSyntax(String),

    #[error("Cannot resolve path: {0}")]
    PathLookup(String),

    #[error("Invalid target field class location: {0}")]
    PathOrdering(String),

    #[error("Invalid target field class type: {0}")]
    TargetType(String),

    #[error("Invalid {0}")]
    Structural(String),

    #[error("Invalid clock class reference: {0}")]
    ClockClass(String),

    #[error("Object is already translated: {0}")]
    Frozen(String),

    #[error("Duplicate ID: {0}")]
    DuplicateId(String),

    #[error("Cannot add stream class {0} to a static trace class")]
    StaticTraceClass(u64),

    #[error("Trace class does not match its IR counterpart: {0}")]
    IrMismatch(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(#[from] LogLevelParseError),
}

pub type Result<T> = std::result::Result<T, CtfError>;
