//! Metadata update driver.
//!
//! Every pass only visits the parts of the trace class which are not
//! translated yet, so running an update again after adding stream or event
//! classes only processes the new ones.

use log::debug;

use crate::{
    alignment::update_alignments,
    config::DecoderConfig,
    default_clock::update_default_clock_classes,
    in_ir::update_in_ir,
    ir,
    meaning::tag_meanings,
    resolve::resolve_field_classes,
    storing::update_stored_value_indexes,
    stream_config::update_stream_class_config,
    text::reclassify_text,
    trace_class::{Phase, TraceClass},
    translate::translate_trace_class,
    validate::{validate_trace_class, warn_meaningless_header_fields},
    Result,
};

/// Brings a trace class up to date after its metadata grew.
#[derive(Debug, Clone, Default)]
pub struct MetadataUpdate {
    config: DecoderConfig,
}

impl MetadataUpdate {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Runs all passes on `tc` and, unless disabled, adds the IR
    /// counterparts of its new parts to `ir_tc`.
    ///
    /// Stops at the first error. `ir_tc` is only written by the last pass,
    /// so a failed update leaves it untouched.
    pub fn run(&self, tc: &mut TraceClass, ir_tc: &mut ir::TraceClass) -> Result<()> {
        self.config.validate()?;

        if is_up_to_date(tc) {
            debug!("Trace class is up to date");
            return Ok(());
        }

        resolve_field_classes(tc)?;
        advance_pending(tc, Phase::Resolved);

        tag_meanings(tc);
        reclassify_text(tc);
        update_in_ir(tc);
        update_stored_value_indexes(tc)?;
        update_alignments(tc);

        validate_trace_class(tc)?;
        let ignored = warn_meaningless_header_fields(tc);
        if ignored > 0 {
            debug!("{} header fields ignored", ignored);
        }
        advance_pending(tc, Phase::Validated);

        update_stream_class_config(tc);
        update_default_clock_classes(tc)?;

        if !self.config.create_trace_class {
            debug!("Not creating the IR trace class");
            return Ok(());
        }

        translate_trace_class(tc, ir_tc, &self.config)
    }
}

fn is_up_to_date(tc: &TraceClass) -> bool {
    tc.is_translated() && !tc.stream_classes.iter().any(|sc| sc.has_pending_work())
}

fn advance_pending(tc: &mut TraceClass, phase: Phase) {
    tc.advance(phase);
    for sc in &mut tc.stream_classes {
        sc.advance(phase);
        for ec in &mut sc.event_classes {
            ec.advance(phase);
        }
    }
}
