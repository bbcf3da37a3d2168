use crate::{clock_class::fold_ns, CtfError, Result};

/// Knobs of a metadata update run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Seconds added to the offset of every translated clock class.
    pub clock_class_offset_s: i64,
    /// Nanoseconds added to the offset of every translated clock class.
    pub clock_class_offset_ns: i64,
    /// Make every translated clock class report a Unix epoch origin.
    pub force_clock_class_origin_unix_epoch: bool,
    /// Translate to IR once the metadata is resolved and validated.
    pub create_trace_class: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            clock_class_offset_s: 0,
            clock_class_offset_ns: 0,
            force_clock_class_origin_unix_epoch: false,
            create_trace_class: true,
        }
    }
}

impl DecoderConfig {
    pub fn with_clock_class_offset(mut self, seconds: i64, nanoseconds: i64) -> Self {
        self.clock_class_offset_s = seconds;
        self.clock_class_offset_ns = nanoseconds;
        self
    }

    pub fn with_force_clock_class_origin_unix_epoch(mut self, force: bool) -> Self {
        self.force_clock_class_origin_unix_epoch = force;
        self
    }

    pub fn with_create_trace_class(mut self, create: bool) -> Self {
        self.create_trace_class = create;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let (fold_s, _) = fold_ns(self.clock_class_offset_ns);
        if self.clock_class_offset_s.checked_add(fold_s).is_none() {
            return Err(CtfError::Config(format!(
                "clock class offset overflows: offset-s={}, offset-ns={}",
                self.clock_class_offset_s, self.clock_class_offset_ns
            )));
        }

        Ok(())
    }
}
