const NS_PER_S: i64 = 1_000_000_000;

/// A clock class declared at the trace class level.
///
/// Integer field classes refer to clock classes by identity
/// (`Arc::ptr_eq`), never by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockClass {
    name: String,
    description: Option<String>,
    frequency: u64,
    precision: u64,
    offset_seconds: i64,
    offset_cycles: u64,
    uuid: Option<[u8; 16]>,
    is_absolute: bool,
}

impl ClockClass {
    pub fn new(name: impl Into<String>, frequency: u64) -> Self {
        Self {
            name: name.into(),
            description: None,
            frequency,
            precision: 0,
            offset_seconds: 0,
            offset_cycles: 0,
            uuid: None,
            is_absolute: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_precision(mut self, precision: u64) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_offset(mut self, seconds: i64, cycles: u64) -> Self {
        self.offset_seconds = seconds;
        self.offset_cycles = cycles;
        self
    }

    pub fn with_uuid(mut self, uuid: [u8; 16]) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn with_absolute(mut self, is_absolute: bool) -> Self {
        self.is_absolute = is_absolute;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    pub fn precision(&self) -> u64 {
        self.precision
    }

    pub fn offset_seconds(&self) -> i64 {
        self.offset_seconds
    }

    pub fn offset_cycles(&self) -> u64 {
        self.offset_cycles
    }

    pub fn uuid(&self) -> Option<&[u8; 16]> {
        self.uuid.as_ref()
    }

    pub fn is_absolute(&self) -> bool {
        self.is_absolute
    }

    /// Offset of this clock class once `extra_s` seconds and `extra_ns`
    /// nanoseconds are added to it, normalized so that the cycles part is
    /// lower than the frequency.
    pub fn shifted_offset(&self, extra_s: i64, extra_ns: i64) -> (i64, u64) {
        if extra_s == 0 && extra_ns == 0 {
            return (self.offset_seconds, self.offset_cycles);
        }

        let (fold_s, rem_ns) = fold_ns(extra_ns);
        let mut seconds = self
            .offset_seconds
            .saturating_add(extra_s)
            .saturating_add(fold_s);
        let mut cycles = self
            .offset_cycles
            .saturating_add(cycles_from_ns(self.frequency, rem_ns));

        if self.frequency > 0 && cycles >= self.frequency {
            seconds = seconds.saturating_add((cycles / self.frequency) as i64);
            cycles %= self.frequency;
        }

        (seconds, cycles)
    }
}

/// Splits `ns` into whole seconds and a non-negative nanosecond remainder.
pub(crate) fn fold_ns(ns: i64) -> (i64, u64) {
    (ns.div_euclid(NS_PER_S), ns.rem_euclid(NS_PER_S) as u64)
}

fn cycles_from_ns(frequency: u64, ns: u64) -> u64 {
    if frequency == NS_PER_S as u64 {
        ns
    } else {
        ((ns as f64 * frequency as f64) / 1e9) as u64
    }
}
