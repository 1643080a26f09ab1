use std::fmt;

/// The kind of a stat, which selects the type suffix used on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum StatKind {
    /// A counter, sent as `|c`.
    Counter,

    /// A timer, in milliseconds, sent as `|ms`.
    Timer,

    /// A gauge, sent as `|g`.
    Gauge,

    /// A histogram, sent as `|h`.
    Histogram,

    /// A set of unique values, sent as `|s`.
    Set,
}

impl StatKind {
    /// Returns the wire suffix for this kind, including the leading pipe.
    pub const fn suffix(self) -> &'static str {
        match self {
            StatKind::Counter => "|c",
            StatKind::Timer => "|ms",
            StatKind::Gauge => "|g",
            StatKind::Histogram => "|h",
            StatKind::Set => "|s",
        }
    }

    /// Returns the lowercase name of this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            StatKind::Counter => "counter",
            StatKind::Timer => "timer",
            StatKind::Gauge => "gauge",
            StatKind::Histogram => "histogram",
            StatKind::Set => "set",
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
