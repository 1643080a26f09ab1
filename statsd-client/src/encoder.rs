use std::fmt::{self, Write as _};

use crate::kind::StatKind;

/// A fully-formatted statsd line, ready to be sent as a single datagram.
///
/// Lines are produced once by [`encode`] and consumed exactly once, either by being sent or by being dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireLine(String);

impl WireLine {
    /// Returns the line as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the length of the line, in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the line is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for WireLine {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WireLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for WireLine {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Returns `true` if a sample taken at `sample_rate` should carry a rate suffix.
pub(crate) fn is_sampled(sample_rate: f64) -> bool {
    // NaN is treated as sampled so that it is never mistaken for a full-rate sample.
    sample_rate < 1.0 || sample_rate.is_nan()
}

/// Encodes a single stat into its wire representation.
///
/// The line has the form `<key>:<value><suffix>`, and when `sample_rate` is below 1.0, `|@<rate>` is appended with
/// the rate rendered to six decimal places so the aggregator can scale the value back up.
pub fn encode(kind: StatKind, key: &str, value: i64, sample_rate: f64) -> WireLine {
    let mut value_buf = itoa::Buffer::new();
    let value = value_buf.format(value);
    let suffix = kind.suffix();

    let mut line = String::with_capacity(key.len() + 1 + value.len() + suffix.len() + 10);
    line.push_str(key);
    line.push(':');
    line.push_str(value);
    line.push_str(suffix);

    if is_sampled(sample_rate) {
        // Writing into a `String` can't fail.
        let _ = write!(line, "|@{sample_rate:.6}");
    }

    WireLine(line)
}
