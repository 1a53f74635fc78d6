use chrono::DateTime;

/// Renders the microsecond timestamps stored in date fields.
pub trait DateFormatter: Send + Sync {
    /// `None` when the timestamp cannot be represented.
    fn format_date(&self, microseconds: i64) -> Option<String>;
}

/// UTC dates, `YYYY-MM-DD` or (long form) `YYYY-MM-DDTHH:MM:SS`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UtcDateFormatter {
    long: bool,
}

impl UtcDateFormatter {
    pub const SHORT_FORMAT: &'static str = "%Y-%m-%d";
    pub const LONG_FORMAT: &'static str = "%Y-%m-%dT%H:%M:%S";

    pub fn short() -> Self {
        Self { long: false }
    }

    pub fn long() -> Self {
        Self { long: true }
    }
}

impl DateFormatter for UtcDateFormatter {
    fn format_date(&self, microseconds: i64) -> Option<String> {
        // only second precision is rendered
        let date = DateTime::from_timestamp(microseconds.div_euclid(1_000_000), 0)?;
        let format = if self.long { Self::LONG_FORMAT } else { Self::SHORT_FORMAT };
        Some(date.format(format).to_string())
    }
}
