//! ISO-8601 timestamps as the Sense API expects them.

use time::{macros::format_description, OffsetDateTime, UtcOffset};

use crate::error::Result;

/// Format `at` in UTC with millisecond precision, e.g.
/// `2024-01-01T12:00:00.000Z`.
pub fn iso8601_utc(at: OffsetDateTime) -> Result<String> {
    let format =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");
    Ok(at.to_offset(UtcOffset::UTC).format(format)?)
}
