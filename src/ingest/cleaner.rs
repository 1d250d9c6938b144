//! Cell value normalization

use calamine::Data;
use chrono::NaiveDateTime;

/// Rendering of spreadsheet date and datetime cells
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Characters stripped from the end of a value after trimming
fn is_trailing_noise(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | '.' | ';' | ':')
}

/// Normalize a raw cell into its canonical string form
///
/// Missing cells become the empty string. Present values are trimmed on both ends,
/// then trailing whitespace and `, . ; :` are removed until none remain. Leading
/// punctuation is kept. `clean(Some(&clean(x)))` always equals `clean(x)`.
///
/// ```
/// use bulk_load::ingest::clean;
///
/// assert_eq!(clean(Some("  Madrid, ")), "Madrid");
/// assert_eq!(clean(Some(", Madrid")), ", Madrid");
/// assert_eq!(clean(None), "");
/// ```
pub fn clean(raw: Option<&str>) -> String {
    match raw {
        None => String::new(),
        Some(value) => value.trim().trim_end_matches(is_trailing_noise).to_string(),
    }
}

/// Stringify a spreadsheet cell and [`clean`] it
///
/// Whole floats print without a fractional part (`1.0` becomes `"1"`). Date cells
/// print as `YYYY-MM-DD HH:MM:SS` and time-delta cells as `H:MM:SS`, never as the
/// underlying Excel serial number.
pub fn clean_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => clean(None),
        Data::String(s) => clean(Some(s)),
        Data::DateTime(dt) if dt.is_duration() => match dt.as_duration() {
            Some(duration) => format_duration(duration),
            None => clean(Some(&cell.to_string())),
        },
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => value.format(DATETIME_FORMAT).to_string(),
            None => clean(Some(&cell.to_string())),
        },
        Data::DateTimeIso(s) => match s.parse::<NaiveDateTime>() {
            Ok(value) => value.format(DATETIME_FORMAT).to_string(),
            Err(_) => clean(Some(s)),
        },
        other => clean(Some(&other.to_string())),
    }
}

fn format_duration(duration: chrono::Duration) -> String {
    let total = duration.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let total = total.unsigned_abs();
    format!(
        "{sign}{}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
