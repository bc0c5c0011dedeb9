use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Upper bound on the trimmed note length, counted in characters.
pub const MAX_CONTENT_CHARS: usize = 128;

const LOCAL_DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Malformed or out-of-range input. Always a client error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Note is required")]
    MissingContent,
    #[error("Note must be at most {max} characters (got {actual})")]
    ContentTooLong { max: usize, actual: usize },
    #[error("Note cannot contain control characters")]
    ContentControlCharacter,
    #[error("Date is required")]
    MissingDate,
    #[error("Time is required")]
    MissingTime,
    #[error("'{value}' is not a valid date-time")]
    InvalidDate { value: String },
    #[error("Date/time cannot be in the past")]
    ScheduledInPast,
    #[error("status must be 'completed' or 'cancelled' (got '{value}')")]
    InvalidStatus { value: String },
    #[error("page must be a positive integer (got '{value}')")]
    InvalidPage { value: String },
    #[error("limit must be an integer between 1 and {max} (got '{value}')")]
    InvalidLimit { value: String, max: u32 },
    #[error("includeCancelled must be true or false (got '{value}')")]
    InvalidFlag { value: String },
}

impl ValidationError {
    /// Request field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingContent
            | Self::ContentTooLong { .. }
            | Self::ContentControlCharacter => "content",
            Self::MissingDate
            | Self::MissingTime
            | Self::InvalidDate { .. }
            | Self::ScheduledInPast => "date",
            Self::InvalidStatus { .. } => "status",
            Self::InvalidPage { .. } => "page",
            Self::InvalidLimit { .. } => "limit",
            Self::InvalidFlag { .. } => "includeCancelled",
        }
    }
}

/// Trims the note and enforces `1..=MAX_CONTENT_CHARS` characters. Line breaks and tabs are the
/// only control characters allowed.
pub fn normalize_content(raw: Option<&str>) -> Result<String, ValidationError> {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingContent);
    }
    if trimmed
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
    {
        return Err(ValidationError::ContentControlCharacter);
    }

    let actual = trimmed.chars().count();
    if actual > MAX_CONTENT_CHARS {
        return Err(ValidationError::ContentTooLong {
            max: MAX_CONTENT_CHARS,
            actual,
        });
    }

    Ok(trimmed.to_string())
}

/// Resolves the requested schedule to an instant.
///
/// Values carrying an offset (`2025-01-10T15:00:00Z`, `...+05:30`) are taken as-is. Values
/// without one (`2025-01-10T15:00`) are read as wall-clock time at `offset`. A bare date is
/// rejected: the time of day is never defaulted.
pub fn parse_scheduled_at(
    raw: Option<&str>,
    offset: FixedOffset,
) -> Result<DateTime<Utc>, ValidationError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(ValidationError::MissingDate);
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }

    for format in LOCAL_DATE_TIME_FORMATS {
        if let Ok(local) = NaiveDateTime::parse_from_str(raw, format) {
            return offset
                .from_local_datetime(&local)
                .single()
                .map(|instant| instant.with_timezone(&Utc))
                .ok_or_else(|| ValidationError::InvalidDate {
                    value: raw.to_string(),
                });
        }
    }

    if NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok() {
        return Err(ValidationError::MissingTime);
    }

    Err(ValidationError::InvalidDate {
        value: raw.to_string(),
    })
}

/// A schedule equal to `now` is accepted; anything strictly earlier is not.
pub fn ensure_not_past(
    scheduled_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if scheduled_at < now {
        Err(ValidationError::ScheduledInPast)
    } else {
        Ok(())
    }
}

/// Ids arrive from URL paths; a NUL byte can never name a stored record.
pub(crate) fn is_storable_id(raw: &str) -> bool {
    !raw.contains('\0')
}

/// Reads the optional `includeCancelled` query flag; absent means `false`.
pub fn parse_include_cancelled(raw: Option<&str>) -> Result<bool, ValidationError> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok(false),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(ValidationError::InvalidFlag {
                value: raw.to_string(),
            }),
        },
    }
}
