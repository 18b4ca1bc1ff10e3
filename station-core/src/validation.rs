//! Structural validation for client payloads.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{LogbookDraft, QsoDraft, ValidationError};

static CALLSIGN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z0-9]+(/[A-Z0-9]+)*$").expect("Failed to compile callsign regex")
});
static ADIF_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{8}$").expect("Failed to compile ADIF date regex"));
static ADIF_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}|\d{6})$").expect("Failed to compile ADIF time regex"));

const MAX_LOGBOOK_NAME_LEN: usize = 64;
const MAX_DESCRIPTION_LEN: usize = 256;

fn matches(re: &Lazy<Regex>, value: &str) -> bool {
    re.is_match(value)
}

fn required(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn invalid(field: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Validate an amateur radio callsign, including portable designators
/// such as `VK2/W1AW/P`. Comparison is case-insensitive.
pub fn validate_callsign(field: &str, callsign: &str) -> Result<(), ValidationError> {
    required(field, callsign)?;
    let upper = callsign.to_ascii_uppercase();
    if !(3..=20).contains(&upper.len()) {
        return Err(invalid(field, "must be 3 to 20 characters"));
    }
    if !matches(&CALLSIGN_RE, &upper) {
        return Err(invalid(field, "must contain only letters, digits and '/'"));
    }
    if !upper.chars().any(|c| c.is_ascii_digit()) || !upper.chars().any(|c| c.is_ascii_alphabetic())
    {
        return Err(invalid(field, "must contain letters and at least one digit"));
    }
    Ok(())
}

impl LogbookDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        required("name", &self.name)?;
        if self.name.chars().count() > MAX_LOGBOOK_NAME_LEN {
            return Err(invalid(
                "name",
                format!("must be at most {} characters", MAX_LOGBOOK_NAME_LEN),
            ));
        }
        validate_callsign("callsign", &self.callsign)?;
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(invalid(
                    "description",
                    format!("must be at most {} characters", MAX_DESCRIPTION_LEN),
                ));
            }
        }
        Ok(())
    }
}

impl QsoDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_callsign("call", &self.call)?;
        validate_callsign("station_callsign", &self.station_callsign)?;
        required("band", &self.band)?;
        required("mode", &self.mode)?;
        if self.band.len() > 8 {
            return Err(invalid("band", "must be at most 8 characters"));
        }
        if self.mode.len() > 16 {
            return Err(invalid("mode", "must be at most 16 characters"));
        }
        if let Some(freq) = self.freq_mhz {
            if !freq.is_finite() || freq <= 0.0 {
                return Err(invalid("freq_mhz", "must be a positive frequency"));
            }
        }
        if !matches(&ADIF_DATE_RE, &self.qso_date) {
            return Err(invalid("qso_date", "expected YYYYMMDD"));
        }
        if !matches(&ADIF_TIME_RE, &self.time_on) {
            return Err(invalid("time_on", "expected HHMM or HHMMSS"));
        }
        Ok(())
    }
}
