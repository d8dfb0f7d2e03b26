use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const DEFAULT_PERCENTAGE: u32 = 70;
pub const DEFAULT_LESSONS_TOTAL: u32 = 5;
pub const DEFAULT_TIME_SPENT_MINUTES: u32 = 10;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 15 * 60;
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 4_000;
pub const DEFAULT_REMOTE_LIMIT: u32 = 20;
pub const DEFAULT_REMOTE_BATCH_SIZE: usize = 5;
pub const DEFAULT_SYNTHETIC_RECORDS_PER_SUBJECT: u32 = 2;
pub const MAX_SYNTHETIC_RECORDS_PER_SUBJECT: u32 = 5;

/// Validated tuning knobs for the progress subsystem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressSettings {
    default_percentage: u32,
    default_lessons_total: u32,
    default_time_spent_minutes: u32,
    cache_ttl_secs: u64,
    remote_timeout_ms: u64,
    remote_limit: u32,
    remote_batch_size: usize,
    week_utc_offset_minutes: i32,
    synthetic_fallback: bool,
    synthetic_records_per_subject: u32,
    remote_base_url: Option<String>,
}

/// Unvalidated settings; every `None` falls back to the built-in default.
#[derive(Clone, Debug, Default)]
pub struct ProgressSettingsDraft {
    pub default_percentage: Option<u32>,
    pub default_lessons_total: Option<u32>,
    pub default_time_spent_minutes: Option<u32>,
    pub cache_ttl_secs: Option<u64>,
    pub remote_timeout_ms: Option<u64>,
    pub remote_limit: Option<u32>,
    pub remote_batch_size: Option<usize>,
    pub week_utc_offset_minutes: Option<i32>,
    pub synthetic_fallback: Option<bool>,
    pub synthetic_records_per_subject: Option<u32>,
    pub remote_base_url: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("default percentage must be at most 100, got {0}")]
    PercentageOutOfRange(u32),
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("week offset must be within +/-18 hours, got {0} minutes")]
    OffsetOutOfRange(i32),
    #[error("synthetic records per subject must be at most {max}, got {got}")]
    TooManySynthetic { got: u32, max: u32 },
    #[error("invalid remote base URL")]
    InvalidBaseUrl,
}

impl ProgressSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the draft and fill defaults.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if any value is out of range or the base URL is invalid.
    pub fn validate(self) -> Result<ProgressSettings, SettingsError> {
        let default_percentage = self.default_percentage.unwrap_or(DEFAULT_PERCENTAGE);
        if default_percentage > 100 {
            return Err(SettingsError::PercentageOutOfRange(default_percentage));
        }

        let default_lessons_total = non_zero(
            "default_lessons_total",
            self.default_lessons_total.unwrap_or(DEFAULT_LESSONS_TOTAL),
        )?;
        let cache_ttl_secs = non_zero(
            "cache_ttl_secs",
            self.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS),
        )?;
        let remote_timeout_ms = non_zero(
            "remote_timeout_ms",
            self.remote_timeout_ms.unwrap_or(DEFAULT_REMOTE_TIMEOUT_MS),
        )?;
        let remote_limit = non_zero(
            "remote_limit",
            self.remote_limit.unwrap_or(DEFAULT_REMOTE_LIMIT),
        )?;
        let remote_batch_size = non_zero(
            "remote_batch_size",
            self.remote_batch_size.unwrap_or(DEFAULT_REMOTE_BATCH_SIZE),
        )?;

        let week_utc_offset_minutes = self.week_utc_offset_minutes.unwrap_or(0);
        if week_utc_offset_minutes.abs() > 18 * 60 {
            return Err(SettingsError::OffsetOutOfRange(week_utc_offset_minutes));
        }

        let synthetic_records_per_subject = non_zero(
            "synthetic_records_per_subject",
            self.synthetic_records_per_subject
                .unwrap_or(DEFAULT_SYNTHETIC_RECORDS_PER_SUBJECT),
        )?;
        if synthetic_records_per_subject > MAX_SYNTHETIC_RECORDS_PER_SUBJECT {
            return Err(SettingsError::TooManySynthetic {
                got: synthetic_records_per_subject,
                max: MAX_SYNTHETIC_RECORDS_PER_SUBJECT,
            });
        }

        let remote_base_url = normalize_optional(self.remote_base_url);
        if let Some(url) = remote_base_url.as_ref() {
            if Url::parse(url).is_err() {
                return Err(SettingsError::InvalidBaseUrl);
            }
        }

        Ok(ProgressSettings {
            default_percentage,
            default_lessons_total,
            default_time_spent_minutes: self
                .default_time_spent_minutes
                .unwrap_or(DEFAULT_TIME_SPENT_MINUTES),
            cache_ttl_secs,
            remote_timeout_ms,
            remote_limit,
            remote_batch_size,
            week_utc_offset_minutes,
            synthetic_fallback: self.synthetic_fallback.unwrap_or(true),
            synthetic_records_per_subject,
            remote_base_url,
        })
    }
}

impl ProgressSettings {
    #[must_use]
    pub fn default_percentage(&self) -> u32 {
        self.default_percentage
    }

    #[must_use]
    pub fn default_lessons_total(&self) -> u32 {
        self.default_lessons_total
    }

    #[must_use]
    pub fn default_time_spent_minutes(&self) -> u32 {
        self.default_time_spent_minutes
    }

    #[must_use]
    pub fn cache_ttl_secs(&self) -> u64 {
        self.cache_ttl_secs
    }

    #[must_use]
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    #[must_use]
    pub fn remote_limit(&self) -> u32 {
        self.remote_limit
    }

    #[must_use]
    pub fn remote_batch_size(&self) -> usize {
        self.remote_batch_size
    }

    #[must_use]
    pub fn week_utc_offset_minutes(&self) -> i32 {
        self.week_utc_offset_minutes
    }

    #[must_use]
    pub fn synthetic_fallback(&self) -> bool {
        self.synthetic_fallback
    }

    #[must_use]
    pub fn synthetic_records_per_subject(&self) -> u32 {
        self.synthetic_records_per_subject
    }

    #[must_use]
    pub fn remote_base_url(&self) -> Option<&str> {
        self.remote_base_url.as_deref()
    }
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            default_percentage: DEFAULT_PERCENTAGE,
            default_lessons_total: DEFAULT_LESSONS_TOTAL,
            default_time_spent_minutes: DEFAULT_TIME_SPENT_MINUTES,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            remote_timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
            remote_limit: DEFAULT_REMOTE_LIMIT,
            remote_batch_size: DEFAULT_REMOTE_BATCH_SIZE,
            week_utc_offset_minutes: 0,
            synthetic_fallback: true,
            synthetic_records_per_subject: DEFAULT_SYNTHETIC_RECORDS_PER_SUBJECT,
            remote_base_url: None,
        }
    }
}

fn non_zero<T: Default + PartialEq>(field: &'static str, value: T) -> Result<T, SettingsError> {
    if value == T::default() {
        return Err(SettingsError::Zero { field });
    }
    Ok(value)
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_draft_matches_defaults() {
        let settings = ProgressSettingsDraft::new().validate().unwrap();
        assert_eq!(settings, ProgressSettings::default());
        assert_eq!(settings.cache_ttl_secs(), 900);
        assert_eq!(settings.remote_timeout(), Duration::from_secs(4));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let draft = ProgressSettingsDraft {
            default_percentage: Some(140),
            ..ProgressSettingsDraft::default()
        };
        assert_eq!(
            draft.validate().unwrap_err(),
            SettingsError::PercentageOutOfRange(140)
        );

        let draft = ProgressSettingsDraft {
            remote_batch_size: Some(0),
            ..ProgressSettingsDraft::default()
        };
        assert!(matches!(
            draft.validate().unwrap_err(),
            SettingsError::Zero {
                field: "remote_batch_size"
            }
        ));
    }

    #[test]
    fn blank_base_url_is_treated_as_absent() {
        let draft = ProgressSettingsDraft {
            remote_base_url: Some("   ".into()),
            ..ProgressSettingsDraft::default()
        };
        assert_eq!(draft.validate().unwrap().remote_base_url(), None);

        let draft = ProgressSettingsDraft {
            remote_base_url: Some("not a url".into()),
            ..ProgressSettingsDraft::default()
        };
        assert_eq!(draft.validate().unwrap_err(), SettingsError::InvalidBaseUrl);
    }
}
