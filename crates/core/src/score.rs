//! Percentage resolution and rounding rules shared by every source.

use crate::model::{Confidence, RawActivityRecord};

/// A percentage in `0..=100` plus whether it was measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPercentage {
    pub value: u32,
    pub confidence: Confidence,
}

/// Resolve the percentage of a record.
///
/// Precedence: an explicit percentage, then `score / total_questions * 100`
/// when both are usable, then `score` alone (already a percentage), then
/// `default_percentage` flagged as assumed. Results are clamped to `0..=100`.
#[must_use]
pub fn resolve_percentage(
    score: Option<f64>,
    total_questions: Option<u32>,
    percentage: Option<f64>,
    default_percentage: u32,
) -> ResolvedPercentage {
    let measured = percentage
        .filter(|p| p.is_finite())
        .or_else(|| match (score, total_questions) {
            (Some(score), Some(total)) if score.is_finite() && total > 0 => {
                Some(score / f64::from(total) * 100.0)
            }
            (Some(score), _) if score.is_finite() => Some(score),
            _ => None,
        });

    match measured {
        Some(value) => ResolvedPercentage {
            value: clamp_percentage(value),
            confidence: Confidence::Measured,
        },
        None => ResolvedPercentage {
            value: default_percentage.min(100),
            confidence: Confidence::Assumed,
        },
    }
}

/// Convenience wrapper over [`resolve_percentage`] for a whole record.
#[must_use]
pub fn resolve_record(record: &RawActivityRecord, default_percentage: u32) -> ResolvedPercentage {
    resolve_percentage(
        record.score,
        record.total_questions,
        record.percentage,
        default_percentage,
    )
}

/// Mean rounded half away from zero; `0` for an empty slice.
#[must_use]
pub fn mean_rounded(values: &[u32]) -> u32 {
    if values.is_empty() {
        return 0;
    }
    let sum: u64 = values.iter().map(|v| u64::from(*v)).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = sum as f64 / values.len() as f64;
    clamp_round(mean)
}

fn clamp_percentage(value: f64) -> u32 {
    clamp_round(value.clamp(0.0, 100.0))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_round(value: f64) -> u32 {
    value.round().clamp(0.0, f64::from(u32::MAX)) as u32
}
