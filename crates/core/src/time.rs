use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, Offset, TimeZone, Utc};

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    /// Returns true if this clock is fixed.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Clock::Fixed(_))
    }
}

/// Start of the Sunday-aligned week containing `now`, at local midnight.
///
/// "Local" is the fixed offset `utc_offset_minutes` east of UTC. Offsets
/// outside +/-18h fall back to UTC.
#[must_use]
pub fn week_start(now: DateTime<Utc>, utc_offset_minutes: i32) -> DateTime<Utc> {
    let offset = utc_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix());
    let local = now.with_timezone(&offset);
    let days_since_sunday = i64::from(local.weekday().num_days_from_sunday());
    let sunday = local.date_naive() - Duration::days(days_since_sunday);
    let midnight = sunday.and_time(NaiveTime::MIN);

    offset
        .from_local_datetime(&midnight)
        .single()
        .map_or(now, |dt| dt.with_timezone(&Utc))
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z, a Tuesday).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn week_starts_on_previous_sunday_midnight() {
        let start = week_start(fixed_now(), 0);
        assert_eq!(start.weekday(), Weekday::Sun);
        assert_eq!(start.to_rfc3339(), "2023-11-12T00:00:00+00:00");
    }

    #[test]
    fn sunday_is_its_own_week_start() {
        let start = week_start(fixed_now(), 0);
        assert_eq!(week_start(start, 0), start);
        assert_eq!(week_start(start + Duration::hours(5), 0), start);
    }

    #[test]
    fn offset_shifts_local_midnight() {
        // 2023-11-14T22:13:20Z is already Wednesday in UTC+3.
        let start = week_start(fixed_now(), 180);
        assert_eq!(start.to_rfc3339(), "2023-11-11T21:00:00+00:00");
    }

    #[test]
    fn fixed_clock_advances() {
        let mut clock = fixed_clock();
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), fixed_now() + Duration::minutes(5));
        assert!(clock.is_fixed());
    }
}
