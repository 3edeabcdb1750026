// libs/series-cell/src/services/planner.rs
use chrono::{DateTime, Duration, Utc};

use crate::models::{SeriesError, SeriesMode};

/// Pure schedule arithmetic. No side effects, no ledger access; every
/// date is recomputed from its index so the sequence is restartable and
/// a maintenance series never materializes its unbounded tail.
#[derive(Debug, Clone)]
pub struct SessionSchedule {
    start: DateTime<Utc>,
    interval: Duration,
    /// None for maintenance (unbounded).
    total: Option<u32>,
}

impl SessionSchedule {
    pub fn new(
        mode: SeriesMode,
        interval_days: i64,
        total_sessions: Option<u32>,
        start: DateTime<Utc>,
    ) -> Result<Self, SeriesError> {
        if interval_days < 1 {
            return Err(SeriesError::Validation(format!(
                "interval_days must be at least 1, got {interval_days}"
            )));
        }

        let total = match mode {
            SeriesMode::Fixed => match total_sessions {
                Some(n) if n >= 1 => Some(n),
                _ => {
                    return Err(SeriesError::Validation(
                        "fixed mode requires total_sessions >= 1".to_string(),
                    ));
                }
            },
            SeriesMode::Maintenance => {
                if total_sessions.is_some() {
                    return Err(SeriesError::Validation(
                        "maintenance mode does not take total_sessions".to_string(),
                    ));
                }
                None
            }
        };

        Ok(Self {
            start,
            interval: Duration::days(interval_days),
            total,
        })
    }

    pub fn total_sessions(&self) -> Option<u32> {
        self.total
    }

    /// Target date for the zero-based session index. None past the end
    /// of a fixed schedule; always Some for maintenance.
    pub fn date_at(&self, index: u32) -> Option<DateTime<Utc>> {
        if let Some(total) = self.total {
            if index >= total {
                return None;
            }
        }
        Some(self.start + self.interval * index as i32)
    }

    /// All dates of a fixed schedule. Errors for maintenance, which has
    /// no finite materialization.
    pub fn all_dates(&self) -> Result<Vec<DateTime<Utc>>, SeriesError> {
        let total = self.total.ok_or_else(|| {
            SeriesError::Validation(
                "cannot materialize every date of a maintenance schedule".to_string(),
            )
        })?;
        Ok((0..total).filter_map(|i| self.date_at(i)).collect())
    }
}

/// Refund for the unconsumed share of a prepaid package, in minor
/// currency units: `package_price * (total - completed) / total`,
/// rounded half to even.
pub fn prorate(
    package_price: i64,
    total_sessions: u32,
    sessions_completed: u32,
) -> Result<i64, SeriesError> {
    if total_sessions == 0 {
        return Err(SeriesError::ProrationInput(
            "total_sessions must be greater than zero".to_string(),
        ));
    }
    if package_price < 0 {
        return Err(SeriesError::ProrationInput(format!(
            "package_price must not be negative, got {package_price}"
        )));
    }
    if sessions_completed > total_sessions {
        return Err(SeriesError::ProrationInput(format!(
            "sessions_completed {sessions_completed} exceeds total_sessions {total_sessions}"
        )));
    }

    let remaining = (total_sessions - sessions_completed) as i128;
    let numerator = package_price as i128 * remaining;
    let denominator = total_sessions as i128;

    Ok(div_half_even(numerator, denominator) as i64)
}

// Banker's rounding on a non-negative division. Inputs here are bounded
// by i64 price times u32 count, so i128 never overflows.
fn div_half_even(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    let twice = remainder * 2;
    if twice > denominator || (twice == denominator && quotient % 2 != 0) {
        quotient + 1
    } else {
        quotient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};

    fn start() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 14, 0, 0).unwrap()
    }

    #[test]
    fn fixed_schedule_produces_exactly_total_dates() {
        let schedule =
            SessionSchedule::new(SeriesMode::Fixed, 7, Some(4), start()).unwrap();

        let dates = schedule.all_dates().unwrap();
        assert_eq!(dates.len(), 4);
        assert_eq!(dates[0], start());
        assert_eq!(dates[3], start() + Duration::days(21));
        assert_eq!(schedule.date_at(4), None);
    }

    #[test]
    fn maintenance_schedule_is_unbounded_and_stateless() {
        let schedule =
            SessionSchedule::new(SeriesMode::Maintenance, 30, None, start()).unwrap();

        // Any index can be asked for in any order; nothing is stored.
        assert_eq!(
            schedule.date_at(100),
            Some(start() + Duration::days(3000))
        );
        assert_eq!(schedule.date_at(0), Some(start()));
        assert_matches!(schedule.all_dates(), Err(SeriesError::Validation(_)));
    }

    #[test]
    fn fixed_mode_requires_total_sessions() {
        assert_matches!(
            SessionSchedule::new(SeriesMode::Fixed, 7, None, start()),
            Err(SeriesError::Validation(_))
        );
        assert_matches!(
            SessionSchedule::new(SeriesMode::Fixed, 7, Some(0), start()),
            Err(SeriesError::Validation(_))
        );
    }

    #[test]
    fn interval_must_be_positive() {
        assert_matches!(
            SessionSchedule::new(SeriesMode::Maintenance, 0, None, start()),
            Err(SeriesError::Validation(_))
        );
    }

    #[test]
    fn prorate_returns_unconsumed_share() {
        assert_eq!(prorate(1200, 6, 3).unwrap(), 600);
        assert_eq!(prorate(1200, 6, 0).unwrap(), 1200);
        assert_eq!(prorate(1200, 6, 6).unwrap(), 0);
        assert_eq!(prorate(120_000, 6, 3).unwrap(), 60_000);
    }

    #[test]
    fn prorate_rounds_half_to_even() {
        // 25 * 1 / 2 = 12.5 -> 12 (down to even)
        assert_eq!(prorate(25, 2, 1).unwrap(), 12);
        // 35 * 1 / 2 = 17.5 -> 18 (up to even)
        assert_eq!(prorate(35, 2, 1).unwrap(), 18);
        // 100 * 2 / 3 = 66.67 -> 67 (plain nearest)
        assert_eq!(prorate(100, 3, 1).unwrap(), 67);
    }

    #[test]
    fn prorate_rejects_bad_inputs() {
        assert_matches!(prorate(1200, 0, 0), Err(SeriesError::ProrationInput(_)));
        assert_matches!(prorate(-1, 6, 0), Err(SeriesError::ProrationInput(_)));
        assert_matches!(prorate(1200, 6, 7), Err(SeriesError::ProrationInput(_)));
    }
}
