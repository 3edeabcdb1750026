// libs/series-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{SeriesError, SeriesStatus, SessionStatus};

/// Status transition rules for series and their sessions. Completed,
/// cancelled and no_show are terminal in both tables.
pub struct LifecycleService;

impl LifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_session_transition(
        &self,
        current: &SessionStatus,
        next: &SessionStatus,
    ) -> Result<(), SeriesError> {
        debug!("Validating session transition {} -> {}", current, next);

        if !self.valid_session_transitions(current).contains(next) {
            warn!("Invalid session transition attempted: {} -> {}", current, next);
            return Err(SeriesError::InvalidStatusTransition {
                from: current.to_string(),
            });
        }
        Ok(())
    }

    pub fn valid_session_transitions(&self, current: &SessionStatus) -> Vec<SessionStatus> {
        match current {
            SessionStatus::Scheduled => vec![
                SessionStatus::Completed,
                SessionStatus::Cancelled,
                SessionStatus::NoShow,
            ],
            // Terminal states
            SessionStatus::Completed => vec![],
            SessionStatus::Cancelled => vec![],
            SessionStatus::NoShow => vec![],
        }
    }

    pub fn validate_series_transition(
        &self,
        current: &SeriesStatus,
        next: &SeriesStatus,
    ) -> Result<(), SeriesError> {
        debug!("Validating series transition {} -> {}", current, next);

        if !self.valid_series_transitions(current).contains(next) {
            warn!("Invalid series transition attempted: {} -> {}", current, next);
            return Err(SeriesError::InvalidStatusTransition {
                from: current.to_string(),
            });
        }
        Ok(())
    }

    pub fn valid_series_transitions(&self, current: &SeriesStatus) -> Vec<SeriesStatus> {
        match current {
            SeriesStatus::Active => vec![
                SeriesStatus::Paused,
                SeriesStatus::Cancelled,
                SeriesStatus::Completed,
            ],
            SeriesStatus::Paused => vec![SeriesStatus::Active, SeriesStatus::Cancelled],
            // Terminal states
            SeriesStatus::Cancelled => vec![],
            SeriesStatus::Completed => vec![],
        }
    }
}

impl Default for LifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn scheduled_session_can_complete_cancel_or_no_show() {
        let lifecycle = LifecycleService::new();
        for next in [
            SessionStatus::Completed,
            SessionStatus::Cancelled,
            SessionStatus::NoShow,
        ] {
            assert!(lifecycle
                .validate_session_transition(&SessionStatus::Scheduled, &next)
                .is_ok());
        }
    }

    #[test]
    fn terminal_session_states_reject_all_transitions() {
        let lifecycle = LifecycleService::new();
        for terminal in [
            SessionStatus::Completed,
            SessionStatus::Cancelled,
            SessionStatus::NoShow,
        ] {
            assert_matches!(
                lifecycle.validate_session_transition(&terminal, &SessionStatus::Scheduled),
                Err(SeriesError::InvalidStatusTransition { .. })
            );
        }
    }

    #[test]
    fn paused_series_can_resume_or_cancel_but_not_complete() {
        let lifecycle = LifecycleService::new();
        assert!(lifecycle
            .validate_series_transition(&SeriesStatus::Paused, &SeriesStatus::Active)
            .is_ok());
        assert!(lifecycle
            .validate_series_transition(&SeriesStatus::Paused, &SeriesStatus::Cancelled)
            .is_ok());
        assert_matches!(
            lifecycle.validate_series_transition(&SeriesStatus::Paused, &SeriesStatus::Completed),
            Err(SeriesError::InvalidStatusTransition { .. })
        );
    }
}
