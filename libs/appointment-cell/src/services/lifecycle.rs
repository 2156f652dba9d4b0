// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use shared_models::scheduling::AppointmentStatus;

use crate::models::AppointmentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentAction {
    Reschedule,
    Cancel,
}

pub struct AppointmentLifecycleService;

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that `action` is allowed from `current_status`
    pub fn validate_action(
        &self,
        current_status: AppointmentStatus,
        action: AppointmentAction,
    ) -> Result<(), AppointmentError> {
        debug!("Validating {:?} from status {}", action, current_status);

        if !self.allowed_actions(current_status).contains(&action) {
            warn!("Invalid status transition attempted: {:?} from {}", action, current_status);
            return Err(AppointmentError::InvalidStatusTransition(current_status));
        }
        Ok(())
    }

    pub fn allowed_actions(&self, current_status: AppointmentStatus) -> Vec<AppointmentAction> {
        match current_status {
            AppointmentStatus::Confirmed
            | AppointmentStatus::Missed
            | AppointmentStatus::PendingReschedule => {
                vec![AppointmentAction::Reschedule, AppointmentAction::Cancel]
            }
            AppointmentStatus::Rescheduled => vec![AppointmentAction::Cancel],
            // Terminal
            AppointmentStatus::Cancelled => vec![],
        }
    }

    /// Status after the action succeeds.
    pub fn next_status(&self, action: AppointmentAction) -> AppointmentStatus {
        match action {
            AppointmentAction::Reschedule => AppointmentStatus::Rescheduled,
            AppointmentAction::Cancel => AppointmentStatus::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn reschedule_is_limited_to_unsettled_appointments() {
        let lifecycle = AppointmentLifecycleService::new();

        for status in [
            AppointmentStatus::Confirmed,
            AppointmentStatus::Missed,
            AppointmentStatus::PendingReschedule,
        ] {
            assert!(lifecycle.validate_action(status, AppointmentAction::Reschedule).is_ok());
        }

        assert_matches!(
            lifecycle.validate_action(AppointmentStatus::Rescheduled, AppointmentAction::Reschedule),
            Err(AppointmentError::InvalidStatusTransition(AppointmentStatus::Rescheduled))
        );
        assert_matches!(
            lifecycle.validate_action(AppointmentStatus::Cancelled, AppointmentAction::Reschedule),
            Err(AppointmentError::InvalidStatusTransition(_))
        );
    }

    #[test]
    fn cancelled_is_terminal() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle.validate_action(AppointmentStatus::Rescheduled, AppointmentAction::Cancel).is_ok());
        assert_matches!(
            lifecycle.validate_action(AppointmentStatus::Cancelled, AppointmentAction::Cancel),
            Err(AppointmentError::InvalidStatusTransition(AppointmentStatus::Cancelled))
        );
        assert_eq!(lifecycle.next_status(AppointmentAction::Cancel), AppointmentStatus::Cancelled);
    }
}
