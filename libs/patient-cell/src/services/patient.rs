use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::SchedulingStore;
use shared_models::auth::User;
use shared_models::pagination::PageRequest;
use shared_utils::AppState;

use crate::models::{PatientDetails, PatientError, PatientPage};

pub struct PatientService {
    store: Arc<dyn SchedulingStore>,
}

impl PatientService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
        }
    }

    fn is_staff(user: &User) -> bool {
        user.is_doctor() || user.is_admin()
    }

    /// Readable by the patient themselves, doctors and admins.
    pub async fn get_patient(&self, patient_id: Uuid, user: &User) -> Result<PatientDetails, PatientError> {
        debug!("Fetching patient {}", patient_id);

        if !(Self::is_staff(user) || user.user_id() == Some(patient_id)) {
            warn!("User {} denied access to patient {}", user.id, patient_id);
            return Err(PatientError::Unauthorized);
        }

        let patient = self
            .store
            .find_patient(patient_id)
            .await?
            .ok_or(PatientError::NotFound)?;
        let appointments = self.store.list_patient_appointments(patient_id).await?;

        Ok(PatientDetails { patient, appointments })
    }

    /// Directory search over name and email, newest first. Staff only.
    pub async fn list_patients(
        &self,
        user: &User,
        search: Option<&str>,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> Result<PatientPage, PatientError> {
        if !Self::is_staff(user) {
            warn!("User {} denied access to the patient directory", user.id);
            return Err(PatientError::Unauthorized);
        }

        let request = PageRequest::new(page, limit);
        let search = search.map(str::trim).unwrap_or("");

        debug!(
            "Listing patients page {} (limit {}) matching '{}'",
            request.page, request.limit, search
        );

        let (data, total) = self
            .store
            .list_patients(search, request.offset(), request.limit)
            .await?;

        Ok(request.wrap(data, total))
    }
}
