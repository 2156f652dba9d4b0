use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use shared_database::SchedulingStore;
use shared_models::pagination::PageRequest;
use shared_models::scheduling::Doctor;
use shared_utils::AppState;

use crate::models::{DoctorError, DoctorPage};

pub struct DoctorService {
    store: Arc<dyn SchedulingStore>,
}

impl DoctorService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
        }
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor {}", doctor_id);
        self.store
            .find_doctor(doctor_id)
            .await?
            .ok_or(DoctorError::DoctorNotFound)
    }

    /// Directory search over name, email and specialization, newest first.
    pub async fn list_doctors(
        &self,
        search: Option<&str>,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> Result<DoctorPage, DoctorError> {
        let request = PageRequest::new(page, limit);
        let search = search.map(str::trim).unwrap_or("");

        debug!(
            "Listing doctors page {} (limit {}) matching '{}'",
            request.page, request.limit, search
        );

        let (data, total) = self
            .store
            .list_doctors(search, request.offset(), request.limit)
            .await?;

        Ok(request.wrap(data, total))
    }
}
