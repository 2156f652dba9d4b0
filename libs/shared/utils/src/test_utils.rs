use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{ChangeSet, InMemoryStore, SchedulingStore};
use shared_models::auth::User;
use shared_models::scheduling::{Doctor, Patient};

use crate::clock::Clock;
use crate::state::AppState;

pub fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid test time")
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

pub fn at(day: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    day.and_time(hm(hour, minute))
}

/// Clock pinned to a settable instant. The instant doubles as the UTC
/// timestamp.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().expect("clock lock") = now;
    }

    pub fn advance_minutes(&self, minutes: i64) {
        let mut now = self.now.lock().expect("clock lock");
        *now += Duration::minutes(minutes);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().expect("clock lock")
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.now())
    }
}

pub struct TestConfig {
    pub bind_addr: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            bind_addr: self.bind_addr.clone(),
            ..AppConfig::default()
        }
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl TestUser {
    pub fn new(id: Uuid, role: &str) -> Self {
        Self {
            id: id.to_string(),
            email: format!("{}@example.com", role),
            role: role.to_string(),
        }
    }

    pub fn doctor(id: Uuid) -> Self {
        Self::new(id, "doctor")
    }

    pub fn patient(id: Uuid) -> Self {
        Self::new(id, "patient")
    }

    pub fn admin() -> Self {
        Self::new(Uuid::new_v4(), "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            created_at: Some(Utc::now()),
        }
    }
}

pub fn doctor_fixture(full_name: &str, specialization: &str) -> Doctor {
    Doctor {
        id: Uuid::new_v4(),
        full_name: full_name.to_string(),
        email: format!("{}@clinic.test", full_name.to_lowercase().replace(' ', ".")),
        specialization: Some(specialization.to_string()),
        bio: None,
        created_at: Utc::now(),
    }
}

pub fn patient_fixture(full_name: &str) -> Patient {
    Patient {
        id: Uuid::new_v4(),
        full_name: full_name.to_string(),
        email: format!("{}@mail.test", full_name.to_lowercase().replace(' ', ".")),
        age: Some(34),
        created_at: Utc::now(),
    }
}

/// An in-memory application state driven by a [`FixedClock`].
pub struct TestContext {
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<FixedClock>,
}

impl TestContext {
    pub fn new(now: NaiveDateTime) -> Self {
        Self::with_config(TestConfig::default().to_app_config(), now)
    }

    pub fn with_config(config: AppConfig, now: NaiveDateTime) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(now));
        let state = AppState::new(
            config,
            Arc::clone(&store) as Arc<dyn SchedulingStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        Self { state, store, clock }
    }

    pub async fn seed_doctor(&self, full_name: &str) -> Doctor {
        let doctor = doctor_fixture(full_name, "General Medicine");
        self.store
            .commit(ChangeSet::new().with_doctor(doctor.clone()))
            .await
            .expect("seed doctor");
        doctor
    }

    pub async fn seed_patients(&self, count: usize) -> Vec<Patient> {
        let patients: Vec<Patient> = (0..count)
            .map(|i| patient_fixture(&format!("Patient {}", i + 1)))
            .collect();
        let mut changes = ChangeSet::new();
        changes.patients.extend(patients.iter().cloned());
        self.store.commit(changes).await.expect("seed patients");
        patients
    }
}
