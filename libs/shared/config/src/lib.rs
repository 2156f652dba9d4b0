use std::env;
use std::str::FromStr;

use tracing::warn;

/// Scheduling rules that vary per deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingConfig {
    /// Booking closes this many minutes before the consult window ends.
    pub booking_close_minutes: u32,
    /// Booking counts as "still open" until this long before consultation starts.
    pub open_booking_cutoff_minutes: u32,
    /// Minimum gap between now and a slot start for resize reassignment.
    pub reassignment_lead_minutes: u32,
    /// Floor for the compressed per-appointment cadence.
    pub min_consult_minutes: u32,
    pub max_expand_days: u32,
    /// Doctor-local offset from UTC.
    pub utc_offset_minutes: i32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            booking_close_minutes: 10,
            open_booking_cutoff_minutes: 120,
            reassignment_lead_minutes: 60,
            min_consult_minutes: 5,
            max_expand_days: 90,
            utc_offset_minutes: 330,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub scheduling: SchedulingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            scheduling: SchedulingConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = SchedulingConfig::default();

        let config = Self {
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| {
                    warn!("BIND_ADDR not set, using default");
                    "0.0.0.0:3000".to_string()
                }),
            scheduling: SchedulingConfig {
                booking_close_minutes: env_or("BOOKING_CLOSE_MINUTES", defaults.booking_close_minutes),
                open_booking_cutoff_minutes: env_or(
                    "OPEN_BOOKING_CUTOFF_MINUTES",
                    defaults.open_booking_cutoff_minutes,
                ),
                reassignment_lead_minutes: env_or(
                    "REASSIGNMENT_LEAD_MINUTES",
                    defaults.reassignment_lead_minutes,
                ),
                min_consult_minutes: env_or("MIN_CONSULT_MINUTES", defaults.min_consult_minutes),
                max_expand_days: env_or("MAX_EXPAND_DAYS", defaults.max_expand_days),
                utc_offset_minutes: env_or("CLINIC_UTC_OFFSET_MINUTES", defaults.utc_offset_minutes),
            },
        };

        if !config.is_valid() {
            warn!("Scheduling configuration out of range, falling back to defaults");
            return Self {
                bind_addr: config.bind_addr,
                scheduling: defaults,
            };
        }

        config
    }

    pub fn is_valid(&self) -> bool {
        let s = &self.scheduling;
        s.min_consult_minutes > 0
            && s.max_expand_days > 0
            && s.utc_offset_minutes.abs() < 24 * 60
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.is_valid());
        assert_eq!(config.scheduling.booking_close_minutes, 10);
        assert_eq!(config.scheduling.min_consult_minutes, 5);
    }

    #[test]
    fn zero_cadence_floor_is_rejected() {
        let mut config = AppConfig::default();
        config.scheduling.min_consult_minutes = 0;
        assert!(!config.is_valid());
    }
}
