use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_API_PORT: u16 = 3000;
pub const DEFAULT_PENDING_REVIEW_WINDOW_HOURS: i64 = 72;
/// One year.
pub const MAX_PENDING_REVIEW_WINDOW_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub api_port: u16,
    /// Offset from UTC used to decide what "today" means for the parish.
    pub parish_utc_offset_minutes: i32,
    /// Global review window after which a pending appointment is flagged.
    pub pending_review_window_hours: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            api_port: DEFAULT_API_PORT,
            parish_utc_offset_minutes: 0,
            pending_review_window_hours: DEFAULT_PENDING_REVIEW_WINDOW_HOURS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            api_port: parse_or("API_PORT", defaults.api_port),
            parish_utc_offset_minutes: parse_or(
                "PARISH_UTC_OFFSET_MINUTES",
                defaults.parish_utc_offset_minutes,
            ),
            pending_review_window_hours: review_window_or_default(parse_or(
                "PENDING_REVIEW_WINDOW_HOURS",
                defaults.pending_review_window_hours,
            )),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty()
    }
}

/// Review windows must be positive and at most a year.
pub fn review_window_or_default(hours: i64) -> i64 {
    if (1..=MAX_PENDING_REVIEW_WINDOW_HOURS).contains(&hours) {
        hours
    } else {
        warn!(
            "PENDING_REVIEW_WINDOW_HOURS={} is outside 1..={}, using default {}",
            hours, MAX_PENDING_REVIEW_WINDOW_HOURS, DEFAULT_PENDING_REVIEW_WINDOW_HOURS
        );
        DEFAULT_PENDING_REVIEW_WINDOW_HOURS
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has unparsable value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
