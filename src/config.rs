use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,

    pub jwt_secret: String,
    pub jwt_access_ttl_secs: i64,

    // Reminder engine
    pub alert_poll_secs: u64,
    pub alert_due_window_secs: i64,
    pub medication_match_tolerance_secs: i64,
    pub default_snooze_minutes: i64,
    pub default_locale: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "5000".into())
                .parse()
                .expect("PORT must be a number"),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),

            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            jwt_access_ttl_secs: env::var("JWT_ACCESS_TTL_SECS")
                .unwrap_or_else(|_| "604800".into()) // 7 days
                .parse()
                .expect("JWT_ACCESS_TTL_SECS must be a number"),

            alert_poll_secs: env::var("ALERT_POLL_SECS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .unwrap_or(60),
            alert_due_window_secs: env::var("ALERT_DUE_WINDOW_SECS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .unwrap_or(60),
            medication_match_tolerance_secs: env::var("MEDICATION_MATCH_TOLERANCE_SECS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .unwrap_or(60),
            default_snooze_minutes: env::var("DEFAULT_SNOOZE_MINUTES")
                .unwrap_or_else(|_| "15".into())
                .parse()
                .unwrap_or(15),
            default_locale: env::var("DEFAULT_LOCALE").unwrap_or_else(|_| "en-US".into()),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn reminder_settings(&self) -> crate::services::reminders::ReminderSettings {
        crate::services::reminders::ReminderSettings {
            poll_interval: Duration::from_secs(self.alert_poll_secs.max(1)),
            due_window: chrono::Duration::seconds(self.alert_due_window_secs),
            match_tolerance: chrono::Duration::seconds(self.medication_match_tolerance_secs),
            default_snooze_minutes: self.default_snooze_minutes,
            default_locale: self.default_locale.clone(),
        }
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/healthmate_test".into(),
            host: "127.0.0.1".into(),
            port: 0,
            frontend_url: "http://localhost:3000".into(),
            jwt_secret: "test-secret-with-enough-entropy".into(),
            jwt_access_ttl_secs: 900,
            alert_poll_secs: 60,
            alert_due_window_secs: 60,
            medication_match_tolerance_secs: 60,
            default_snooze_minutes: 15,
            default_locale: "en-US".into(),
        }
    }
}
