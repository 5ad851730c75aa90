use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: String,
    pub timezone: String,
    pub language: String,
    pub notifications: bool,
    pub voice_alerts: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The configured IANA zone, falling back to UTC for unknown names.
    pub fn tz(&self) -> Tz {
        parse_timezone(&self.timezone)
    }

    pub fn preferences(&self) -> Preferences {
        Preferences {
            language: self.language.clone(),
            notifications: self.notifications,
            voice_alerts: self.voice_alerts,
        }
    }
}

pub fn parse_timezone(name: &str) -> Tz {
    name.parse::<Tz>().unwrap_or_else(|_| {
        tracing::warn!(timezone = %name, "Unknown timezone, using UTC");
        Tz::UTC
    })
}

/// Maps a UI language to the speech locale used for announcements.
pub fn speech_locale(language: &str, default_locale: &str) -> String {
    match language {
        "en" => "en-US".into(),
        "es" => "es-ES".into(),
        "fr" => "fr-FR".into(),
        other if other.contains('-') => other.to_string(),
        _ => default_locale.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Preferences {
    pub language: String,
    pub notifications: bool,
    pub voice_alerts: bool,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub timezone: String,
    pub preferences: Preferences,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        let preferences = u.preferences();
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            role: u.role,
            timezone: u.timezone,
            preferences,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePreferencesRequest {
    #[validate(length(min = 2, max = 10))]
    pub language: Option<String>,
    pub notifications: Option<bool>,
    pub voice_alerts: Option<bool>,
    pub timezone: Option<String>,
}
