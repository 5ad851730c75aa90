//! Rule-based wellness recommendations.
//!
//! Pure over its inputs: the handler gathers the trailing week of logs and
//! this module decides what to say. Rules fire independently and always in
//! the order medication, sleep, hydration, mood.

use serde::{Deserialize, Serialize};

use crate::models::log::{MedicationLog, MedicationStatus, MoodLog, SleepLog, WaterLog};

const MIN_SLEEP_MINUTES: f64 = 420.0;
const DAILY_WATER_TARGET_ML: i64 = 2000;
const LOW_MOOD_THRESHOLD: f64 = 4.0;
const NEUTRAL_MOOD: i32 = 5;
const MOOD_SAMPLE: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationType {
    Medication,
    Sleep,
    Hydration,
    Mood,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    pub priority: Priority,
    pub title: String,
    pub message: String,
    pub icon: String,
}

/// `recent_moods` must be ordered newest first.
pub fn recommendations(
    medications: &[MedicationLog],
    sleep_logs: &[SleepLog],
    water_today: &[WaterLog],
    recent_moods: &[MoodLog],
) -> Vec<Recommendation> {
    let mut out = Vec::new();

    let missed = medications
        .iter()
        .filter(|m| m.status == MedicationStatus::Missed)
        .count();
    if missed > 0 {
        out.push(Recommendation {
            kind: RecommendationType::Medication,
            priority: Priority::High,
            title: "Medication Adherence".into(),
            message: format!(
                "You've missed {missed} medication dose(s). Try setting reminders for your medication times."
            ),
            icon: "💊".into(),
        });
    }

    let avg_sleep = average_sleep_minutes(sleep_logs);
    if avg_sleep < MIN_SLEEP_MINUTES {
        out.push(Recommendation {
            kind: RecommendationType::Sleep,
            priority: Priority::Medium,
            title: "Sleep Improvement".into(),
            message: format!(
                "Your average sleep is {} hours. Aim for 7-9 hours of quality sleep.",
                (avg_sleep / 60.0).round() as i64
            ),
            icon: "😴".into(),
        });
    }

    let water_total: i64 = water_today.iter().map(|w| w.amount as i64).sum();
    if water_total < DAILY_WATER_TARGET_ML {
        out.push(Recommendation {
            kind: RecommendationType::Hydration,
            priority: Priority::Medium,
            title: "Stay Hydrated".into(),
            message: format!(
                "You've had {water_total}ml today. Aim for 2-3 liters daily for optimal health."
            ),
            icon: "💧".into(),
        });
    }

    if let Some(avg_mood) = average_recent_mood(recent_moods) {
        if avg_mood < LOW_MOOD_THRESHOLD {
            out.push(Recommendation {
                kind: RecommendationType::Mood,
                priority: Priority::Medium,
                title: "Wellness Check".into(),
                message: "Your mood has been lower recently. Consider rest, light exercise, or speaking with someone.".into(),
                icon: "💙".into(),
            });
        }
    }

    out
}

/// Mean duration; an empty set averages to zero.
fn average_sleep_minutes(sleep_logs: &[SleepLog]) -> f64 {
    let total: i64 = sleep_logs.iter().map(|s| s.duration as i64).sum();
    total as f64 / sleep_logs.len().max(1) as f64
}

/// Mean of the newest three entries, unrated entries counting as neutral.
fn average_recent_mood(recent_moods: &[MoodLog]) -> Option<f64> {
    let sample: Vec<i32> = recent_moods
        .iter()
        .take(MOOD_SAMPLE)
        .map(|m| m.mood.unwrap_or(NEUTRAL_MOOD))
        .collect();
    if sample.is_empty() {
        return None;
    }
    Some(sample.iter().sum::<i32>() as f64 / sample.len() as f64)
}
