//! Gamified achievements over the trailing week of logs.
//!
//! Re-derived on every call. `unlocked_at` is the evaluation instant; the
//! handler replaces it with the persisted first-unlock time when one exists.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::log::{MedicationLog, MedicationStatus, SleepLog, WaterLog};

const MEDICINE_MASTER_DOSES: usize = 14;
const SLEEP_CHAMP_LOGS: usize = 7;
const HYDRATION_HERO_ML: i64 = 14_000;
const WELLNESS_WARRIOR_BADGES: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub unlocked: bool,
    pub unlocked_at: DateTime<Utc>,
}

impl Achievement {
    fn unlocked(id: &str, name: &str, description: &str, icon: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            icon: icon.into(),
            unlocked: true,
            unlocked_at: now,
        }
    }
}

pub fn achievements(
    medications: &[MedicationLog],
    sleep_logs: &[SleepLog],
    water_logs: &[WaterLog],
    now: DateTime<Utc>,
) -> Vec<Achievement> {
    let mut out = Vec::new();

    let taken = medications
        .iter()
        .filter(|m| m.status == MedicationStatus::Taken)
        .count();
    if taken >= MEDICINE_MASTER_DOSES {
        out.push(Achievement::unlocked(
            "medicine_master",
            "Medicine Master",
            "Took all medications for 7 days",
            "💊",
            now,
        ));
    }

    if sleep_logs.len() >= SLEEP_CHAMP_LOGS {
        out.push(Achievement::unlocked(
            "sleep_champ",
            "Sleep Champ",
            "Logged sleep for 7 consecutive days",
            "😴",
            now,
        ));
    }

    let total_water: i64 = water_logs.iter().map(|w| w.amount as i64).sum();
    if total_water >= HYDRATION_HERO_ML {
        out.push(Achievement::unlocked(
            "hydration_hero",
            "Hydration Hero",
            "Drank 2L+ water daily for 7 days",
            "💧",
            now,
        ));
    }

    if out.len() >= WELLNESS_WARRIOR_BADGES {
        out.push(Achievement::unlocked(
            "wellness_warrior",
            "Wellness Warrior",
            "Unlocked all basic achievements",
            "🏆",
            now,
        ));
    }

    out
}

/// Replaces each freshly minted `unlocked_at` with the stored first-unlock time.
pub fn with_first_unlocks(
    mut achievements: Vec<Achievement>,
    first_unlocks: &HashMap<String, DateTime<Utc>>,
) -> Vec<Achievement> {
    for a in &mut achievements {
        if let Some(at) = first_unlocks.get(&a.id) {
            a.unlocked_at = *at;
        }
    }
    achievements
}
