use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use super::channel::{AnnouncementChannel, Notification, NotificationSink};
use super::clock::{Clock, SystemClock};
use super::schedule::{
    awaits_action, dedupe_key_date, is_due_now, matches_time_of_day, medication_dedupe_key,
};
use super::{ReminderSettings, SessionUser};
use crate::db::{into_medication, AlertRepository, HealthStore, LogStore};
use crate::error::{AppError, AppResult};
use crate::models::alert::{alert_icon, snooze_deadline, Alert, NewAlert};
use crate::models::log::{DateRange, LogKind, MedicationStatus};

pub struct ReminderEngine {
    user: SessionUser,
    store: Arc<dyn HealthStore>,
    speech: Arc<dyn AnnouncementChannel>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    settings: ReminderSettings,
    visible: Mutex<Vec<Alert>>,
    /// Alerts dismissed in this session. Keeps a poll that raced the dismiss
    /// from bringing them back; pruned once the store stops listing them.
    dismissed: Mutex<HashSet<Uuid>>,
    /// Medication dedupe keys fired in this session, for the current local day.
    fired: Mutex<HashSet<String>>,
}

impl ReminderEngine {
    pub fn new(
        user: SessionUser,
        store: Arc<dyn HealthStore>,
        speech: Arc<dyn AnnouncementChannel>,
        notifier: Arc<dyn NotificationSink>,
        settings: ReminderSettings,
    ) -> Self {
        Self {
            user,
            store,
            speech,
            notifier,
            clock: Arc::new(SystemClock),
            settings,
            visible: Mutex::new(Vec::new()),
            dismissed: Mutex::new(HashSet::new()),
            fired: Mutex::new(HashSet::new()),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    #[cfg(test)]
    pub async fn visible_alerts(&self) -> Vec<Alert> {
        self.visible.lock().await.clone()
    }

    /// Starts the alert loop (first cycle runs immediately) and the
    /// medication-schedule loop (first check after one period).
    pub fn spawn(self: Arc<Self>) -> EngineHandle {
        let period = self.settings.poll_interval;

        let engine = self.clone();
        let alert_loop = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                engine.evaluate_cycle().await;
            }
        });

        let engine = self.clone();
        let medication_loop = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                engine.evaluate_medication_schedule().await;
            }
        });

        tracing::debug!(user_id = %self.user.id, period_secs = period.as_secs(), "Reminder engine started");

        EngineHandle {
            engine: self,
            tasks: vec![alert_loop, medication_loop],
        }
    }

    /// One evaluation cycle. Failures are logged and the previous visible
    /// set is kept.
    pub async fn evaluate_cycle(&self) {
        if let Err(e) = self.try_evaluate_cycle().await {
            tracing::warn!(user_id = %self.user.id, error = %e, "Alert cycle failed, keeping visible alerts");
        }
    }

    async fn try_evaluate_cycle(&self) -> AppResult<()> {
        let alerts = self.store.list_alerts(self.user.id).await?;
        let now = self.clock.now();
        let dismissed = {
            let mut dismissed = self.dismissed.lock().await;
            dismissed.retain(|id| alerts.iter().any(|a| a.id == *id));
            dismissed.clone()
        };
        let fired = self.fired.lock().await.clone();

        let due: Vec<Alert> = alerts
            .into_iter()
            .filter(|a| !dismissed.contains(&a.id))
            .filter(|a| {
                is_due_now(a, now, self.settings.due_window) || awaits_action(a, now, &fired)
            })
            .collect();

        let (snapshot, surfaced) = {
            let mut visible = self.visible.lock().await;
            let surfaced: Vec<Alert> = due
                .iter()
                .filter(|a| !visible.iter().any(|v| v.id == a.id))
                .cloned()
                .collect();
            *visible = due;
            (visible.clone(), surfaced)
        };

        self.notifier.publish_alerts(&snapshot);
        for alert in &surfaced {
            self.surface(&alert.message, alert.icon());
        }

        tracing::debug!(
            user_id = %self.user.id,
            visible = snapshot.len(),
            surfaced = surfaced.len(),
            "Alert cycle complete"
        );
        Ok(())
    }

    /// Fires reminders for pending medications scheduled at the current
    /// local time and persists an alert for each.
    pub async fn evaluate_medication_schedule(&self) {
        if let Err(e) = self.try_evaluate_medication_schedule().await {
            tracing::warn!(user_id = %self.user.id, error = %e, "Medication schedule check failed");
        }
    }

    async fn try_evaluate_medication_schedule(&self) -> AppResult<usize> {
        let now = self.clock.now();
        let local = now.with_timezone(&self.user.timezone);
        let today = local.date_naive();

        self.fired
            .lock()
            .await
            .retain(|key| dedupe_key_date(key) == Some(today));

        let logs = into_medication(
            self.store
                .find_logs(LogKind::Medication, self.user.id, DateRange::day(today))
                .await?,
        );

        let mut created = 0;
        for med in logs.iter().filter(|m| {
            m.status == MedicationStatus::Pending
                && matches_time_of_day(m.time, local.time(), self.settings.match_tolerance)
        }) {
            let key = medication_dedupe_key(self.user.id, med.id, today);
            if !self.fired.lock().await.insert(key.clone()) {
                continue;
            }

            let message = format!("Time to take your {} 💊", med.medication_name);
            self.surface(&message, alert_icon("medication"));

            let new_alert = NewAlert {
                kind: "medication".into(),
                message,
                scheduled_time: Some(now),
                recurring: false,
                dedupe_key: Some(key.clone()),
            };
            match self.store.create_alert(self.user.id, new_alert).await {
                Ok(alert) => {
                    created += 1;
                    let snapshot = {
                        let mut visible = self.visible.lock().await;
                        if !visible.iter().any(|v| v.id == alert.id) {
                            visible.push(alert);
                        }
                        visible.clone()
                    };
                    self.notifier.publish_alerts(&snapshot);
                }
                Err(e) => {
                    // Let a later check inside the tolerance window retry.
                    self.fired.lock().await.remove(&key);
                    tracing::warn!(
                        user_id = %self.user.id,
                        log_id = %med.id,
                        error = %e,
                        "Failed to persist medication alert"
                    );
                }
            }
        }

        if created > 0 {
            tracing::info!(user_id = %self.user.id, created, "Medication reminders fired");
        }
        Ok(created)
    }

    /// Removes the alert from view at once, then marks it dismissed in the store.
    pub async fn dismiss(&self, alert_id: Uuid) -> AppResult<()> {
        self.dismissed.lock().await.insert(alert_id);
        let snapshot = {
            let mut visible = self.visible.lock().await;
            visible.retain(|a| a.id != alert_id);
            visible.clone()
        };
        self.notifier.publish_alerts(&snapshot);
        self.speech.silence();

        if let Err(e) = self.store.dismiss_alert(self.user.id, alert_id).await {
            self.dismissed.lock().await.remove(&alert_id);
            tracing::warn!(user_id = %self.user.id, alert_id = %alert_id, error = %e, "Dismiss failed");
            self.notifier.notify(Notification::error("Failed to dismiss alert"));
            return Err(e);
        }

        self.notifier.notify(Notification::success("Alert dismissed"));
        Ok(())
    }

    /// Pushes the alert's due time out by `minutes` (default from settings)
    /// and re-evaluates immediately.
    pub async fn snooze(&self, alert_id: Uuid, minutes: Option<i64>) -> AppResult<DateTime<Utc>> {
        let minutes = minutes.unwrap_or(self.settings.default_snooze_minutes);
        let until = snooze_deadline(self.clock.now(), minutes)?;

        if let Err(e) = self.store.snooze_alert(self.user.id, alert_id, until).await {
            tracing::warn!(user_id = %self.user.id, alert_id = %alert_id, error = %e, "Snooze failed");
            self.notifier.notify(Notification::error("Failed to snooze alert"));
            return Err(e);
        }

        self.notifier
            .notify(Notification::success(format!("Alert snoozed for {minutes} minutes")));
        self.evaluate_cycle().await;
        Ok(until)
    }

    /// Speaks a visible alert again on request, regardless of the voice
    /// preference.
    pub async fn replay(&self, alert_id: Uuid) -> AppResult<()> {
        let message = self
            .visible
            .lock()
            .await
            .iter()
            .find(|a| a.id == alert_id)
            .map(|a| a.message.clone())
            .ok_or_else(|| AppError::NotFound("Alert is not visible".into()))?;
        self.speech.announce(&message, &self.user.locale);
        Ok(())
    }

    fn surface(&self, message: &str, icon: &str) {
        if self.user.voice_alerts {
            self.speech.announce(message, &self.user.locale);
        }
        self.notifier.notify(Notification::info(message, icon));
    }
}

/// Owns the engine's polling tasks. Stopping or dropping the handle cancels
/// both loops and silences speech.
pub struct EngineHandle {
    engine: Arc<ReminderEngine>,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.engine.speech.silence();
        tracing::debug!(user_id = %self.engine.user.id, "Reminder engine stopped");
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
