//! Local notification dispatch
//!
//! The data layer announces completed operations through a [`Notifier`].
//! Delivery is best effort: a failed notification is logged and counted but
//! never fails the operation that produced it.

use crate::config::NotificationConfig;
use anyhow::Result;
use async_trait::async_trait;
use peak_performance_shared::{FoodEntry, ValidationError, Workout};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// When a notification fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Once, after the delay
    After(Duration),
    /// Every day at the given local time
    Daily { hour: u32, minute: u32 },
}

/// A local notification request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Requests with the same identifier replace each other
    pub identifier: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub body: String,
    pub sound: bool,
    pub trigger: Trigger,
}

impl Notification {
    /// One-shot notification with a fresh identifier
    pub fn one_shot(title: impl Into<String>, body: impl Into<String>, delay: Duration) -> Self {
        Self {
            identifier: Uuid::new_v4().to_string(),
            title: title.into(),
            subtitle: None,
            body: body.into(),
            sound: true,
            trigger: Trigger::After(delay),
        }
    }

    /// Daily reminder at `hour:minute`
    pub fn daily(
        identifier: impl Into<String>,
        hour: u32,
        minute: u32,
    ) -> Result<Self, ValidationError> {
        if hour > 23 {
            return Err(ValidationError::field("hour", "must be between 0 and 23"));
        }
        if minute > 59 {
            return Err(ValidationError::field("minute", "must be between 0 and 59"));
        }
        Ok(Self {
            identifier: identifier.into(),
            title: "Time to Workout! 💪".to_string(),
            subtitle: Some("Your daily fitness reminder".to_string()),
            body: "Don't forget your fitness goals for today. Let's crush it!".to_string(),
            sound: true,
            trigger: Trigger::Daily { hour, minute },
        })
    }
}

/// Platform notification capability
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a one-shot notification
    async fn send(&self, notification: Notification) -> Result<()>;

    /// Register a recurring notification, replacing any pending request
    /// with the same identifier
    async fn schedule(&self, notification: Notification) -> Result<()>;

    async fn cancel(&self, identifier: &str) -> Result<()>;
}

/// Notifier that writes notifications to the log
#[derive(Default)]
pub struct LogNotifier {
    scheduled: Mutex<HashMap<String, Notification>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Vec<Notification> {
        self.scheduled
            .lock()
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: Notification) -> Result<()> {
        info!(
            identifier = %notification.identifier,
            title = %notification.title,
            body = %notification.body,
            "Notification dispatched"
        );
        Ok(())
    }

    async fn schedule(&self, notification: Notification) -> Result<()> {
        let mut scheduled = self
            .scheduled
            .lock()
            .map_err(|_| anyhow::anyhow!("notification registry poisoned"))?;
        if let Trigger::Daily { hour, minute } = notification.trigger {
            info!(identifier = %notification.identifier, hour, minute, "Reminder scheduled");
        }
        scheduled.insert(notification.identifier.clone(), notification);
        Ok(())
    }

    async fn cancel(&self, identifier: &str) -> Result<()> {
        let mut scheduled = self
            .scheduled
            .lock()
            .map_err(|_| anyhow::anyhow!("notification registry poisoned"))?;
        if scheduled.remove(identifier).is_some() {
            info!(identifier, "Reminder cancelled");
        }
        Ok(())
    }
}

/// Notifier that records everything it is asked to deliver
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    scheduled: Mutex<HashMap<String, Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_titles(&self) -> Vec<String> {
        self.sent().into_iter().map(|n| n.title).collect()
    }

    pub fn scheduled(&self, identifier: &str) -> Option<Notification> {
        self.scheduled
            .lock()
            .ok()
            .and_then(|s| s.get(identifier).cloned())
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("notifications unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: Notification) -> Result<()> {
        self.check()?;
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("recorder poisoned"))?
            .push(notification);
        Ok(())
    }

    async fn schedule(&self, notification: Notification) -> Result<()> {
        self.check()?;
        self.scheduled
            .lock()
            .map_err(|_| anyhow::anyhow!("recorder poisoned"))?
            .insert(notification.identifier.clone(), notification);
        Ok(())
    }

    async fn cancel(&self, identifier: &str) -> Result<()> {
        self.check()?;
        self.scheduled
            .lock()
            .map_err(|_| anyhow::anyhow!("recorder poisoned"))?
            .remove(identifier);
        Ok(())
    }
}

/// Builds the app's notifications and hands them to a [`Notifier`]
#[derive(Clone)]
pub struct NotificationCenter {
    notifier: Arc<dyn Notifier>,
    config: NotificationConfig,
}

impl NotificationCenter {
    pub fn new(notifier: Arc<dyn Notifier>, config: NotificationConfig) -> Self {
        Self { notifier, config }
    }

    /// Send a one-shot notification; failures are logged, never returned
    pub async fn notify(&self, title: &str, body: &str) {
        if !self.config.enabled {
            return;
        }
        let notification =
            Notification::one_shot(title, body, Duration::from_millis(self.config.delay_ms));
        if let Err(err) = self.notifier.send(notification).await {
            metrics::counter!("notifications_failed_total").increment(1);
            warn!(title, error = %err, "Failed to send notification");
        }
    }

    pub async fn workout_added(&self, workout: &Workout) {
        let body = format!("Your {} workout has been added successfully!", workout.name);
        self.notify("Workout Added", &body).await;
    }

    pub async fn workout_updated(&self, workout: &Workout) {
        let body = format!("Your {} workout has been updated successfully!", workout.name);
        self.notify("Workout Updated", &body).await;
    }

    pub async fn workout_deleted(&self) {
        self.notify("Workout Deleted", "Your workout has been deleted successfully.")
            .await;
    }

    pub async fn food_entry_added(&self, entry: &FoodEntry) {
        let body = format!("Your {} has been logged successfully!", entry.name);
        self.notify("Food Entry Added", &body).await;
    }

    pub async fn food_entry_updated(&self, entry: &FoodEntry) {
        let body = format!("Your {} has been updated successfully!", entry.name);
        self.notify("Food Entry Updated", &body).await;
    }

    pub async fn food_entry_deleted(&self) {
        self.notify("Food Entry Deleted", "Your food entry has been deleted successfully.")
            .await;
    }

    pub async fn stats_updated(&self) {
        self.notify("Stats Updated", "Your activity stats have been updated successfully!")
            .await;
    }

    pub async fn goals_updated(&self) {
        self.notify("Goals Updated", "Your fitness goals have been updated successfully!")
            .await;
    }

    pub async fn profile_updated(&self) {
        self.notify(
            "Profile Updated",
            "Your profile information has been updated successfully!",
        )
        .await;
    }

    pub async fn login_success(&self, user_name: &str) {
        let body = format!("You've successfully logged in to PeakPerformance, {}.", user_name);
        self.notify("Welcome Back!", &body).await;
    }

    /// Schedule the daily workout reminder, replacing any earlier one
    pub async fn schedule_daily_reminder(
        &self,
        hour: u32,
        minute: u32,
    ) -> Result<(), ValidationError> {
        let reminder = Notification::daily(&self.config.reminder_identifier, hour, minute)?;
        if let Err(err) = self.notifier.cancel(&self.config.reminder_identifier).await {
            warn!(error = %err, "Failed to clear previous reminder");
        }
        if let Err(err) = self.notifier.schedule(reminder).await {
            metrics::counter!("notifications_failed_total").increment(1);
            warn!(hour, minute, error = %err, "Failed to schedule reminder");
        }
        Ok(())
    }

    pub async fn cancel_daily_reminder(&self) {
        if let Err(err) = self.notifier.cancel(&self.config.reminder_identifier).await {
            warn!(error = %err, "Failed to cancel reminder");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn center(notifier: Arc<RecordingNotifier>) -> NotificationCenter {
        NotificationCenter::new(notifier, NotificationConfig::default())
    }

    #[test]
    fn test_daily_rejects_bad_time() {
        assert!(Notification::daily("r", 24, 0).is_err());
        assert!(Notification::daily("r", 7, 60).is_err());
        let reminder = Notification::daily("r", 7, 30).unwrap();
        assert_eq!(reminder.trigger, Trigger::Daily { hour: 7, minute: 30 });
    }

    #[test]
    fn test_one_shot_identifiers_are_unique() {
        let a = Notification::one_shot("a", "b", Duration::from_millis(100));
        let b = Notification::one_shot("a", "b", Duration::from_millis(100));
        assert_ne!(a.identifier, b.identifier);
        assert_eq!(a.trigger, Trigger::After(Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_workout_added_message() {
        let notifier = Arc::new(RecordingNotifier::new());
        let workout = Workout::new("u1", "Morning Run", Utc::now(), 30, 250);
        center(notifier.clone()).workout_added(&workout).await;

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "Workout Added");
        assert_eq!(sent[0].body, "Your Morning Run workout has been added successfully!");
    }

    #[tokio::test]
    async fn test_reminder_supersedes_previous() {
        let notifier = Arc::new(RecordingNotifier::new());
        let center = center(notifier.clone());

        center.schedule_daily_reminder(7, 0).await.unwrap();
        center.schedule_daily_reminder(18, 45).await.unwrap();

        let reminder = notifier.scheduled("dailyWorkoutReminder").unwrap();
        assert_eq!(reminder.trigger, Trigger::Daily { hour: 18, minute: 45 });

        center.cancel_daily_reminder().await;
        assert!(notifier.scheduled("dailyWorkoutReminder").is_none());
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.set_failing(true);
        center(notifier.clone()).goals_updated().await;
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_center_sends_nothing() {
        let notifier = Arc::new(RecordingNotifier::new());
        let center = NotificationCenter::new(
            notifier.clone(),
            NotificationConfig {
                enabled: false,
                ..Default::default()
            },
        );
        center.login_success("Sam").await;
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_log_notifier_tracks_pending_reminders() {
        let notifier = LogNotifier::new();
        notifier
            .schedule(Notification::daily("dailyWorkoutReminder", 6, 15).unwrap())
            .await
            .unwrap();
        assert_eq!(notifier.pending().len(), 1);
        notifier.cancel("dailyWorkoutReminder").await.unwrap();
        assert!(notifier.pending().is_empty());
    }
}
