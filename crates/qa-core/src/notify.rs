//! Observer subscriptions and notification fan-out
//!
//! Users subscribe to questions. When a question changes, every current
//! observer receives the event; a user's handler turns a freshly posted
//! answer by someone else into a [`Notification`]. Notifications are removed
//! eagerly when the answer they point at is deleted, so listing them never
//! has to clean up.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::db::Database;
use crate::error::StoreResult;
use crate::models::{AnswerRef, Notification};
use crate::table::{NotificationId, QuestionId, UserId};

/// Something that happened to an observed question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionEvent {
    AnswerPosted(AnswerRef),
}

impl Database {
    pub fn observe(&mut self, user: UserId, question: QuestionId) -> StoreResult<bool> {
        self.require_user(user)?;
        Ok(self.require_question_mut(question)?.add_observer(user))
    }

    pub fn unobserve(&mut self, user: UserId, question: QuestionId) -> StoreResult<bool> {
        Ok(self.require_question_mut(question)?.remove_observer(user))
    }

    /// Deliver `event` to every current observer of `question`
    pub fn notify_observers(&mut self, question: QuestionId, event: QuestionEvent, now: DateTime<Utc>) {
        let observers: Vec<UserId> = match self.questions.get(question) {
            Some(question) => question.observers.iter().copied().collect(),
            None => return,
        };
        for observer in observers {
            self.deliver(observer, event, now);
        }
    }

    /// A single observer's reaction to a question event
    fn deliver(&mut self, observer: UserId, event: QuestionEvent, now: DateTime<Utc>) {
        match event {
            QuestionEvent::AnswerPosted(reference) => {
                let author = self.answer(reference).and_then(|answer| answer.owner);
                if author == Some(observer) || !self.users.contains_id(observer) {
                    return;
                }
                let id = self
                    .notifications
                    .add_new(|id| Notification::new(id, observer, reference, now));
                if let Some(user) = self.users.get_mut(observer) {
                    user.items.notifications.insert(id);
                }
                if let Some(answer) = self.answer_mut(reference) {
                    answer.notifications.insert(id);
                }
                debug!(user = %observer, notification = %id, "Created notification");
            }
        }
    }

    pub fn unregister_notification(&mut self, id: NotificationId) -> bool {
        let Some(notification) = self.notifications.remove(id) else {
            return false;
        };
        if let Some(user) = self.users.get_mut(notification.owner) {
            user.items.notifications.remove(&id);
        }
        if let Some(answer) = self.answer_mut(notification.about) {
            answer.notifications.remove(&id);
        }
        true
    }

    /// The user's notifications, most recent first
    pub fn notifications_for(&self, user: UserId) -> Vec<&Notification> {
        let Some(account) = self.users.get(user) else {
            return Vec::new();
        };
        let mut notifications: Vec<&Notification> = account
            .items
            .notifications
            .iter()
            .filter_map(|id| self.notifications.get(*id))
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        notifications
    }

    pub fn unread_notifications_for(&self, user: UserId) -> Vec<&Notification> {
        self.notifications_for(user)
            .into_iter()
            .filter(|notification| notification.is_new())
            .collect()
    }

    /// The newest unread notification, if it is younger than `window`
    pub fn very_recent_unread(&self, user: UserId, now: DateTime<Utc>, window: Duration) -> Option<&Notification> {
        self.unread_notifications_for(user)
            .into_iter()
            .find(|notification| notification.is_very_recent(now, window))
    }

    /// Mark one of the user's notifications as read
    pub fn mark_read(&mut self, user: UserId, id: NotificationId) -> bool {
        match self.notifications.get_mut(id) {
            Some(notification) if notification.owner == user => {
                notification.read = true;
                true
            }
            _ => false,
        }
    }

    /// Questions the user is observing, oldest first
    pub fn watched_questions(&self, user: UserId) -> Vec<QuestionId> {
        self.questions
            .values()
            .filter(|question| question.has_observer(user))
            .map(|question| question.id)
            .collect()
    }
}
