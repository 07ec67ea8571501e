//! The entity arena
//!
//! `Database` holds every table of the store. It is not synchronized itself;
//! [`Store`](crate::store::Store) wraps it in a lock and each facade call works
//! on it under a single acquisition. The lifecycle, fan-out, heuristics and
//! ranking code extend `Database` from their own modules.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::models::{ItemRef, Notification, Question, User};
use crate::table::{EntityTable, QuestionId, UserId};
use crate::tags::TagIndex;

#[derive(Debug, Default)]
pub(crate) struct Database {
    pub users: EntityTable<User>,
    /// Lowercased user name -> id
    pub user_names: HashMap<String, UserId>,
    pub questions: EntityTable<Question>,
    pub tags: TagIndex,
    pub notifications: EntityTable<Notification>,
}

/// Which of a user's posts lose their author on anonymization
///
/// Questions are always anonymized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnonymizeOptions {
    pub answers: bool,
    pub comments: bool,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_id(&self, name: &str) -> Option<UserId> {
        self.user_names.get(&name.to_lowercase()).copied()
    }

    pub fn user_by_name(&self, name: &str) -> Option<&User> {
        self.user_id(name).and_then(|id| self.users.get(id))
    }

    pub fn require_user(&self, id: UserId) -> StoreResult<&User> {
        self.users
            .get(id)
            .ok_or_else(|| StoreError::not_found(format!("user {}", id)))
    }

    pub fn require_question(&self, id: QuestionId) -> StoreResult<&Question> {
        self.questions
            .get(id)
            .ok_or_else(|| StoreError::not_found(format!("question {}", id)))
    }

    pub fn require_question_mut(&mut self, id: QuestionId) -> StoreResult<&mut Question> {
        self.questions
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(format!("question {}", id)))
    }

    // ==================== Users ====================

    pub fn register_user(&mut self, name: &str, password: &str, now: DateTime<Utc>) -> StoreResult<UserId> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(StoreError::Validation {
                field: "name",
                reason: "must not be empty".to_string(),
            });
        }
        let key = trimmed.to_lowercase();
        if self.user_names.contains_key(&key) {
            return Err(StoreError::UsernameTaken(trimmed.to_string()));
        }
        let id = self.users.next_id();
        self.users.add(User::new(id, trimmed, password, now))?;
        self.user_names.insert(key, id);
        info!(user = %trimmed, id = %id, "Registered user");
        Ok(id)
    }

    /// Delete a user together with everything they authored
    pub fn delete_user(&mut self, id: UserId) -> StoreResult<()> {
        let items = self.require_user(id)?.items.clone();

        for question in &items.questions {
            self.unregister_question(*question);
        }
        for answer in &items.answers {
            self.unregister_answer(*answer);
        }
        for comment in &items.comments {
            self.unregister_comment(*comment);
        }
        for target in &items.votes {
            self.retract_vote(*target, id);
        }
        for notification in &items.notifications {
            self.unregister_notification(*notification);
        }
        for question in self.questions.values_mut() {
            question.remove_observer(id);
        }

        if let Some(user) = self.users.remove(id) {
            self.user_names.remove(&user.name.to_lowercase());
            info!(user = %user.name, "Deleted user and their items");
        }
        Ok(())
    }

    /// Detach the user from their posts, leaving the posts in place
    pub fn anonymize_user(&mut self, id: UserId, options: AnonymizeOptions) -> StoreResult<usize> {
        let items = self.require_user(id)?.items.clone();
        let mut count = 0;

        for question_id in &items.questions {
            if let Some(question) = self.questions.get_mut(*question_id) {
                question.owner = None;
                count += 1;
            }
        }
        if options.answers {
            for answer_ref in &items.answers {
                if let Some(answer) = self.answer_mut(*answer_ref) {
                    answer.owner = None;
                    count += 1;
                }
            }
        }
        if options.comments {
            for comment_ref in &items.comments {
                if let Some(comment) = self.comment_mut(*comment_ref) {
                    comment.owner = None;
                    count += 1;
                }
            }
        }

        if let Some(user) = self.users.get_mut(id) {
            user.items.questions.clear();
            if options.answers {
                user.items.answers.clear();
            }
            if options.comments {
                user.items.comments.clear();
            }
        }
        info!(user = %id, items = count, "Anonymized user");
        Ok(count)
    }

    /// Moderators may edit anything; everyone else only their own posts
    pub fn can_edit(&self, user: UserId, item: ItemRef) -> bool {
        let Some(account) = self.users.get(user) else {
            return false;
        };
        if account.moderator {
            return true;
        }
        self.owner_of(item) == Some(user)
    }

    pub fn owner_of(&self, item: ItemRef) -> Option<UserId> {
        match item {
            ItemRef::Question(id) => self.questions.get(id).and_then(|q| q.owner),
            ItemRef::Answer(answer) => self.answer(answer).and_then(|a| a.owner),
            ItemRef::Comment(comment) => self.comment(comment).and_then(|c| c.owner),
            ItemRef::Vote { voter, target } => self.votes_on(target)?.get(voter).map(|v| v.voter),
        }
    }

    pub fn clear(&mut self) {
        *self = Database::new();
        info!("Cleared all store data");
    }
}
