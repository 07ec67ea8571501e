//! Unified store interface
//!
//! The `Store` owns every table of the Q&A domain and is the single entry
//! point for callers. It can be shared across threads behind an `Arc`.
//!
//! ## Consistency
//!
//! All tables live in one arena behind a read/write lock. Each method takes
//! the lock once, so registrations, tag replacement and cascading deletes are
//! atomic: a concurrent reader sees the state before or after, never a
//! question that is half deleted or half retagged. Readers get owned copies.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Store::new(Config::default());
//!
//! let jack = store.register_user("Jack", "secret")?;
//! let question = store.create_question(jack.id, "Why is the sky blue?")?;
//! store.set_tags(question, "physics, sky")?;
//!
//! let hits = store.search("sky");
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, Rules};
use crate::db::{AnonymizeOptions, Database};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    is_valid_email, parse_date, Answer, AnswerRef, Comment, CommentParent, CommentRef, ItemRef,
    Notification, Profile, Question, Tag, User, VoteDirection, VoteTarget,
};
use crate::search::Ranked;
use crate::table::{NotificationId, QuestionId, UserId};

/// The process-wide Q&A store
#[derive(Debug)]
pub struct Store {
    db: RwLock<Database>,
    config: Config,
    clock: Arc<dyn Clock>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Store {
    /// Create a store using the configuration from the default location
    pub fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Ok(Self::new(config))
    }

    /// Create an empty store with the given configuration
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an empty store that reads time from `clock`
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Self {
        debug!(rules = ?config.rules, "Opened store");
        Self {
            db: RwLock::new(Database::new()),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rules(&self) -> &Rules {
        &self.config.rules
    }

    /// Current time according to the store's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn read<R>(&self, f: impl FnOnce(&Database) -> R) -> R {
        f(&self.db.read())
    }

    fn write<R>(&self, f: impl FnOnce(&mut Database) -> R) -> R {
        f(&mut self.db.write())
    }

    /// Run `f` on the named user's account
    fn update_user<R>(&self, name: &str, f: impl FnOnce(&mut User) -> R) -> StoreResult<R> {
        self.write(|db| {
            let id = named(db, name)?;
            let user = db
                .users
                .get_mut(id)
                .ok_or_else(|| StoreError::not_found(format!("user {}", name)))?;
            Ok(f(user))
        })
    }

    // ==================== Users ====================

    /// Register a new user; names are unique ignoring case
    pub fn register_user(&self, name: &str, password: &str) -> StoreResult<User> {
        let now = self.now();
        self.write(|db| {
            let id = db.register_user(name, password, now)?;
            db.require_user(id).cloned()
        })
    }

    /// Look up a user by name (case-insensitive)
    pub fn user(&self, name: &str) -> Option<User> {
        self.read(|db| db.user_by_name(name).cloned())
    }

    pub fn user_by_id(&self, id: UserId) -> Option<User> {
        self.read(|db| db.users.get(id).cloned())
    }

    pub fn users(&self) -> Vec<User> {
        self.read(|db| db.users.values().cloned().collect())
    }

    /// Delete a user and everything they authored
    pub fn delete_user(&self, name: &str) -> StoreResult<()> {
        self.write(|db| {
            let id = named(db, name)?;
            db.delete_user(id)
        })
    }

    /// Remove the user's name from their posts; returns how many posts changed
    pub fn anonymize_user(&self, name: &str, options: AnonymizeOptions) -> StoreResult<usize> {
        self.write(|db| {
            let id = named(db, name)?;
            db.anonymize_user(id, options)
        })
    }

    /// Whether `password` matches; unknown users never match
    pub fn check_password(&self, name: &str, password: &str) -> bool {
        self.read(|db| {
            db.user_by_name(name)
                .is_some_and(|user| user.check_password(password))
        })
    }

    pub fn profile(&self, name: &str) -> Option<Profile> {
        self.read(|db| db.user_by_name(name).map(|user| user.profile.clone()))
    }

    /// Age in whole years, or 0 when no birth date is known
    pub fn age(&self, name: &str) -> Option<u32> {
        let now = self.now();
        self.read(|db| db.user_by_name(name).map(|user| user.profile.age(now)))
    }

    pub fn set_email(&self, name: &str, email: &str) -> StoreResult<()> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(StoreError::Validation {
                field: "email",
                reason: format!("'{}' is not an e-mail address", email),
            });
        }
        self.update_user(name, |user| user.profile.email = Some(email.to_string()))
    }

    /// Set the birth date from text; unreadable dates clear it
    pub fn set_date_of_birth(&self, name: &str, date: &str) -> StoreResult<Option<NaiveDate>> {
        let parsed = parse_date(date);
        self.update_user(name, |user| {
            user.profile.date_of_birth = parsed;
            parsed
        })
    }

    pub fn set_full_name(&self, name: &str, full_name: &str) -> StoreResult<()> {
        self.update_user(name, |user| user.profile.full_name = optional(full_name))
    }

    pub fn set_website(&self, name: &str, website: &str) -> StoreResult<()> {
        self.update_user(name, |user| user.profile.website = optional(website))
    }

    pub fn set_profession(&self, name: &str, profession: &str) -> StoreResult<()> {
        self.update_user(name, |user| user.profile.profession = optional(profession))
    }

    pub fn set_employer(&self, name: &str, employer: &str) -> StoreResult<()> {
        self.update_user(name, |user| user.profile.employer = optional(employer))
    }

    pub fn set_biography(&self, name: &str, biography: &str) -> StoreResult<()> {
        self.update_user(name, |user| user.profile.biography = optional(biography))
    }

    pub fn set_moderator(&self, name: &str, moderator: bool) -> StoreResult<()> {
        self.update_user(name, |user| user.moderator = moderator)?;
        info!(user = %name, moderator, "Changed moderator flag");
        Ok(())
    }

    pub fn block_user(&self, name: &str, message: &str) -> StoreResult<()> {
        self.update_user(name, |user| user.block(message))?;
        info!(user = %name, "Blocked user");
        Ok(())
    }

    pub fn unblock_user(&self, name: &str) -> StoreResult<()> {
        self.update_user(name, User::unblock)?;
        info!(user = %name, "Unblocked user");
        Ok(())
    }

    /// Whether `user` may edit `item`: moderators always, others only their own
    pub fn can_edit(&self, user: UserId, item: ItemRef) -> bool {
        self.read(|db| db.can_edit(user, item))
    }

    // ==================== Abuse ====================

    /// Items the user posted or voted within the hour before `now`
    pub fn items_per_hour(&self, name: &str, now: DateTime<Utc>) -> StoreResult<usize> {
        self.read(|db| db.items_per_hour(named(db, name)?, now))
    }

    /// Flag (and block) the user if they post too fast
    pub fn is_spammer(&self, name: &str) -> StoreResult<bool> {
        let now = self.now();
        self.write(|db| {
            let id = named(db, name)?;
            db.is_spammer(id, now, &self.config.rules)
        })
    }

    /// Flag (and block) the user if their up votes favour one person
    pub fn is_maybe_cheater(&self, name: &str) -> StoreResult<bool> {
        self.write(|db| {
            let id = named(db, name)?;
            db.is_maybe_cheater(id, &self.config.rules)
        })
    }

    /// Spammer or cheater, checked in that order
    pub fn is_cheating(&self, name: &str) -> StoreResult<bool> {
        let now = self.now();
        self.write(|db| {
            let id = named(db, name)?;
            db.is_cheating(id, now, &self.config.rules)
        })
    }

    // ==================== Per-user views ====================

    /// The user's questions, oldest first
    pub fn questions_of(&self, name: &str) -> Vec<Question> {
        self.read(|db| {
            let Some(user) = db.user_by_name(name) else {
                return Vec::new();
            };
            let mut questions: Vec<Question> = user
                .items
                .questions
                .iter()
                .filter_map(|id| db.questions.get(*id).cloned())
                .collect();
            questions.sort_by_key(|question| (question.created_at, question.id));
            questions
        })
    }

    /// The user's answers, oldest first
    pub fn answers_of(&self, name: &str) -> Vec<Answer> {
        self.read(|db| answers_of(db, name))
    }

    /// The user's comments, oldest first
    pub fn comments_of(&self, name: &str) -> Vec<Comment> {
        self.read(|db| {
            let Some(user) = db.user_by_name(name) else {
                return Vec::new();
            };
            let mut comments: Vec<Comment> = user
                .items
                .comments
                .iter()
                .filter_map(|reference| db.comment(*reference).cloned())
                .collect();
            comments.sort_by_key(|comment| (comment.created_at, comment.reference()));
            comments
        })
    }

    pub fn recent_questions(&self, name: &str) -> Vec<Question> {
        self.most_recent(self.questions_of(name))
    }

    pub fn recent_answers(&self, name: &str) -> Vec<Answer> {
        self.most_recent(self.answers_of(name))
    }

    pub fn recent_comments(&self, name: &str) -> Vec<Comment> {
        self.most_recent(self.comments_of(name))
    }

    /// Reverse an oldest-first list and keep the configured number of entries
    fn most_recent<T>(&self, oldest_first: Vec<T>) -> Vec<T> {
        oldest_first
            .into_iter()
            .rev()
            .take(self.config.rules.recent_items)
            .collect()
    }

    /// The user's answers that were chosen as best answer
    pub fn best_answers_of(&self, name: &str) -> Vec<Answer> {
        self.read(|db| {
            answers_of(db, name)
                .into_iter()
                .filter(|answer| is_best(db, answer.reference()))
                .collect()
        })
    }

    pub fn high_rated_answers_of(&self, name: &str) -> Vec<Answer> {
        let threshold = self.config.rules.high_rated_threshold;
        self.read(|db| {
            answers_of(db, name)
                .into_iter()
                .filter(|answer| answer.is_high_rated(threshold))
                .collect()
        })
    }

    pub fn watched_questions(&self, user: UserId) -> Vec<Question> {
        self.read(|db| {
            db.watched_questions(user)
                .into_iter()
                .filter_map(|id| db.questions.get(id).cloned())
                .collect()
        })
    }

    /// Other people's questions related to the user's own, best match first
    pub fn suggested_questions(&self, user: UserId) -> Vec<Question> {
        self.read(|db| resolve(db, db.suggested_questions(user)))
    }

    // ==================== Questions ====================

    pub fn create_question(&self, owner: UserId, content: &str) -> StoreResult<QuestionId> {
        let now = self.now();
        self.write(|db| db.register_question(owner, content, now))
    }

    pub fn question(&self, id: QuestionId) -> Option<Question> {
        self.read(|db| db.questions.get(id).cloned())
    }

    /// Every question, newest first
    pub fn questions(&self) -> Vec<Question> {
        self.read(|db| {
            let mut questions: Vec<Question> = db.questions.values().cloned().collect();
            questions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            questions
        })
    }

    /// Every question and every tag, read together
    ///
    /// Both lists come from the same state, so each tag's question set
    /// agrees with the returned questions.
    pub fn questions_and_tags(&self) -> (Vec<Question>, Vec<Tag>) {
        self.read(|db| {
            let questions = db.questions.values().cloned().collect();
            let tags = db.tags.all().into_iter().cloned().collect();
            (questions, tags)
        })
    }

    /// Delete a question together with its answers, comments and votes
    pub fn delete_question(&self, id: QuestionId) -> StoreResult<()> {
        self.write(|db| {
            if db.unregister_question(id) {
                Ok(())
            } else {
                Err(StoreError::not_found(format!("question {}", id)))
            }
        })
    }

    /// Replace the question's tags; returns the resulting tag names
    pub fn set_tags(&self, id: QuestionId, tags: &str) -> StoreResult<Vec<String>> {
        self.write(|db| {
            let ids = db.set_tags(id, Some(tags))?;
            Ok(db.tags.names(&ids))
        })
    }

    /// Replace the question's tags on behalf of `user`
    pub fn update_tags_as(&self, id: QuestionId, user: UserId, tags: &str) -> StoreResult<Vec<String>> {
        self.write(|db| {
            ensure_can_edit(db, user, ItemRef::Question(id))?;
            let ids = db.set_tags(id, Some(tags))?;
            Ok(db.tags.names(&ids))
        })
    }

    /// The question's tag names, alphabetically
    pub fn question_tags(&self, id: QuestionId) -> Option<Vec<String>> {
        self.read(|db| {
            db.questions
                .get(id)
                .map(|question| db.tags.names(question.tag_ids()))
        })
    }

    pub fn edit_question(&self, id: QuestionId, editor: UserId, content: &str) -> StoreResult<()> {
        self.write(|db| {
            ensure_can_edit(db, editor, ItemRef::Question(id))?;
            db.edit_content(ItemRef::Question(id), content.to_string())
        })
    }

    pub fn vote_question(&self, id: QuestionId, voter: UserId, direction: VoteDirection) -> StoreResult<()> {
        let now = self.now();
        self.write(|db| db.cast_vote(VoteTarget::Question(id), voter, direction, now))
    }

    /// Withdraw the voter's vote; `false` when there was none
    pub fn retract_vote(&self, target: VoteTarget, voter: UserId) -> bool {
        self.write(|db| db.retract_vote(target, voter))
    }

    /// Up votes minus down votes
    pub fn rating(&self, target: VoteTarget) -> Option<i64> {
        self.read(|db| db.votes_on(target).map(|votes| votes.rating()))
    }

    /// Choose the best answer of a question
    ///
    /// Returns `Ok(false)` if a best answer was chosen less than the
    /// configured window before `now`.
    pub fn set_best_answer(&self, answer: AnswerRef, now: DateTime<Utc>) -> StoreResult<bool> {
        let window = self.config.rules.best_answer_window();
        self.write(|db| db.set_best_answer(answer, now, window))
    }

    pub fn best_answer(&self, question: QuestionId) -> Option<Answer> {
        self.read(|db| {
            let question = db.questions.get(question)?;
            question.answer(question.best_answer()?).cloned()
        })
    }

    pub fn is_best_answer(&self, answer: AnswerRef) -> bool {
        self.read(|db| is_best(db, answer))
    }

    pub fn lock_question(&self, id: QuestionId) -> StoreResult<()> {
        self.write(|db| {
            db.require_question_mut(id)?.lock();
            Ok(())
        })
    }

    pub fn unlock_question(&self, id: QuestionId) -> StoreResult<()> {
        self.write(|db| {
            db.require_question_mut(id)?.unlock();
            Ok(())
        })
    }

    /// Questions matching `term` by tag or text, best match first
    pub fn search(&self, term: &str) -> Vec<Question> {
        self.read(|db| resolve(db, db.search_for(term)))
    }

    /// Scored search results, for callers that show the ranking
    pub fn search_ranked(&self, term: &str) -> Vec<Ranked> {
        self.read(|db| db.search_for(term))
    }

    /// Questions sharing tags with `id`, best match first; `None` for unknown ids
    pub fn similar(&self, id: QuestionId) -> Option<Vec<Question>> {
        self.read(|db| {
            db.questions.get(id)?;
            Some(resolve(db, db.find_similar(id)))
        })
    }

    /// The question's answers, oldest first
    pub fn answers(&self, question: QuestionId) -> Vec<Answer> {
        self.read(|db| {
            db.questions
                .get(question)
                .map(|question| question.answers().into_iter().cloned().collect())
                .unwrap_or_default()
        })
    }

    /// Comments directly on the question, oldest first
    pub fn comments(&self, question: QuestionId) -> Vec<Comment> {
        self.read(|db| {
            db.questions
                .get(question)
                .map(|question| question.comments().into_iter().cloned().collect())
                .unwrap_or_default()
        })
    }

    // ==================== Answers and comments ====================

    pub fn create_answer(&self, question: QuestionId, owner: UserId, content: &str) -> StoreResult<AnswerRef> {
        let now = self.now();
        self.write(|db| db.post_answer(question, owner, content, now))
    }

    pub fn answer(&self, reference: AnswerRef) -> Option<Answer> {
        self.read(|db| db.answer(reference).cloned())
    }

    pub fn delete_answer(&self, reference: AnswerRef) -> StoreResult<()> {
        self.write(|db| {
            if db.unregister_answer(reference) {
                Ok(())
            } else {
                Err(StoreError::not_found(format!(
                    "answer {} on question {}",
                    reference.answer, reference.question
                )))
            }
        })
    }

    pub fn edit_answer(&self, reference: AnswerRef, editor: UserId, content: &str) -> StoreResult<()> {
        self.write(|db| {
            ensure_can_edit(db, editor, ItemRef::Answer(reference))?;
            db.edit_content(ItemRef::Answer(reference), content.to_string())
        })
    }

    pub fn vote_answer(&self, reference: AnswerRef, voter: UserId, direction: VoteDirection) -> StoreResult<()> {
        let now = self.now();
        self.write(|db| db.cast_vote(VoteTarget::Answer(reference), voter, direction, now))
    }

    pub fn is_high_rated(&self, reference: AnswerRef) -> bool {
        let threshold = self.config.rules.high_rated_threshold;
        self.read(|db| {
            db.answer(reference)
                .is_some_and(|answer| answer.is_high_rated(threshold))
        })
    }

    /// Comment on a question or on an answer
    pub fn create_comment(&self, parent: CommentParent, owner: UserId, content: &str) -> StoreResult<CommentRef> {
        let now = self.now();
        self.write(|db| db.post_comment(parent, owner, content, now))
    }

    pub fn comment(&self, reference: CommentRef) -> Option<Comment> {
        self.read(|db| db.comment(reference).cloned())
    }

    pub fn delete_comment(&self, reference: CommentRef) -> StoreResult<()> {
        self.write(|db| {
            if db.unregister_comment(reference) {
                Ok(())
            } else {
                Err(StoreError::not_found(format!("comment {}", reference.comment)))
            }
        })
    }

    /// Comments on an answer, oldest first
    pub fn answer_comments(&self, reference: AnswerRef) -> Vec<Comment> {
        self.read(|db| {
            db.answer(reference)
                .map(|answer| answer.comments().into_iter().cloned().collect())
                .unwrap_or_default()
        })
    }

    // ==================== Notifications ====================

    /// Subscribe `user` to new answers on `question`
    pub fn observe(&self, user: UserId, question: QuestionId) -> StoreResult<bool> {
        self.write(|db| db.observe(user, question))
    }

    pub fn unobserve(&self, user: UserId, question: QuestionId) -> StoreResult<bool> {
        self.write(|db| db.unobserve(user, question))
    }

    pub fn is_observing(&self, user: UserId, question: QuestionId) -> bool {
        self.read(|db| {
            db.questions
                .get(question)
                .is_some_and(|question| question.has_observer(user))
        })
    }

    /// The user's notifications, newest first
    pub fn notifications_for(&self, user: UserId) -> Vec<Notification> {
        self.read(|db| db.notifications_for(user).into_iter().cloned().collect())
    }

    pub fn unread_notifications_for(&self, user: UserId) -> Vec<Notification> {
        self.read(|db| {
            db.unread_notifications_for(user)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// One of the user's notifications; other users' notifications are not visible
    pub fn notification(&self, user: UserId, id: NotificationId) -> Option<Notification> {
        self.read(|db| {
            db.notifications
                .get(id)
                .filter(|notification| notification.owner == user)
                .cloned()
        })
    }

    pub fn mark_notification_read(&self, user: UserId, id: NotificationId) -> StoreResult<()> {
        self.write(|db| {
            if db.mark_read(user, id) {
                Ok(())
            } else {
                Err(StoreError::not_found(format!("notification {}", id)))
            }
        })
    }

    /// The newest unread notification, if it arrived very recently
    pub fn very_recent_unread_notification(&self, user: UserId) -> Option<Notification> {
        let now = self.now();
        let window = self.config.rules.very_recent_window();
        self.read(|db| db.very_recent_unread(user, now, window).cloned())
    }

    // ==================== Tags ====================

    /// Every known tag, alphabetically
    pub fn all_tags(&self) -> Vec<Tag> {
        self.read(|db| db.tags.all().into_iter().cloned().collect())
    }

    /// Tags starting with `prefix`, for autocompletion
    pub fn tags_with_prefix(&self, prefix: &str) -> Vec<Tag> {
        self.read(|db| db.tags.with_prefix(prefix).into_iter().cloned().collect())
    }

    pub fn tag(&self, name: &str) -> Option<Tag> {
        self.read(|db| db.tags.find(name).cloned())
    }

    /// Questions carrying the named tag, oldest first
    pub fn questions_tagged(&self, name: &str) -> Vec<Question> {
        self.read(|db| {
            db.tags
                .find(name)
                .map(|tag| {
                    tag.questions()
                        .iter()
                        .filter_map(|id| db.questions.get(*id).cloned())
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    // ==================== Stats ====================

    pub fn user_count(&self) -> usize {
        self.read(|db| db.users.size())
    }

    pub fn question_count(&self) -> usize {
        self.read(|db| db.questions.size())
    }

    pub fn answer_count(&self) -> usize {
        self.read(|db| db.questions.values().map(Question::count_answers).sum())
    }

    pub fn high_rated_answer_count(&self) -> usize {
        let threshold = self.config.rules.high_rated_threshold;
        self.read(|db| {
            db.questions
                .values()
                .flat_map(|question| question.answers.values())
                .filter(|answer| answer.is_high_rated(threshold))
                .count()
        })
    }

    pub fn best_answer_count(&self) -> usize {
        self.read(|db| {
            db.questions
                .values()
                .filter(|question| question.has_best_answer())
                .count()
        })
    }

    // ==================== Advanced ====================

    /// Drop all data and start over with fresh tables
    pub fn clear(&self) {
        self.write(Database::clear);
    }
}

fn named(db: &Database, name: &str) -> StoreResult<UserId> {
    db.user_id(name)
        .ok_or_else(|| StoreError::not_found(format!("user {}", name)))
}

fn ensure_can_edit(db: &Database, user: UserId, item: ItemRef) -> StoreResult<()> {
    if !exists(db, item) {
        return Err(StoreError::not_found(format!("{:?}", item)));
    }
    if db.can_edit(user, item) {
        Ok(())
    } else {
        Err(StoreError::Permission(format!(
            "user {} may not edit {:?}",
            user, item
        )))
    }
}

fn exists(db: &Database, item: ItemRef) -> bool {
    match item {
        ItemRef::Question(id) => db.questions.contains_id(id),
        ItemRef::Answer(reference) => db.answer(reference).is_some(),
        ItemRef::Comment(reference) => db.comment(reference).is_some(),
        ItemRef::Vote { voter, target } => db
            .votes_on(target)
            .is_some_and(|votes| votes.get(voter).is_some()),
    }
}

/// The user's answers, oldest first
fn answers_of(db: &Database, name: &str) -> Vec<Answer> {
    let Some(user) = db.user_by_name(name) else {
        return Vec::new();
    };
    let mut answers: Vec<Answer> = user
        .items
        .answers
        .iter()
        .filter_map(|reference| db.answer(*reference).cloned())
        .collect();
    answers.sort_by_key(|answer| (answer.created_at, answer.reference()));
    answers
}

fn is_best(db: &Database, answer: AnswerRef) -> bool {
    db.questions
        .get(answer.question)
        .is_some_and(|question| question.best_answer() == Some(answer.answer))
}

fn resolve(db: &Database, ranked: Vec<Ranked>) -> Vec<Question> {
    ranked
        .into_iter()
        .filter_map(|hit| db.questions.get(hit.question).cloned())
        .collect()
}

/// Empty text clears an optional profile field
fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2010, 12, 1, 10, 0, 0).unwrap()
    }

    fn store() -> (Store, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let store = Store::with_clock(Config::default(), clock.clone());
        (store, clock)
    }

    #[test]
    fn test_register_and_lookup_user() {
        let (store, _) = store();
        let jack = store.register_user("Jack", "secret").unwrap();
        assert_eq!(jack.name, "Jack");
        assert_eq!(store.user("jack").unwrap().id, jack.id);
        assert!(store.check_password("JACK", "secret"));
        assert!(!store.check_password("Jack", "wrong"));
        assert!(!store.check_password("Nobody", "secret"));

        let err = store.register_user("jAcK", "other").unwrap_err();
        assert_eq!(err, StoreError::UsernameTaken("jAcK".to_string()));
        assert_eq!(store.user_count(), 1);
    }

    #[test]
    fn test_profile_setters() {
        let (store, _) = store();
        store.register_user("Jack", "secret").unwrap();

        store.set_email("Jack", "jack@example.com").unwrap();
        assert!(matches!(
            store.set_email("Jack", "not-an-address"),
            Err(StoreError::Validation { field: "email", .. })
        ));
        assert_eq!(
            store.set_date_of_birth("Jack", "24.12.1980").unwrap(),
            NaiveDate::from_ymd_opt(1980, 12, 24)
        );
        assert_eq!(store.age("Jack"), Some(29));
        store.set_full_name("Jack", "Jack Sparrow").unwrap();
        store.set_website("Jack", " ").unwrap();

        let profile = store.profile("Jack").unwrap();
        assert_eq!(profile.email.as_deref(), Some("jack@example.com"));
        assert_eq!(profile.full_name.as_deref(), Some("Jack Sparrow"));
        assert!(profile.website.is_none());

        // Unreadable dates clear the birth date
        assert_eq!(store.set_date_of_birth("Jack", "yesterday").unwrap(), None);
        assert_eq!(store.age("Jack"), Some(0));

        assert!(matches!(
            store.set_biography("Nobody", "bio"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_question_lifecycle() {
        let (store, _) = store();
        let jack = store.register_user("Jack", "j").unwrap();
        let q = store.create_question(jack.id, "Why?").unwrap();

        assert_eq!(store.set_tags(q, "b a, a").unwrap(), vec!["a", "b"]);
        assert_eq!(store.question_tags(q).unwrap(), vec!["a", "b"]);
        assert_eq!(store.questions_tagged("A").len(), 1);

        store.lock_question(q).unwrap();
        assert!(store.question(q).unwrap().is_locked());
        store.unlock_question(q).unwrap();
        assert!(!store.question(q).unwrap().is_locked());

        store.delete_question(q).unwrap();
        assert!(store.question(q).is_none());
        assert!(store.questions_tagged("a").is_empty());
        assert!(store.questions_of("Jack").is_empty());
        assert!(matches!(store.delete_question(q), Err(StoreError::NotFound(_))));
        assert!(store.lock_question(q).is_err());
    }

    #[test]
    fn test_edit_permissions() {
        let (store, _) = store();
        let owner = store.register_user("Owner", "o").unwrap();
        let other = store.register_user("Other", "o").unwrap();
        let moderator = store.register_user("Mod", "m").unwrap();
        store.set_moderator("Mod", true).unwrap();

        let q = store.create_question(owner.id, "Original").unwrap();
        assert!(matches!(
            store.edit_question(q, other.id, "Hijacked"),
            Err(StoreError::Permission(_))
        ));
        store.edit_question(q, owner.id, "Edited").unwrap();
        store.edit_question(q, moderator.id, "Moderated").unwrap();
        assert_eq!(store.question(q).unwrap().content, "Moderated");

        assert!(matches!(
            store.update_tags_as(q, other.id, "spam"),
            Err(StoreError::Permission(_))
        ));
        assert_eq!(store.update_tags_as(q, owner.id, "rust").unwrap(), vec!["rust"]);

        let a = store.create_answer(q, other.id, "Answer").unwrap();
        store.edit_answer(a, other.id, "Better answer").unwrap();
        assert!(store.edit_answer(a, owner.id, "Nope").is_err());
        assert!(store.can_edit(moderator.id, ItemRef::Answer(a)));

        assert!(matches!(
            store.edit_question(QuestionId(99), owner.id, "x"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_best_answer_window() {
        let (store, _) = store();
        let asker = store.register_user("Asker", "a").unwrap();
        let helper = store.register_user("Helper", "h").unwrap();
        let q = store.create_question(asker.id, "Why?").unwrap();
        let a1 = store.create_answer(q, helper.id, "One").unwrap();
        let a2 = store.create_answer(q, helper.id, "Two").unwrap();

        let t0 = start();
        assert!(store.set_best_answer(a1, t0).unwrap());
        assert!(!store.set_best_answer(a2, t0 + Duration::minutes(29)).unwrap());
        assert!(store.is_best_answer(a1));
        assert!(store.set_best_answer(a2, t0 + Duration::minutes(31)).unwrap());
        assert_eq!(store.best_answer(q).unwrap().id, a2.answer);
        assert_eq!(store.best_answers_of("Helper").len(), 1);
        assert_eq!(store.best_answer_count(), 1);
    }

    #[test]
    fn test_unbounded_windows_do_not_overflow() {
        let mut config = Config::default();
        config.rules.best_answer_window_minutes = 100_000_000_000_000;
        config.rules.very_recent_seconds = i64::MAX;
        let clock = Arc::new(ManualClock::new(start()));
        let store = Store::with_clock(config, clock.clone());

        let asker = store.register_user("Asker", "a").unwrap();
        let helper = store.register_user("Helper", "h").unwrap();
        let q = store.create_question(asker.id, "Why?").unwrap();
        store.observe(asker.id, q).unwrap();
        let a1 = store.create_answer(q, helper.id, "One").unwrap();
        let a2 = store.create_answer(q, helper.id, "Two").unwrap();

        assert!(store.set_best_answer(a1, DateTime::<Utc>::MIN_UTC).unwrap());
        assert!(!store.set_best_answer(a2, start()).unwrap());
        assert!(store.is_best_answer(a1));

        clock.advance(Duration::days(365));
        assert!(store.very_recent_unread_notification(asker.id).is_some());
    }

    #[test]
    fn test_votes_and_high_rating() {
        let (store, _) = store();
        let author = store.register_user("Author", "a").unwrap();
        let q = store.create_question(author.id, "Why?").unwrap();
        let a = store.create_answer(q, author.id, "Because").unwrap();

        for i in 0..5 {
            let voter = store.register_user(&format!("Voter{}", i), "v").unwrap();
            store.vote_answer(a, voter.id, VoteDirection::Up).unwrap();
        }
        assert_eq!(store.rating(VoteTarget::Answer(a)), Some(5));
        assert!(store.is_high_rated(a));
        assert_eq!(store.high_rated_answer_count(), 1);
        assert_eq!(store.high_rated_answers_of("Author").len(), 1);

        let voter = store.user("Voter0").unwrap();
        store.vote_answer(a, voter.id, VoteDirection::Down).unwrap();
        assert_eq!(store.rating(VoteTarget::Answer(a)), Some(3));
        assert!(!store.is_high_rated(a));

        assert!(store.retract_vote(VoteTarget::Answer(a), voter.id));
        assert_eq!(store.rating(VoteTarget::Answer(a)), Some(4));
    }

    #[test]
    fn test_recent_lists_are_newest_first() {
        let (store, clock) = store();
        let jack = store.register_user("Jack", "j").unwrap();
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(store.create_question(jack.id, &format!("Q{}", i)).unwrap());
            clock.advance(Duration::minutes(1));
        }
        let recent: Vec<QuestionId> = store.recent_questions("Jack").iter().map(|q| q.id).collect();
        assert_eq!(recent, vec![ids[4], ids[3], ids[2]]);

        let all: Vec<QuestionId> = store.questions().iter().map(|q| q.id).collect();
        assert_eq!(all.first(), Some(&ids[4]));
        assert_eq!(store.questions_of("Jack").first().unwrap().id, ids[0]);
    }

    #[test]
    fn test_notifications_through_store() {
        let (store, clock) = store();
        let asker = store.register_user("Asker", "a").unwrap();
        let helper = store.register_user("Helper", "h").unwrap();
        let q = store.create_question(asker.id, "Why?").unwrap();
        assert!(store.observe(asker.id, q).unwrap());
        assert!(store.is_observing(asker.id, q));

        store.create_answer(q, helper.id, "Because").unwrap();
        let recent = store.very_recent_unread_notification(asker.id).unwrap();
        assert!(store.notification(asker.id, recent.id).is_some());
        assert!(store.notification(helper.id, recent.id).is_none());

        clock.advance(Duration::minutes(10));
        assert!(store.very_recent_unread_notification(asker.id).is_none());

        assert!(store.mark_notification_read(helper.id, recent.id).is_err());
        store.mark_notification_read(asker.id, recent.id).unwrap();
        assert!(store.unread_notifications_for(asker.id).is_empty());
        assert_eq!(store.notifications_for(asker.id).len(), 1);
        assert_eq!(store.watched_questions(asker.id).len(), 1);
    }

    #[test]
    fn test_spammer_through_store() {
        let (store, _) = store();
        let spammer = store.register_user("Spammer", "s").unwrap();
        for i in 0..60 {
            store.create_question(spammer.id, &format!("Buy {}", i)).unwrap();
        }
        assert_eq!(store.items_per_hour("Spammer", store.now()).unwrap(), 60);
        assert!(store.is_spammer("Spammer").unwrap());
        assert!(store.user("Spammer").unwrap().blocked);

        store.unblock_user("Spammer").unwrap();
        assert!(!store.user("Spammer").unwrap().blocked);
        assert!(store.is_cheating("spammer").unwrap());
        assert!(store.is_spammer("Nobody").is_err());
    }

    #[test]
    fn test_anonymize_and_delete_user() {
        let (store, _) = store();
        let jack = store.register_user("Jack", "j").unwrap();
        let jill = store.register_user("Jill", "j").unwrap();
        let q = store.create_question(jack.id, "Mine").unwrap();
        let a = store.create_answer(q, jack.id, "Also mine").unwrap();
        let other = store.create_question(jill.id, "Hers").unwrap();
        store.vote_question(other, jack.id, VoteDirection::Up).unwrap();

        let changed = store
            .anonymize_user("Jack", AnonymizeOptions { answers: true, comments: false })
            .unwrap();
        assert_eq!(changed, 2);
        assert!(store.question(q).unwrap().owner.is_none());
        assert!(store.answer(a).unwrap().owner.is_none());

        store.delete_user("Jack").unwrap();
        assert!(store.user("Jack").is_none());
        // Anonymized posts survive, votes do not
        assert!(store.question(q).is_some());
        assert_eq!(store.rating(VoteTarget::Question(other)), Some(0));
    }

    #[test]
    fn test_clear_and_counts() {
        let (store, _) = store();
        let jack = store.register_user("Jack", "j").unwrap();
        let q = store.create_question(jack.id, "Why?").unwrap();
        store.create_answer(q, jack.id, "Because").unwrap();
        store.set_tags(q, "why").unwrap();
        assert_eq!(store.question_count(), 1);
        assert_eq!(store.answer_count(), 1);
        assert_eq!(store.all_tags().len(), 1);
        assert_eq!(store.tags_with_prefix("w").len(), 1);
        assert!(store.tag("WHY").is_some());

        store.clear();
        assert_eq!(store.user_count(), 0);
        assert_eq!(store.question_count(), 0);
        assert!(store.all_tags().is_empty());
    }
}
