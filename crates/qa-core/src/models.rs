//! Data models for the Q&A store
//!
//! Every entity lives in an [`EntityTable`] and refers to other entities by
//! id only. Questions own their answers and comments (the child tables sit
//! inside the question), answers own their comments, and votes sit inside the
//! item they were cast on. Users keep typed back-reference sets of what they
//! authored; those sets are bookkeeping, not ownership.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::table::{
    AnswerId, CommentId, Entity, EntityTable, NotificationId, QuestionId, TagId, UserId,
};

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\S+@(?:[A-Za-z0-9-]+\.)+\w{2,4}$").expect("email pattern is valid")
});

static DATE_CH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}\.\d{1,2}\.\d{4}$").expect("date pattern is valid"));
static DATE_US: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").expect("date pattern is valid"));
static DATE_ISO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}$").expect("date pattern is valid"));

/// Hash a password for storage
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Whether `email` looks like a deliverable address
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Parse a birth date written as `dd.mm.yyyy`, `mm/dd/yyyy` or `yyyy-mm-dd`
///
/// Anything else, including impossible dates, yields `None`.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    let format = if DATE_CH.is_match(input) {
        "%d.%m.%Y"
    } else if DATE_US.is_match(input) {
        "%m/%d/%Y"
    } else if DATE_ISO.is_match(input) {
        "%Y-%m-%d"
    } else {
        return None;
    };
    NaiveDate::parse_from_str(input, format).ok()
}

// ==================== References ====================

/// Address of an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnswerRef {
    pub question: QuestionId,
    pub answer: AnswerId,
}

impl AnswerRef {
    pub fn new(question: QuestionId, answer: AnswerId) -> Self {
        Self { question, answer }
    }
}

/// What a comment is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CommentParent {
    Question(QuestionId),
    Answer(AnswerRef),
}

impl CommentParent {
    /// The question the parent belongs to
    pub fn question(&self) -> QuestionId {
        match self {
            CommentParent::Question(id) => *id,
            CommentParent::Answer(answer) => answer.question,
        }
    }
}

/// Address of a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommentRef {
    pub parent: CommentParent,
    pub comment: CommentId,
}

/// Something that can be voted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VoteTarget {
    Question(QuestionId),
    Answer(AnswerRef),
}

/// Any ownable, timestamped piece of content
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemRef {
    Question(QuestionId),
    Answer(AnswerRef),
    Comment(CommentRef),
    Vote { voter: UserId, target: VoteTarget },
}

// ==================== Users ====================

/// Optional profile information
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Profile {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub website: Option<String>,
    pub profession: Option<String>,
    pub employer: Option<String>,
    pub biography: Option<String>,
}

impl Profile {
    /// Age in whole years at `now`, or 0 without a birth date
    pub fn age(&self, now: DateTime<Utc>) -> u32 {
        let Some(born) = self.date_of_birth else {
            return 0;
        };
        let today = now.date_naive();
        let mut years = today.year() - born.year();
        if (today.month(), today.day()) < (born.month(), born.day()) {
            years -= 1;
        }
        years.max(0) as u32
    }
}

/// Typed back-references to everything a user has authored
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserItems {
    pub questions: BTreeSet<QuestionId>,
    pub answers: BTreeSet<AnswerRef>,
    pub comments: BTreeSet<CommentRef>,
    pub votes: BTreeSet<VoteTarget>,
    pub notifications: BTreeSet<NotificationId>,
}

/// A registered user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: UserId,
    /// Display name; unique when compared case-insensitively
    pub name: String,
    #[serde(skip)]
    password_hash: String,
    pub profile: Profile,
    pub moderator: bool,
    pub blocked: bool,
    /// Why the user was blocked
    pub status_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub(crate) items: UserItems,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>, password: &str, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            password_hash: hash_password(password),
            profile: Profile::default(),
            moderator: false,
            blocked: false,
            status_message: None,
            created_at: now,
            items: UserItems::default(),
        }
    }

    pub fn check_password(&self, password: &str) -> bool {
        self.password_hash == hash_password(password)
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    /// Everything this user currently owns
    pub fn items(&self) -> &UserItems {
        &self.items
    }

    pub fn block(&mut self, message: impl Into<String>) {
        self.blocked = true;
        self.status_message = Some(message.into());
    }

    pub fn unblock(&mut self) {
        self.blocked = false;
        self.status_message = None;
    }
}

impl Entity for User {
    type Key = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}

// ==================== Votes ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

/// A single user's vote on an item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vote {
    pub voter: UserId,
    pub target: VoteTarget,
    pub direction: VoteDirection,
    pub cast_at: DateTime<Utc>,
}

impl Vote {
    pub fn is_up(&self) -> bool {
        self.direction == VoteDirection::Up
    }
}

/// Votes on one item, at most one per voter
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Votes(BTreeMap<UserId, Vote>);

impl Votes {
    /// Record a vote, replacing the voter's previous one on this item
    pub fn cast(&mut self, vote: Vote) -> Option<Vote> {
        self.0.insert(vote.voter, vote)
    }

    pub fn retract(&mut self, voter: UserId) -> Option<Vote> {
        self.0.remove(&voter)
    }

    pub fn get(&self, voter: UserId) -> Option<&Vote> {
        self.0.get(&voter)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vote> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Up votes minus down votes
    pub fn rating(&self) -> i64 {
        self.0
            .values()
            .map(|vote| if vote.is_up() { 1 } else { -1 })
            .sum()
    }

    pub(crate) fn take(&mut self) -> Vec<Vote> {
        std::mem::take(&mut self.0).into_values().collect()
    }
}

// ==================== Content ====================

/// The accepted answer of a question and when it was chosen
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BestAnswer {
    /// `None` once the chosen answer has been deleted
    pub answer: Option<AnswerId>,
    pub set_at: DateTime<Utc>,
}

/// A question with its answers, comments, tags and subscribers
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: QuestionId,
    /// `None` once the author has been anonymized
    pub owner: Option<UserId>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub(crate) answers: EntityTable<Answer>,
    pub(crate) comments: EntityTable<Comment>,
    /// Sorted alphabetically by tag name
    pub(crate) tags: Vec<TagId>,
    pub(crate) best_answer: Option<BestAnswer>,
    pub locked: bool,
    pub(crate) observers: BTreeSet<UserId>,
    pub votes: Votes,
}

impl Question {
    pub fn new(id: QuestionId, owner: UserId, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner: Some(owner),
            content: content.into(),
            created_at: now,
            answers: EntityTable::new(),
            comments: EntityTable::new(),
            tags: Vec::new(),
            best_answer: None,
            locked: false,
            observers: BTreeSet::new(),
            votes: Votes::default(),
        }
    }

    pub fn answer(&self, id: AnswerId) -> Option<&Answer> {
        self.answers.get(id)
    }

    pub fn comment(&self, id: CommentId) -> Option<&Comment> {
        self.comments.get(id)
    }

    /// Answers, oldest first
    pub fn answers(&self) -> Vec<&Answer> {
        let mut answers: Vec<&Answer> = self.answers.values().collect();
        answers.sort_by_key(|answer| (answer.created_at, answer.id));
        answers
    }

    /// Comments on the question itself, oldest first
    pub fn comments(&self) -> Vec<&Comment> {
        let mut comments: Vec<&Comment> = self.comments.values().collect();
        comments.sort_by_key(|comment| (comment.created_at, comment.id));
        comments
    }

    pub fn count_answers(&self) -> usize {
        self.answers.size()
    }

    pub fn tag_ids(&self) -> &[TagId] {
        &self.tags
    }

    pub fn has_tags(&self) -> bool {
        !self.tags.is_empty()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Locked questions should not receive new answers or comments
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn observers(&self) -> &BTreeSet<UserId> {
        &self.observers
    }

    pub fn add_observer(&mut self, user: UserId) -> bool {
        self.observers.insert(user)
    }

    pub fn remove_observer(&mut self, user: UserId) -> bool {
        self.observers.remove(&user)
    }

    pub fn has_observer(&self, user: UserId) -> bool {
        self.observers.contains(&user)
    }

    pub fn best_answer(&self) -> Option<AnswerId> {
        self.best_answer.and_then(|best| best.answer)
    }

    pub fn has_best_answer(&self) -> bool {
        self.best_answer().is_some()
    }

    /// A best answer can be chosen if none was ever chosen, or if the last
    /// choice lies more than `window` before `now`.
    pub fn is_best_answer_settable(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.best_answer {
            None => true,
            Some(best) => now.signed_duration_since(best.set_at) > window,
        }
    }

    /// Choose the best answer, returning whether the choice was accepted
    pub fn set_best_answer(&mut self, answer: AnswerId, now: DateTime<Utc>, window: Duration) -> bool {
        if !self.is_best_answer_settable(now, window) {
            return false;
        }
        self.best_answer = Some(BestAnswer {
            answer: Some(answer),
            set_at: now,
        });
        true
    }

    /// Forget a deleted best answer while keeping the time it was chosen
    pub(crate) fn clear_best_answer_if(&mut self, answer: AnswerId) {
        if let Some(best) = self.best_answer.as_mut() {
            if best.answer == Some(answer) {
                best.answer = None;
            }
        }
    }

    pub fn rating(&self) -> i64 {
        self.votes.rating()
    }
}

impl Entity for Question {
    type Key = QuestionId;

    fn id(&self) -> QuestionId {
        self.id
    }
}

/// An answer to a question
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub id: AnswerId,
    pub question: QuestionId,
    pub owner: Option<UserId>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub(crate) comments: EntityTable<Comment>,
    pub votes: Votes,
    /// Notifications that point at this answer
    pub(crate) notifications: BTreeSet<NotificationId>,
}

impl Answer {
    pub fn new(
        id: AnswerId,
        question: QuestionId,
        owner: UserId,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            question,
            owner: Some(owner),
            content: content.into(),
            created_at: now,
            comments: EntityTable::new(),
            votes: Votes::default(),
            notifications: BTreeSet::new(),
        }
    }

    pub fn reference(&self) -> AnswerRef {
        AnswerRef::new(self.question, self.id)
    }

    pub fn comment(&self, id: CommentId) -> Option<&Comment> {
        self.comments.get(id)
    }

    /// Comments on this answer, oldest first
    pub fn comments(&self) -> Vec<&Comment> {
        let mut comments: Vec<&Comment> = self.comments.values().collect();
        comments.sort_by_key(|comment| (comment.created_at, comment.id));
        comments
    }

    pub fn rating(&self) -> i64 {
        self.votes.rating()
    }

    pub fn is_high_rated(&self, threshold: i64) -> bool {
        self.rating() >= threshold
    }
}

impl Entity for Answer {
    type Key = AnswerId;

    fn id(&self) -> AnswerId {
        self.id
    }
}

/// A comment on a question or an answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub parent: CommentParent,
    pub owner: Option<UserId>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(
        id: CommentId,
        parent: CommentParent,
        owner: UserId,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            parent,
            owner: Some(owner),
            content: content.into(),
            created_at: now,
        }
    }

    pub fn reference(&self) -> CommentRef {
        CommentRef {
            parent: self.parent,
            comment: self.id,
        }
    }
}

impl Entity for Comment {
    type Key = CommentId;

    fn id(&self) -> CommentId {
        self.id
    }
}

// ==================== Tags ====================

/// A normalized tag and the questions currently carrying it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub(crate) questions: BTreeSet<QuestionId>,
}

impl Tag {
    pub fn new(id: TagId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            questions: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn questions(&self) -> &BTreeSet<QuestionId> {
        &self.questions
    }

    pub fn count(&self) -> usize {
        self.questions.len()
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Entity for Tag {
    type Key = TagId;

    fn id(&self) -> TagId {
        self.id
    }
}

// ==================== Notifications ====================

/// Tells a user that someone answered a question they observe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    /// Recipient
    pub owner: UserId,
    pub about: AnswerRef,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl Notification {
    pub fn new(id: NotificationId, owner: UserId, about: AnswerRef, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner,
            about,
            created_at: now,
            read: false,
        }
    }

    /// Unread
    pub fn is_new(&self) -> bool {
        !self.read
    }

    pub fn is_very_recent(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.created_at < window
    }
}

impl Entity for Notification {
    type Key = NotificationId;

    fn id(&self) -> NotificationId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2010, 12, 1, 10, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn test_password_hash() {
        let user = User::new(UserId(1), "Bill", "bill", at(0));
        assert!(user.check_password("bill"));
        assert!(!user.check_password("Bill"));
        assert_eq!(user.password_hash(), hash_password("bill"));
        assert_eq!(
            hash_password(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(hash_password("password"), hash_password("Password"));
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("john@gmx.com"));
        assert!(is_valid_email("john.smith@students.unibe.ch"));
        assert!(!is_valid_email("john@gmx.c"));
        assert!(!is_valid_email("john@info.museum"));
        assert!(!is_valid_email("john@...com"));
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(1987, 9, 14).unwrap();
        assert_eq!(parse_date("14.9.1987"), Some(expected));
        assert_eq!(parse_date("09/14/1987"), Some(expected));
        assert_eq!(parse_date("1987-09-14"), Some(expected));
        assert_eq!(parse_date("14 Sep 1987"), None);
        assert_eq!(parse_date("31.02.1987"), None);
    }

    #[test]
    fn test_profile_age() {
        let mut profile = Profile::default();
        assert_eq!(profile.age(at(0)), 0);

        profile.date_of_birth = parse_date("14.9.1987");
        assert_eq!(profile.age(at(0)), 23);

        let day_before = Utc.with_ymd_and_hms(2010, 9, 13, 0, 0, 0).unwrap();
        assert_eq!(profile.age(day_before), 22);
    }

    #[test]
    fn test_block_and_unblock() {
        let mut user = User::new(UserId(1), "Jack", "jack", at(0));
        user.block("too many posts");
        assert!(user.blocked);
        assert_eq!(user.status_message.as_deref(), Some("too many posts"));
        user.unblock();
        assert!(!user.blocked);
        assert!(user.status_message.is_none());
    }

    #[test]
    fn test_votes_replace_per_voter() {
        let target = VoteTarget::Question(QuestionId(1));
        let mut votes = Votes::default();
        let vote = |voter, direction| Vote {
            voter: UserId(voter),
            target,
            direction,
            cast_at: at(0),
        };

        assert!(votes.cast(vote(1, VoteDirection::Up)).is_none());
        votes.cast(vote(2, VoteDirection::Up));
        assert_eq!(votes.rating(), 2);

        let previous = votes.cast(vote(1, VoteDirection::Down)).unwrap();
        assert!(previous.is_up());
        assert_eq!(votes.len(), 2);
        assert_eq!(votes.rating(), 0);

        votes.retract(UserId(2));
        assert_eq!(votes.rating(), -1);
    }

    #[test]
    fn test_best_answer_ratchet() {
        let window = Duration::minutes(30);
        let mut question = Question::new(QuestionId(1), UserId(1), "Why?", at(0));
        assert!(question.is_best_answer_settable(at(0), window));

        assert!(question.set_best_answer(AnswerId(1), at(0), window));
        assert!(!question.set_best_answer(AnswerId(2), at(29), window));
        assert!(!question.set_best_answer(AnswerId(2), at(30), window));
        assert_eq!(question.best_answer(), Some(AnswerId(1)));

        assert!(question.set_best_answer(AnswerId(2), at(31), window));
        assert_eq!(question.best_answer(), Some(AnswerId(2)));
    }

    #[test]
    fn test_best_answer_extreme_times_and_windows() {
        let mut question = Question::new(QuestionId(1), UserId(1), "Why?", at(0));
        assert!(question.set_best_answer(AnswerId(1), DateTime::<Utc>::MIN_UTC, Duration::MAX));
        assert!(!question.set_best_answer(AnswerId(2), DateTime::<Utc>::MAX_UTC, Duration::MAX));
        assert!(!question.set_best_answer(AnswerId(2), DateTime::<Utc>::MIN_UTC, Duration::zero()));
        assert!(question.set_best_answer(AnswerId(2), at(0), Duration::zero()));
        assert_eq!(question.best_answer(), Some(AnswerId(2)));
    }

    #[test]
    fn test_cleared_best_answer_keeps_window() {
        let window = Duration::minutes(30);
        let mut question = Question::new(QuestionId(1), UserId(1), "Why?", at(0));
        question.set_best_answer(AnswerId(1), at(0), window);
        question.clear_best_answer_if(AnswerId(1));

        assert!(!question.has_best_answer());
        assert!(!question.is_best_answer_settable(at(10), window));
    }

    #[test]
    fn test_observers_are_a_set() {
        let mut question = Question::new(QuestionId(1), UserId(1), "Why?", at(0));
        assert!(question.add_observer(UserId(2)));
        assert!(!question.add_observer(UserId(2)));
        assert!(question.has_observer(UserId(2)));
        assert_eq!(question.observers().len(), 1);
        assert!(question.remove_observer(UserId(2)));
        assert!(!question.has_observer(UserId(2)));
    }

    #[test]
    fn test_lock_toggle() {
        let mut question = Question::new(QuestionId(1), UserId(1), "Why?", at(0));
        assert!(!question.is_locked());
        question.lock();
        assert!(question.is_locked());
        question.unlock();
        assert!(!question.is_locked());
    }

    #[test]
    fn test_notification_recency() {
        let window = Duration::minutes(5);
        let notification =
            Notification::new(NotificationId(1), UserId(1), AnswerRef::new(QuestionId(1), AnswerId(1)), at(0));
        assert!(notification.is_new());
        assert!(notification.is_very_recent(at(4), window));
        assert!(!notification.is_very_recent(at(5), window));
    }

    #[test]
    fn test_question_serialization() {
        let question = Question::new(QuestionId(3), UserId(1), "Why?", at(0));
        let json = serde_json::to_value(&question).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["content"], "Why?");
        assert_eq!(json["locked"], false);
    }

    #[test]
    fn test_user_serialization_skips_password() {
        let user = User::new(UserId(1), "Jack", "secret", at(0));
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("Jack"));
        assert!(!json.contains(&hash_password("secret")));
    }
}
