//! QA Core Library
//!
//! This crate provides the in-memory domain store behind a questions and
//! answers site: users, questions, answers, comments, votes, tags and
//! notifications, together with the rules that tie them together.
//!
//! # Architecture
//!
//! - **Arena**: every entity lives in an id-addressed table; links between
//!   entities are typed ids, never references
//! - **Store**: one lock around the arena makes every operation atomic
//!
//! # Quick Start
//!
//! ```text
//! let store = Store::new(Config::default());
//!
//! let douglas = store.register_user("Douglas", "secret")?;
//! let q = store.create_question(douglas.id, "How do lifetimes work?")?;
//! store.set_tags(q, "rust lifetimes")?;
//!
//! let similar = store.similar(q);
//! ```
//!
//! # Modules
//!
//! - `store`: Unified store interface (main entry point)
//! - `models`: Users, questions, answers, comments, votes, tags, notifications
//! - `table`: Id-addressed entity tables
//! - `tags`: Tag name rules and the tag index
//! - `search`: Search and similarity ranking
//! - `abuse`: Spam and vote-cheating heuristics
//! - `config`: Store configuration
//! - `clock`: Time source

pub mod abuse;
pub mod clock;
pub mod config;
mod content;
mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod search;
pub mod store;
pub mod table;
pub mod tags;

pub use abuse::Verdict;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, Rules};
pub use db::AnonymizeOptions;
pub use error::{StoreError, StoreResult};
pub use models::{
    Answer, AnswerRef, Comment, CommentParent, CommentRef, ItemRef, Notification, Profile,
    Question, Tag, User, Vote, VoteDirection, VoteTarget,
};
pub use notify::QuestionEvent;
pub use search::{important_words, Ranked};
pub use store::Store;
pub use table::{AnswerId, CommentId, NotificationId, QuestionId, TableError, TagId, UserId};
