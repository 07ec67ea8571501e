//! Spam and vote-cheating heuristics
//!
//! Verdicts are recomputed from the current state on every call. A positive
//! verdict blocks the user; lifting the block is a separate, explicit action.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::config::Rules;
use crate::db::Database;
use crate::error::StoreResult;
use crate::models::User;
use crate::table::UserId;

/// Why a user was flagged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Spammer { items_last_hour: usize },
    Cheater { favoured_votes: usize, up_votes: usize },
}

impl Verdict {
    pub fn status_message(&self) -> String {
        match self {
            Verdict::Spammer { items_last_hour } => format!(
                "Blocked for spamming: {} posts and votes within one hour",
                items_last_hour
            ),
            Verdict::Cheater {
                favoured_votes,
                up_votes,
            } => format!(
                "Blocked for vote cheating: {} of {} up votes went to the same user",
                favoured_votes, up_votes
            ),
        }
    }
}

impl Database {
    /// Timestamps of everything the user posted or voted
    fn activity(&self, user: &User) -> Vec<DateTime<Utc>> {
        let items = &user.items;
        let questions = items
            .questions
            .iter()
            .filter_map(|id| self.questions.get(*id))
            .map(|question| question.created_at);
        let answers = items
            .answers
            .iter()
            .filter_map(|reference| self.answer(*reference))
            .map(|answer| answer.created_at);
        let comments = items
            .comments
            .iter()
            .filter_map(|reference| self.comment(*reference))
            .map(|comment| comment.created_at);
        let votes = items
            .votes
            .iter()
            .filter_map(|target| self.votes_on(*target)?.get(user.id))
            .map(|vote| vote.cast_at);

        questions.chain(answers).chain(comments).chain(votes).collect()
    }

    /// Number of items the user created within the hour before `now`
    pub fn items_per_hour(&self, user: UserId, now: DateTime<Utc>) -> StoreResult<usize> {
        let user = self.require_user(user)?;
        let hour = Duration::minutes(60);
        Ok(self
            .activity(user)
            .into_iter()
            .map(|timestamp| now - timestamp)
            .filter(|age| *age >= Duration::zero() && *age <= hour)
            .count())
    }

    /// Up votes cast by the user, grouped by the owner of the voted item
    fn up_votes_by_owner(&self, user: &User) -> (HashMap<UserId, usize>, usize) {
        let mut by_owner: HashMap<UserId, usize> = HashMap::new();
        let mut total = 0;
        for target in &user.items.votes {
            let is_up = self
                .votes_on(*target)
                .and_then(|votes| votes.get(user.id))
                .is_some_and(|vote| vote.is_up());
            if !is_up {
                continue;
            }
            total += 1;
            if let Some(owner) = self.vote_target_owner(*target) {
                *by_owner.entry(owner).or_default() += 1;
            }
        }
        (by_owner, total)
    }

    fn spam_verdict(&self, user: UserId, now: DateTime<Utc>, rules: &Rules) -> StoreResult<Option<Verdict>> {
        let items_last_hour = self.items_per_hour(user, now)?;
        Ok((items_last_hour >= rules.spam_items_per_hour)
            .then_some(Verdict::Spammer { items_last_hour }))
    }

    fn cheat_verdict(&self, user: UserId, rules: &Rules) -> StoreResult<Option<Verdict>> {
        let account = self.require_user(user)?;
        let (by_owner, up_votes) = self.up_votes_by_owner(account);
        let favoured_votes = by_owner.values().copied().max().unwrap_or(0);
        let flagged = favoured_votes > rules.cheater_min_votes && favoured_votes * 2 > up_votes;
        Ok(flagged.then_some(Verdict::Cheater {
            favoured_votes,
            up_votes,
        }))
    }

    fn apply_verdict(&mut self, user: UserId, verdict: Option<Verdict>) -> bool {
        let Some(verdict) = verdict else {
            return false;
        };
        if let Some(account) = self.users.get_mut(user) {
            warn!(user = %account.name, ?verdict, "Blocking user");
            account.block(verdict.status_message());
        }
        true
    }

    /// Posting rate at or above the hourly limit; blocks the user when true
    pub fn is_spammer(&mut self, user: UserId, now: DateTime<Utc>, rules: &Rules) -> StoreResult<bool> {
        let verdict = self.spam_verdict(user, now, rules)?;
        Ok(self.apply_verdict(user, verdict))
    }

    /// Up votes concentrated on one other user; blocks the user when true
    pub fn is_maybe_cheater(&mut self, user: UserId, rules: &Rules) -> StoreResult<bool> {
        let verdict = self.cheat_verdict(user, rules)?;
        Ok(self.apply_verdict(user, verdict))
    }

    pub fn is_cheating(&mut self, user: UserId, now: DateTime<Utc>, rules: &Rules) -> StoreResult<bool> {
        Ok(self.is_spammer(user, now, rules)? || self.is_maybe_cheater(user, rules)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{VoteDirection, VoteTarget};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2010, 12, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_items_per_hour_counts_all_kinds() {
        let mut db = Database::new();
        let jack = db.register_user("Jack", "jack", now()).unwrap();
        let john = db.register_user("John", "john", now()).unwrap();
        let q = db.register_question(john, "Why?", now()).unwrap();

        db.register_question(jack, "Old", now() - Duration::minutes(61)).unwrap();
        db.register_question(jack, "Edge", now() - Duration::minutes(60)).unwrap();
        let a = db.post_answer(q, jack, "Because", now()).unwrap();
        db.post_comment(crate::models::CommentParent::Answer(a), jack, "!", now())
            .unwrap();
        db.cast_vote(VoteTarget::Question(q), jack, VoteDirection::Up, now())
            .unwrap();

        assert_eq!(db.items_per_hour(jack, now()).unwrap(), 4);
    }

    #[test]
    fn test_spammer_threshold() {
        let rules = Rules::default();
        let mut db = Database::new();
        let spammer = db.register_user("Spammer", "spam", now()).unwrap();
        for i in 0..59 {
            db.register_question(spammer, format!("Question {}", i), now()).unwrap();
        }
        assert!(!db.is_spammer(spammer, now(), &rules).unwrap());
        assert!(!db.users.get(spammer).unwrap().blocked);

        db.register_question(spammer, "One more", now()).unwrap();
        assert!(db.is_spammer(spammer, now(), &rules).unwrap());
        let account = db.users.get(spammer).unwrap();
        assert!(account.blocked);
        assert!(account.status_message.as_deref().unwrap().contains("spamming"));
    }

    #[test]
    fn test_cheater_concentration() {
        let rules = Rules::default();
        let mut db = Database::new();
        let favourite = db.register_user("Favourite", "f", now()).unwrap();
        let voter = db.register_user("Voter", "v", now()).unwrap();

        for i in 0..4 {
            let q = db.register_question(favourite, format!("Q{}", i), now()).unwrap();
            db.cast_vote(VoteTarget::Question(q), voter, VoteDirection::Up, now())
                .unwrap();
        }
        assert!(db.is_maybe_cheater(voter, &rules).unwrap());
        assert!(db.users.get(voter).unwrap().blocked);
        assert!(!db.is_maybe_cheater(favourite, &rules).unwrap());

        // Spreading votes evenly removes the majority
        let mut fair = Database::new();
        let a = fair.register_user("A", "a", now()).unwrap();
        let b = fair.register_user("B", "b", now()).unwrap();
        let v = fair.register_user("V", "v", now()).unwrap();
        for owner in [a, a, b, b] {
            let q = fair.register_question(owner, "Q", now()).unwrap();
            fair.cast_vote(VoteTarget::Question(q), v, VoteDirection::Up, now())
                .unwrap();
        }
        assert!(!fair.is_maybe_cheater(v, &rules).unwrap());
    }

    #[test]
    fn test_down_votes_do_not_count_as_support() {
        let rules = Rules::default();
        let mut db = Database::new();
        let target = db.register_user("Target", "t", now()).unwrap();
        let voter = db.register_user("Voter", "v", now()).unwrap();
        for i in 0..5 {
            let q = db.register_question(target, format!("Q{}", i), now()).unwrap();
            db.cast_vote(VoteTarget::Question(q), voter, VoteDirection::Down, now())
                .unwrap();
        }
        assert!(!db.is_cheating(voter, now(), &rules).unwrap());
    }

    #[test]
    fn test_unknown_user() {
        let rules = Rules::default();
        let mut db = Database::new();
        assert!(db.is_spammer(UserId(77), now(), &rules).is_err());
    }
}
