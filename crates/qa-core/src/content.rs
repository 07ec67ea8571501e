//! Question, answer, comment and vote lifecycle
//!
//! Deleting content cascades: a question takes its answers, comments, votes,
//! tag links and observer set with it; an answer takes its comments, votes
//! and the notifications pointing at it. Children are always released before
//! the parent detaches from the shared indices (owner, tags) and leaves its
//! table.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    Answer, AnswerRef, Comment, CommentParent, CommentRef, ItemRef, Question, UserItems, Vote,
    VoteDirection, VoteTarget, Votes,
};
use crate::notify::QuestionEvent;
use crate::table::{EntityTable, QuestionId, TagId, UserId};

impl Database {
    // ==================== Lookups ====================

    pub fn answer(&self, reference: AnswerRef) -> Option<&Answer> {
        self.questions
            .get(reference.question)?
            .answers
            .get(reference.answer)
    }

    pub fn answer_mut(&mut self, reference: AnswerRef) -> Option<&mut Answer> {
        self.questions
            .get_mut(reference.question)?
            .answers
            .get_mut(reference.answer)
    }

    fn comment_table(&self, parent: CommentParent) -> Option<&EntityTable<Comment>> {
        match parent {
            CommentParent::Question(id) => Some(&self.questions.get(id)?.comments),
            CommentParent::Answer(answer) => Some(&self.answer(answer)?.comments),
        }
    }

    fn comment_table_mut(&mut self, parent: CommentParent) -> Option<&mut EntityTable<Comment>> {
        match parent {
            CommentParent::Question(id) => Some(&mut self.questions.get_mut(id)?.comments),
            CommentParent::Answer(answer) => Some(&mut self.answer_mut(answer)?.comments),
        }
    }

    pub fn comment(&self, reference: CommentRef) -> Option<&Comment> {
        self.comment_table(reference.parent)?.get(reference.comment)
    }

    pub fn comment_mut(&mut self, reference: CommentRef) -> Option<&mut Comment> {
        self.comment_table_mut(reference.parent)?
            .get_mut(reference.comment)
    }

    pub fn votes_on(&self, target: VoteTarget) -> Option<&Votes> {
        match target {
            VoteTarget::Question(id) => Some(&self.questions.get(id)?.votes),
            VoteTarget::Answer(answer) => Some(&self.answer(answer)?.votes),
        }
    }

    fn votes_on_mut(&mut self, target: VoteTarget) -> Option<&mut Votes> {
        match target {
            VoteTarget::Question(id) => Some(&mut self.questions.get_mut(id)?.votes),
            VoteTarget::Answer(answer) => Some(&mut self.answer_mut(answer)?.votes),
        }
    }

    /// Owner of the item a vote was cast on
    pub fn vote_target_owner(&self, target: VoteTarget) -> Option<UserId> {
        match target {
            VoteTarget::Question(id) => self.questions.get(id)?.owner,
            VoteTarget::Answer(answer) => self.answer(answer)?.owner,
        }
    }

    fn detach_owner(&mut self, owner: Option<UserId>, detach: impl FnOnce(&mut UserItems)) {
        if let Some(user) = owner.and_then(|id| self.users.get_mut(id)) {
            detach(&mut user.items);
        }
    }

    // ==================== Creation ====================

    pub fn register_question(
        &mut self,
        owner: UserId,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<QuestionId> {
        self.require_user(owner)?;
        let id = self
            .questions
            .add_new(|id| Question::new(id, owner, content, now));
        if let Some(user) = self.users.get_mut(owner) {
            user.items.questions.insert(id);
        }
        debug!(question = %id, owner = %owner, "Registered question");
        Ok(id)
    }

    /// Post an answer and notify the question's observers
    pub fn post_answer(
        &mut self,
        question: QuestionId,
        owner: UserId,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<AnswerRef> {
        self.require_user(owner)?;
        let id = self
            .require_question_mut(question)?
            .answers
            .add_new(|id| Answer::new(id, question, owner, content, now));
        let reference = AnswerRef::new(question, id);
        if let Some(user) = self.users.get_mut(owner) {
            user.items.answers.insert(reference);
        }
        debug!(question = %question, answer = %id, owner = %owner, "Posted answer");

        self.notify_observers(question, QuestionEvent::AnswerPosted(reference), now);
        Ok(reference)
    }

    pub fn post_comment(
        &mut self,
        parent: CommentParent,
        owner: UserId,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<CommentRef> {
        self.require_user(owner)?;
        let table = self
            .comment_table_mut(parent)
            .ok_or_else(|| StoreError::not_found(format!("comment parent {:?}", parent)))?;
        let id = table.add_new(|id| Comment::new(id, parent, owner, content, now));
        let reference = CommentRef {
            parent,
            comment: id,
        };
        if let Some(user) = self.users.get_mut(owner) {
            user.items.comments.insert(reference);
        }
        debug!(parent = ?parent, comment = %id, "Posted comment");
        Ok(reference)
    }

    // ==================== Mutation ====================

    /// Replace the question's tags with those parsed from `raw`
    pub fn set_tags(&mut self, question: QuestionId, raw: Option<&str>) -> StoreResult<Vec<TagId>> {
        let previous = self.require_question(question)?.tags.clone();
        let next = self.tags.retag(question, &previous, raw);
        self.require_question_mut(question)?.tags = next.clone();
        debug!(question = %question, tags = ?self.tags.names(&next), "Replaced tags");
        Ok(next)
    }

    /// Record a vote; a second vote by the same user on the same item replaces the first
    pub fn cast_vote(
        &mut self,
        target: VoteTarget,
        voter: UserId,
        direction: VoteDirection,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.require_user(voter)?;
        let votes = self
            .votes_on_mut(target)
            .ok_or_else(|| StoreError::not_found(format!("vote target {:?}", target)))?;
        let replaced = votes.cast(Vote {
            voter,
            target,
            direction,
            cast_at: now,
        });
        if let Some(user) = self.users.get_mut(voter) {
            user.items.votes.insert(target);
        }
        debug!(item = ?target, voter = %voter, ?direction, replaced = replaced.is_some(), "Cast vote");
        Ok(())
    }

    pub fn retract_vote(&mut self, target: VoteTarget, voter: UserId) -> bool {
        let removed = self
            .votes_on_mut(target)
            .and_then(|votes| votes.retract(voter))
            .is_some();
        if let Some(user) = self.users.get_mut(voter) {
            user.items.votes.remove(&target);
        }
        removed
    }

    /// Choose the best answer; `Ok(false)` when the re-selection window is still closed
    pub fn set_best_answer(
        &mut self,
        reference: AnswerRef,
        now: DateTime<Utc>,
        window: Duration,
    ) -> StoreResult<bool> {
        let question = self.require_question_mut(reference.question)?;
        if question.answer(reference.answer).is_none() {
            return Err(StoreError::not_found(format!(
                "answer {} on question {}",
                reference.answer, reference.question
            )));
        }
        let accepted = question.set_best_answer(reference.answer, now, window);
        if accepted {
            info!(question = %reference.question, answer = %reference.answer, "Set best answer");
        } else {
            debug!(question = %reference.question, "Best answer re-selection refused");
        }
        Ok(accepted)
    }

    pub fn edit_content(&mut self, target: ItemRef, content: String) -> StoreResult<()> {
        let slot = match target {
            ItemRef::Question(id) => self.questions.get_mut(id).map(|q| &mut q.content),
            ItemRef::Answer(answer) => self.answer_mut(answer).map(|a| &mut a.content),
            ItemRef::Comment(comment) => self.comment_mut(comment).map(|c| &mut c.content),
            ItemRef::Vote { .. } => {
                return Err(StoreError::Validation {
                    field: "target",
                    reason: "votes have no content".to_string(),
                })
            }
        };
        let slot = slot.ok_or_else(|| StoreError::not_found(format!("{:?}", target)))?;
        *slot = content;
        Ok(())
    }

    // ==================== Cascading delete ====================

    /// Delete a question with everything hanging off it
    pub fn unregister_question(&mut self, id: QuestionId) -> bool {
        // Swap in empty child tables first so the question never exposes a
        // partially cleared collection.
        let Some(question) = self.questions.get_mut(id) else {
            return false;
        };
        let answers = question.answers.drain();
        let comments = question.comments.drain();

        let (answer_count, comment_count) = (answers.len(), comments.len());
        for answer in answers {
            self.release_answer(answer);
        }
        for comment in comments {
            self.release_comment(comment);
        }

        let (votes, owner, tags) = match self.questions.get_mut(id) {
            Some(question) => {
                question.observers.clear();
                (
                    question.votes.take(),
                    question.owner,
                    std::mem::take(&mut question.tags),
                )
            }
            None => return false,
        };
        self.release_votes(votes);
        self.detach_owner(owner, |items| {
            items.questions.remove(&id);
        });
        self.tags.detach(id, &tags);
        self.questions.remove(id);

        info!(
            question = %id,
            answers = answer_count,
            comments = comment_count,
            "Deleted question"
        );
        true
    }

    pub fn unregister_answer(&mut self, reference: AnswerRef) -> bool {
        let removed = self
            .questions
            .get_mut(reference.question)
            .and_then(|question| question.answers.remove(reference.answer));
        match removed {
            Some(answer) => {
                self.release_answer(answer);
                debug!(question = %reference.question, answer = %reference.answer, "Deleted answer");
                true
            }
            None => false,
        }
    }

    pub fn unregister_comment(&mut self, reference: CommentRef) -> bool {
        let removed = self
            .comment_table_mut(reference.parent)
            .and_then(|table| table.remove(reference.comment));
        match removed {
            Some(comment) => {
                self.release_comment(comment);
                true
            }
            None => false,
        }
    }

    /// Release everything a detached answer still references
    fn release_answer(&mut self, answer: Answer) {
        let reference = answer.reference();
        let Answer {
            mut comments,
            mut votes,
            notifications,
            owner,
            ..
        } = answer;

        for comment in comments.drain() {
            self.release_comment(comment);
        }
        self.release_votes(votes.take());
        for notification in notifications {
            self.unregister_notification(notification);
        }
        self.detach_owner(owner, |items| {
            items.answers.remove(&reference);
        });
        if let Some(question) = self.questions.get_mut(reference.question) {
            question.clear_best_answer_if(reference.answer);
        }
    }

    fn release_comment(&mut self, comment: Comment) {
        let reference = comment.reference();
        self.detach_owner(comment.owner, |items| {
            items.comments.remove(&reference);
        });
    }

    fn release_votes(&mut self, votes: Vec<Vote>) {
        for vote in votes {
            self.detach_owner(Some(vote.voter), |items| {
                items.votes.remove(&vote.target);
            });
        }
    }
}
