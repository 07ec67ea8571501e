//! Search and similarity ranking
//!
//! A question scores one point per tag it shares with the query and one more
//! when its content contains the literal search term. Questions scoring zero
//! are never returned, so an untagged question can only ever be found by its
//! text, never by similarity.

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::db::Database;
use crate::table::{QuestionId, TagId, UserId};
use crate::tags::normalize_tag;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("word pattern is valid"));

/// Most keywords [`important_words`] reports
const MAX_KEYWORDS: usize = 4;

/// A question's score against a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranked {
    pub question: QuestionId,
    pub shared_tags: usize,
    pub term_match: bool,
}

impl Ranked {
    pub fn score(&self) -> usize {
        self.shared_tags + usize::from(self.term_match)
    }
}

/// What to rank questions against
struct Query<'a> {
    tags: BTreeSet<TagId>,
    term: Option<String>,
    exclude: Box<dyn Fn(QuestionId) -> bool + 'a>,
}

impl Database {
    fn rank(&self, query: Query<'_>) -> Vec<Ranked> {
        let mut ranked: Vec<Ranked> = self
            .questions
            .values()
            .filter(|question| !(query.exclude)(question.id))
            .map(|question| Ranked {
                question: question.id,
                shared_tags: question
                    .tags
                    .iter()
                    .filter(|tag| query.tags.contains(*tag))
                    .count(),
                term_match: query
                    .term
                    .as_deref()
                    .is_some_and(|term| question.content.to_lowercase().contains(term)),
            })
            .filter(|ranked| ranked.score() > 0)
            .collect();
        ranked.sort_by(|a, b| b.score().cmp(&a.score()).then(a.question.cmp(&b.question)));
        ranked
    }

    /// Questions matching the tags named in `term` or containing it literally
    ///
    /// Tags are looked up per whitespace token first, so names with
    /// punctuation such as `c++` or `.net` match, and then per word.
    pub fn search_for(&self, term: &str) -> Vec<Ranked> {
        let tags = term
            .split_whitespace()
            .chain(NON_WORD.split(term))
            .filter(|token| !token.is_empty())
            .filter_map(|token| self.tags.find(&normalize_tag(token)))
            .map(|tag| tag.id)
            .collect();
        let term = term.trim().to_lowercase();
        self.rank(Query {
            tags,
            term: (!term.is_empty()).then_some(term),
            exclude: Box::new(|_: QuestionId| false),
        })
    }

    /// Questions sharing at least one tag with `question`, best match first
    ///
    /// The question itself is never part of the result.
    pub fn find_similar(&self, question: QuestionId) -> Vec<Ranked> {
        let Some(source) = self.questions.get(question) else {
            return Vec::new();
        };
        self.rank(Query {
            tags: source.tags.iter().copied().collect(),
            term: None,
            exclude: Box::new(move |id: QuestionId| id == question),
        })
    }

    /// Other people's questions that share tags with the user's own questions
    pub fn suggested_questions(&self, user: UserId) -> Vec<Ranked> {
        let Some(account) = self.users.get(user) else {
            return Vec::new();
        };
        let tags = account
            .items
            .questions
            .iter()
            .filter_map(|id| self.questions.get(*id))
            .flat_map(|question| question.tags.iter().copied())
            .collect();
        self.rank(Query {
            tags,
            term: None,
            exclude: Box::new(|id: QuestionId| {
                self.questions
                    .get(id)
                    .map_or(true, |question| question.owner == Some(user))
            }),
        })
    }
}

/// Words longer than three characters that occur more than three times
///
/// Returns at most four words, most frequent first; ties keep the order in
/// which the words first appear. Matching is case-insensitive.
pub fn important_words(text: &str) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for word in text.split_whitespace().map(str::to_lowercase) {
        if word.chars().count() <= 3 {
            continue;
        }
        let count = counts.entry(word.clone()).or_default();
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    let mut keywords: Vec<(String, usize)> = order
        .into_iter()
        .map(|word| {
            let count = counts[&word];
            (word, count)
        })
        .filter(|(_, count)| *count > 3)
        .collect();
    // Stable sort keeps first-appearance order among equal counts
    keywords.sort_by(|a, b| b.1.cmp(&a.1));
    keywords
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(|(word, _)| word)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2010, 12, 1, 10, 0, 0).unwrap()
    }

    fn ids(ranked: &[Ranked]) -> Vec<QuestionId> {
        ranked.iter().map(|r| r.question).collect()
    }

    #[test]
    fn test_similar_ordering() {
        let mut db = Database::new();
        let a = db.register_user("A", "a", now()).unwrap();
        let b = db.register_user("B", "b", now()).unwrap();
        let c = db.register_user("C", "c", now()).unwrap();
        let d = db.register_user("D", "d", now()).unwrap();

        let mut ask = |owner, content: &str, tags: &str| {
            let q = db.register_question(owner, content, now()).unwrap();
            db.set_tags(q, Some(tags)).unwrap();
            q
        };
        let qa = ask(a, "A?", "A B C D");
        let qb = ask(b, "B?", "A B C D");
        let qc = ask(c, "C?", "A B C");
        let qd = ask(d, "D?", "A B");
        let qe = ask(d, "E?", "A");
        let qf = ask(a, "F?", "A B C D");

        let similar = db.find_similar(qa);
        assert_eq!(ids(&similar), vec![qb, qf, qc, qd, qe]);
        assert_eq!(similar[0].score(), 4);
        assert_eq!(similar[4].score(), 1);
    }

    #[test]
    fn test_search_matches_tags_with_punctuation() {
        let mut db = Database::new();
        let user = db.register_user("Jack", "j", now()).unwrap();
        let cpp = db.register_question(user, "Templates?", now()).unwrap();
        db.set_tags(cpp, Some("c++")).unwrap();
        let dotnet = db.register_question(user, "Assemblies?", now()).unwrap();
        db.set_tags(dotnet, Some(".net")).unwrap();

        let ranked = db.search_for("c++");
        assert_eq!(ids(&ranked), vec![cpp]);
        assert_eq!(ranked[0].shared_tags, 1);
        assert!(!ranked[0].term_match);

        assert_eq!(ids(&db.search_for("about .net")), vec![dotnet]);
    }

    #[test]
    fn test_untagged_questions_are_never_similar() {
        let mut db = Database::new();
        let user = db.register_user("Jack", "j", now()).unwrap();
        let tagged = db.register_question(user, "Tagged?", now()).unwrap();
        db.set_tags(tagged, Some("rust")).unwrap();
        let bare = db.register_question(user, "Bare?", now()).unwrap();
        let other_bare = db.register_question(user, "Also bare?", now()).unwrap();

        assert!(db.find_similar(bare).is_empty());
        assert!(db.find_similar(other_bare).is_empty());
        assert!(db.find_similar(tagged).is_empty());
        assert!(db.find_similar(QuestionId(99)).is_empty());
    }

    #[test]
    fn test_search_by_tag_and_text() {
        let mut db = Database::new();
        let user = db.register_user("Jack", "j", now()).unwrap();
        let tagged = db.register_question(user, "Borrow checker woes", now()).unwrap();
        db.set_tags(tagged, Some("rust lifetimes")).unwrap();
        let texty = db.register_question(user, "Is Rust fast?", now()).unwrap();
        let unrelated = db.register_question(user, "Best pasta?", now()).unwrap();

        let result = ids(&db.search_for("rust"));
        assert_eq!(result, vec![tagged, texty]);
        assert!(!result.contains(&unrelated));

        // Both a tag hit and a text hit outrank either alone
        db.set_tags(texty, Some("rust")).unwrap();
        let ranked = db.search_for("rust");
        assert_eq!(ids(&ranked), vec![texty, tagged]);
        assert_eq!(ranked[0].score(), 2);

        assert!(db.search_for("").is_empty());
        assert!(db.search_for("  ").is_empty());
    }

    #[test]
    fn test_search_ignores_unknown_tags() {
        let mut db = Database::new();
        let user = db.register_user("Jack", "j", now()).unwrap();
        let q = db.register_question(user, "Something", now()).unwrap();
        db.set_tags(q, Some("alpha")).unwrap();

        assert!(db.search_for("beta gamma").is_empty());
        assert_eq!(ids(&db.search_for("beta, ALPHA")), vec![q]);
    }

    #[test]
    fn test_suggested_questions_skip_own() {
        let mut db = Database::new();
        let jack = db.register_user("Jack", "j", now()).unwrap();
        let jill = db.register_user("Jill", "j", now()).unwrap();

        let own = db.register_question(jack, "Mine", now()).unwrap();
        db.set_tags(own, Some("rust async")).unwrap();
        let own_other = db.register_question(jack, "Also mine", now()).unwrap();
        db.set_tags(own_other, Some("rust")).unwrap();

        let close = db.register_question(jill, "Close", now()).unwrap();
        db.set_tags(close, Some("rust async")).unwrap();
        let loose = db.register_question(jill, "Loose", now()).unwrap();
        db.set_tags(loose, Some("async")).unwrap();
        let far = db.register_question(jill, "Far", now()).unwrap();
        db.set_tags(far, Some("cooking")).unwrap();

        assert_eq!(ids(&db.suggested_questions(jack)), vec![close, loose]);
        assert!(db.suggested_questions(UserId(42)).is_empty());
    }

    #[test]
    fn test_important_words() {
        let text = "rust rust rust rust the the the the the borrow borrow borrow borrow \
                    cargo cargo cargo cargo cargo tokio tokio tokio tokio \
                    serde serde serde serde rare";
        assert_eq!(important_words(text), vec!["cargo", "rust", "borrow", "tokio"]);
        assert!(important_words("short text only").is_empty());
        assert_eq!(important_words("Word word WORD word"), vec!["word"]);
    }
}
