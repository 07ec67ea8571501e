//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use anyhow::{Context, Result};
use serde::Serialize;

use qa_core::{Notification, Question, Tag, User};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// A question as shown to the user
#[derive(Debug, Clone, Serialize)]
pub struct QuestionRow {
    pub id: u64,
    pub owner: Option<String>,
    pub content: String,
    pub tags: Vec<String>,
    pub answers: usize,
    pub rating: i64,
    /// Ranking score, for search and similarity results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<usize>,
}

impl QuestionRow {
    pub fn new(question: &Question, owner: Option<String>, tags: Vec<String>) -> Self {
        Self {
            id: question.id.0,
            owner,
            content: question.content.clone(),
            tags,
            answers: question.count_answers(),
            rating: question.rating(),
            score: None,
        }
    }

    pub fn with_score(mut self, score: usize) -> Self {
        self.score = Some(score);
        self
    }
}

/// A user together with the abuse verdict computed for them
#[derive(Debug, Clone, Serialize)]
pub struct UserRow {
    pub name: String,
    pub moderator: bool,
    pub spammer: bool,
    pub cheater: bool,
    pub blocked: bool,
    pub status_message: Option<String>,
}

impl UserRow {
    pub fn new(user: &User, spammer: bool, cheater: bool) -> Self {
        Self {
            name: user.name.clone(),
            moderator: user.moderator,
            spammer,
            cheater,
            blocked: user.blocked,
            status_message: user.status_message.clone(),
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print any serializable value as pretty JSON
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
        println!("{}", text);
        Ok(())
    }

    /// Print a list of questions
    pub fn print_questions(&self, questions: &[QuestionRow]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if questions.is_empty() {
                    println!("No questions found.");
                    return Ok(());
                }
                for question in questions {
                    let score = question
                        .score
                        .map(|score| format!(" [{}]", score))
                        .unwrap_or_default();
                    println!(
                        "{:>4} | {}{} | {} | {}",
                        question.id,
                        truncate(&question.content, 45),
                        score,
                        question.owner.as_deref().unwrap_or("(anonymous)"),
                        question.tags.join(", ")
                    );
                }
                println!("\n{} question(s)", questions.len());
            }
            OutputFormat::Json => self.json(questions)?,
            OutputFormat::Quiet => {
                for question in questions {
                    println!("{}", question.id);
                }
            }
        }
        Ok(())
    }

    /// Print a list of tags with usage counts
    pub fn print_tags(&self, tags: &[Tag]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if tags.is_empty() {
                    println!("No tags found.");
                    return Ok(());
                }
                for tag in tags {
                    println!("{} ({})", tag.name, tag.count());
                }
                println!("\n{} tag(s)", tags.len());
            }
            OutputFormat::Json => {
                let json_tags: Vec<_> = tags
                    .iter()
                    .map(|tag| serde_json::json!({"name": tag.name, "count": tag.count()}))
                    .collect();
                self.json(&json_tags)?;
            }
            OutputFormat::Quiet => {
                for tag in tags {
                    println!("{}", tag.name);
                }
            }
        }
        Ok(())
    }

    /// Print users with their abuse verdicts
    pub fn print_users(&self, users: &[UserRow]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                for user in users {
                    let verdict = match (user.spammer, user.cheater) {
                        (true, _) => "spammer",
                        (false, true) => "cheater",
                        (false, false) => "ok",
                    };
                    let role = if user.moderator { " (moderator)" } else { "" };
                    println!("{:<12} {:<8}{}", user.name, verdict, role);
                    if let Some(ref message) = user.status_message {
                        println!("             {}", message);
                    }
                }
                println!("\n{} user(s)", users.len());
            }
            OutputFormat::Json => self.json(users)?,
            OutputFormat::Quiet => {
                for user in users.iter().filter(|user| user.blocked) {
                    println!("{}", user.name);
                }
            }
        }
        Ok(())
    }

    /// Print a user's notifications
    pub fn print_notifications(&self, notifications: &[Notification]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if notifications.is_empty() {
                    println!("No notifications.");
                    return Ok(());
                }
                for notification in notifications {
                    let marker = if notification.is_new() { "*" } else { " " };
                    println!(
                        "{} [{}] new answer {} on question {}",
                        marker,
                        notification.created_at.format("%Y-%m-%d %H:%M"),
                        notification.about.answer,
                        notification.about.question
                    );
                }
            }
            OutputFormat::Json => self.json(notifications)?,
            OutputFormat::Quiet => {
                for notification in notifications {
                    println!("{}", notification.id);
                }
            }
        }
        Ok(())
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("ääääääääääää", 5), "ää...");
    }

    #[test]
    fn test_question_row_score_is_optional_in_json() {
        let row = QuestionRow {
            id: 3,
            owner: None,
            content: "Why?".to_string(),
            tags: vec!["why".to_string()],
            answers: 0,
            rating: 0,
            score: None,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert!(json.get("score").is_none());
        let json = serde_json::to_value(row.with_score(2)).unwrap();
        assert_eq!(json["score"], 2);
    }
}
