//! Question command handlers

use anyhow::{bail, Result};

use qa_core::{important_words, Question, QuestionId, Store};

use crate::output::{Output, OutputFormat, QuestionRow};

fn row(store: &Store, question: &Question) -> QuestionRow {
    let owner = question
        .owner
        .and_then(|id| store.user_by_id(id))
        .map(|user| user.name);
    let tags = store.question_tags(question.id).unwrap_or_default();
    QuestionRow::new(question, owner, tags)
}

fn owner_name(store: &Store, owner: Option<qa_core::UserId>) -> String {
    owner
        .and_then(|id| store.user_by_id(id))
        .map(|user| user.name)
        .unwrap_or_else(|| "(anonymous)".to_string())
}

/// List questions, newest first
pub fn list(store: &Store, tag: Option<String>, output: &Output) -> Result<()> {
    let questions = match tag {
        Some(tag) => {
            let mut tagged = store.questions_tagged(&tag);
            tagged.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            tagged
        }
        None => store.questions(),
    };
    let rows: Vec<QuestionRow> = questions.iter().map(|q| row(store, q)).collect();
    output.print_questions(&rows)
}

/// Search questions by tag and text, best match first
pub fn search(store: &Store, term: &str, output: &Output) -> Result<()> {
    let rows: Vec<QuestionRow> = store
        .search_ranked(term)
        .into_iter()
        .filter_map(|ranked| {
            let question = store.question(ranked.question)?;
            Some(row(store, &question).with_score(ranked.score()))
        })
        .collect();
    output.print_questions(&rows)
}

/// Questions sharing tags with the given one
pub fn similar(store: &Store, id: u64, output: &Output) -> Result<()> {
    let Some(similar) = store.similar(QuestionId(id)) else {
        bail!("Question not found: {}", id);
    };
    let rows: Vec<QuestionRow> = similar.iter().map(|q| row(store, q)).collect();
    output.print_questions(&rows)
}

/// Show a question with its answers and comments
pub fn show(store: &Store, id: u64, output: &Output) -> Result<()> {
    let id = QuestionId(id);
    let Some(question) = store.question(id) else {
        bail!("Question not found: {}", id);
    };
    let answers = store.answers(id);
    let comments = store.comments(id);
    let best = store.best_answer(id).map(|answer| answer.id);
    let keywords = important_words(&question.content);

    match output.format {
        OutputFormat::Json => {
            output.json(&serde_json::json!({
                "question": row(store, &question),
                "locked": question.locked,
                "important_words": keywords,
                "best_answer": best,
                "answers": answers,
                "comments": comments
            }))?;
        }
        OutputFormat::Quiet => {
            println!("{}", question.id);
        }
        OutputFormat::Human => {
            let summary = row(store, &question);
            println!("Question {}", question.id);
            println!("================");
            println!();
            println!("{}", question.content);
            println!();
            println!(
                "  Asked by: {}",
                summary.owner.as_deref().unwrap_or("(anonymous)")
            );
            println!("  Asked:    {}", question.created_at.format("%Y-%m-%d %H:%M"));
            println!("  Rating:   {}", summary.rating);
            if !summary.tags.is_empty() {
                println!("  Tags:     {}", summary.tags.join(", "));
            }
            if !keywords.is_empty() {
                println!("  Keywords: {}", keywords.join(", "));
            }
            if question.locked {
                println!("  (locked)");
            }

            for comment in &comments {
                println!("  > {} ({})", comment.content, owner_name(store, comment.owner));
            }

            println!();
            println!("{} answer(s)", answers.len());
            for answer in &answers {
                let marker = if Some(answer.id) == best { "*" } else { "-" };
                println!(
                    "{} [{:+}] {} ({})",
                    marker,
                    answer.rating(),
                    answer.content,
                    owner_name(store, answer.owner)
                );
                for comment in store.answer_comments(answer.reference()) {
                    println!("    > {} ({})", comment.content, owner_name(store, comment.owner));
                }
            }
        }
    }

    Ok(())
}
