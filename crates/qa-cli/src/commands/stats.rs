//! Stats command handler

use anyhow::Result;

use qa_core::Store;

use crate::output::{Output, OutputFormat};

/// Show store statistics
pub fn show(store: &Store, output: &Output) -> Result<()> {
    let users = store.user_count();
    let questions = store.question_count();
    let answers = store.answer_count();
    let best = store.best_answer_count();
    let high_rated = store.high_rated_answer_count();
    let tags = store.all_tags().len();
    let rules = store.rules();

    match output.format {
        OutputFormat::Json => {
            output.json(&serde_json::json!({
                "counts": {
                    "users": users,
                    "questions": questions,
                    "answers": answers,
                    "best_answers": best,
                    "high_rated_answers": high_rated,
                    "tags": tags
                },
                "rules": rules
            }))?;
        }
        OutputFormat::Quiet => {
            println!("{}", questions);
        }
        OutputFormat::Human => {
            println!("QA Statistics");
            println!("=============");
            println!();
            println!("  Users:              {}", users);
            println!("  Questions:          {}", questions);
            println!("  Answers:            {}", answers);
            println!("  Best answers:       {}", best);
            println!(
                "  High-rated answers: {} (rating >= {})",
                high_rated, rules.high_rated_threshold
            );
            println!("  Tags:               {}", tags);
        }
    }

    Ok(())
}
