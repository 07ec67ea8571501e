//! Notification command handlers

use anyhow::{bail, Result};

use qa_core::Store;

use crate::output::Output;

/// List a user's notifications, newest first
pub fn list(store: &Store, name: &str, output: &Output) -> Result<()> {
    let Some(user) = store.user(name) else {
        bail!("User not found: {}", name);
    };

    let notifications = store.notifications_for(user.id);
    output.print_notifications(&notifications)?;

    if let Some(latest) = store.very_recent_unread_notification(user.id) {
        output.message(&format!(
            "\nAnswer {} on question {} arrived just now.",
            latest.about.answer, latest.about.question
        ));
    }
    Ok(())
}
