//! User command handlers

use anyhow::{Context, Result};

use qa_core::Store;

use crate::output::{Output, UserRow};

/// Run the spam and cheating checks for every user
///
/// Flagged users are blocked as a side effect, so the rows show the state
/// after the checks.
pub fn check(store: &Store, output: &Output) -> Result<()> {
    let mut rows = Vec::new();
    for user in store.users() {
        let spammer = store
            .is_spammer(&user.name)
            .with_context(|| format!("Spam check failed for {}", user.name))?;
        let cheater = store
            .is_maybe_cheater(&user.name)
            .with_context(|| format!("Cheating check failed for {}", user.name))?;
        let checked = store.user(&user.name).unwrap_or(user);
        rows.push(UserRow::new(&checked, spammer, cheater));
    }
    output.print_users(&rows)
}
