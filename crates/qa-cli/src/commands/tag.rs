//! Tag command handlers

use anyhow::Result;

use qa_core::Store;

use crate::output::Output;

/// List tags with usage counts, optionally filtered by prefix
pub fn list(store: &Store, prefix: Option<String>, output: &Output) -> Result<()> {
    let tags = match prefix {
        Some(prefix) => store.tags_with_prefix(&prefix),
        None => store.all_tags(),
    };
    output.print_tags(&tags)
}
