//! Built-in demonstration data
//!
//! The store keeps everything in memory, so every command starts from this
//! data set. Timestamps are spread over the last few hours through a
//! manual clock that ends at the current time.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use qa_core::{CommentParent, Config, ManualClock, Store, VoteDirection};

/// Build a store filled with the demonstration data set
pub fn demo_store(config: Config) -> Result<Store> {
    let now = Utc::now();
    let clock = Arc::new(ManualClock::new(now - Duration::hours(3)));
    let store = Store::with_clock(config, clock.clone());

    seed(&store, &clock, now).context("Failed to seed demonstration data")?;
    clock.set(now);
    info!(
        users = store.user_count(),
        questions = store.question_count(),
        "Seeded demonstration data"
    );
    Ok(store)
}

fn seed(store: &Store, clock: &ManualClock, now: DateTime<Utc>) -> qa_core::StoreResult<()> {
    let douglas = store.register_user("Douglas", "42")?.id;
    let jack = store.register_user("Jack", "sparrow")?.id;
    let ada = store.register_user("Ada", "engine")?.id;
    let linus = store.register_user("Linus", "penguin")?.id;
    let fan = store.register_user("Fan", "jack4ever")?.id;
    let spammer = store.register_user("Spammer", "cheap")?.id;

    store.set_moderator("Linus", true)?;
    store.set_email("Ada", "ada@analytical.engine.org")?;
    store.set_date_of_birth("Ada", "10.12.1815")?;
    store.set_profession("Ada", "Mathematician")?;

    let step = Duration::minutes(5);

    let lifetimes = store.create_question(douglas, "How do lifetimes work with borrowed struct fields?")?;
    store.set_tags(lifetimes, "rust lifetimes borrowing ownership")?;
    store.observe(douglas, lifetimes)?;
    clock.advance(step);

    let closures = store.create_question(jack, "Why does my closure outlive the value it borrows?")?;
    store.set_tags(closures, "rust lifetimes closures")?;
    clock.advance(step);

    let sorting = store.create_question(ada, "Which sorting algorithms are stable?")?;
    store.set_tags(sorting, "algorithms sorting")?;
    store.observe(ada, sorting)?;
    clock.advance(step);

    let patches = store.create_question(linus, "How do I split a patch series with git?")?;
    store.set_tags(patches, "git patches")?;
    clock.advance(step);

    let borrowck = store.create_question(douglas, "Is the Rust borrow checker sound?")?;
    store.set_tags(borrowck, "rust borrowing")?;
    clock.advance(step);

    let generics = store.create_question(jack, "What does impl Trait mean in argument position?")?;
    store.set_tags(generics, "rust generics")?;
    clock.advance(step);

    // An untagged question is only reachable through text search
    store.create_question(ada, "What did the first program compute?")?;
    clock.advance(step);

    let from_jack = store.create_answer(
        lifetimes,
        jack,
        "Give the struct a lifetime parameter and tie the field to it.",
    )?;
    clock.advance(step);
    let from_ada = store.create_answer(
        lifetimes,
        ada,
        "The struct may not outlive the data it borrows, so it carries that lifetime.",
    )?;
    store.create_comment(
        CommentParent::Answer(from_ada),
        douglas,
        "That finally made it click, thanks!",
    )?;
    clock.advance(step);
    let on_sorting = store.create_answer(sorting, jack, "Merge sort and insertion sort are stable.")?;
    store.create_comment(CommentParent::Question(patches), ada, "Have you tried git rebase -i?")?;
    clock.advance(step);

    store.set_best_answer(from_ada, store.now())?;

    for voter in [jack, linus, fan, spammer, douglas] {
        store.vote_answer(from_ada, voter, VoteDirection::Up)?;
    }
    store.vote_answer(from_jack, douglas, VoteDirection::Up)?;
    store.vote_question(borrowck, ada, VoteDirection::Down)?;

    // Fan only ever supports Jack
    store.vote_question(closures, fan, VoteDirection::Up)?;
    store.vote_question(generics, fan, VoteDirection::Up)?;
    store.vote_answer(from_jack, fan, VoteDirection::Up)?;
    store.vote_answer(on_sorting, fan, VoteDirection::Up)?;

    // Sixty posts within the last half hour
    clock.set(now - Duration::minutes(25));
    for i in 0..60 {
        store.create_question(spammer, &format!("Cheap watches, best prices, offer #{}", i))?;
        clock.advance(Duration::seconds(20));
    }

    Ok(())
}
