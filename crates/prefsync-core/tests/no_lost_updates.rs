//! Concurrent logical updates on one agent must all land, even when the
//! store is slow to answer fetches.

use std::sync::Arc;
use std::time::Duration;

use prefsync_core::model::{
    MutedWord, MutedWordTarget, last_adult_content, last_app_state, last_hidden_posts,
    last_muted_words,
};
use prefsync_core::reducers::labeler_dids;
use prefsync_core::{AgentConfig, MemoryStore, PreferencesAgent};
use tokio::task::JoinSet;

fn ms(values: &[u64]) -> Vec<Duration> {
    values.iter().copied().map(Duration::from_millis).collect()
}

#[tokio::test(start_paused = true)]
async fn every_concurrent_update_lands() {
    let store = Arc::new(MemoryStore::new().with_fetch_latency(Duration::from_millis(5)));
    store.push_fetch_delays(ms(&[80, 10, 60, 30, 5, 70, 20, 40, 50, 15]));
    let agent = Arc::new(PreferencesAgent::new(store.clone(), AgentConfig::default()));

    let mut tasks = JoinSet::new();
    for i in 0..4 {
        let agent = Arc::clone(&agent);
        tasks.spawn(async move {
            agent
                .add_muted_word(MutedWord::new(format!("word-{i}"), vec![MutedWordTarget::Content]))
                .await
        });
    }
    for i in 0..3 {
        let agent = Arc::clone(&agent);
        tasks.spawn(async move {
            agent
                .hide_post(&format!("at://did:plc:alice/app.bsky.feed.post/{i}"))
                .await
        });
    }
    {
        let agent = Arc::clone(&agent);
        tasks.spawn(async move { agent.add_labeler("did:plc:mod").await });
    }
    {
        let agent = Arc::clone(&agent);
        tasks.spawn(async move { agent.set_adult_content_enabled(true).await });
    }
    {
        let agent = Arc::clone(&agent);
        tasks.spawn(async move { agent.queue_nudges(vec!["welcome".into()]).await });
    }

    while let Some(joined) = tasks.join_next().await {
        joined.expect("task panicked").expect("update failed");
    }

    let items = store.preferences();
    let words = &last_muted_words(&items).expect("muted words").items;
    assert_eq!(words.len(), 4);
    assert_eq!(last_hidden_posts(&items).expect("hidden posts").items.len(), 3);
    assert_eq!(labeler_dids(&items), vec!["did:plc:mod".to_string()]);
    assert!(last_adult_content(&items).expect("adult content").enabled);
    assert_eq!(
        last_app_state(&items).expect("app state").queued_nudges,
        vec!["welcome".to_string()]
    );
    assert_eq!(store.commit_count(), 10);
    assert_eq!(agent.configured_labelers(), vec!["did:plc:mod".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn separate_agents_are_not_serialized() {
    // The lock belongs to one agent. Two agents over the same document
    // resolve as last-write-wins at the store.
    let store = Arc::new(MemoryStore::new());
    store.push_fetch_delays(ms(&[50, 10]));
    let slow = PreferencesAgent::new(store.clone(), AgentConfig::default());
    let fast = PreferencesAgent::new(store.clone(), AgentConfig::default());

    let (a, b) = tokio::join!(
        slow.hide_post("at://did:plc:alice/app.bsky.feed.post/slow"),
        fast.set_adult_content_enabled(true),
    );
    a.expect("slow");
    b.expect("fast");

    let items = store.preferences();
    assert!(last_hidden_posts(&items).is_some());
    assert!(last_adult_content(&items).is_none());
}

#[tokio::test(start_paused = true)]
async fn a_failed_update_does_not_block_the_queue() {
    let store = Arc::new(MemoryStore::new().with_fetch_latency(Duration::from_millis(10)));
    let agent = PreferencesAgent::new(store.clone(), AgentConfig::default());

    let (bad, good) = tokio::join!(
        agent.hide_post("not a uri"),
        agent.hide_post("at://did:plc:alice/app.bsky.feed.post/ok"),
    );
    assert!(bad.is_err());
    good.expect("second update still runs");
    assert_eq!(store.commit_count(), 1);
}
