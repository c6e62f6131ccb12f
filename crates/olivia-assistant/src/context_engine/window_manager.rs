//! Rolling-summary maintenance.
//!
//! Keeps the post-summary window the agent sees at or under `max_raw_messages` by folding
//! the oldest `summarize_batch_size` messages into a new summary row. Summaries are
//! append-only: a fold writes a new `ai_summary` row stamped with the timestamp of the last
//! message it absorbed, so "newer than the latest summary" is exactly the unfolded tail.
//! Raw messages are never deleted.
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context_engine::context_builder::format_messages_for_prompt;
use crate::context_engine::history::HistoryReader;
use crate::context_engine::prompts::{fold_prompt, CONVERSATION_START_SENTINEL};
use crate::llm::TextGenerator;
use crate::memory::MessageStore;
use crate::memory_db::schema::NewMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    pub max_raw_messages: usize,
    pub summarize_batch_size: usize,
    pub fetch_slack: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_raw_messages: 30,
            summarize_batch_size: 10,
            fetch_slack: 5,
        }
    }
}

impl WindowConfig {
    /// How many post-summary messages a maintenance pass reads.
    pub fn fetch_cap(&self) -> usize {
        self.max_raw_messages
            .saturating_add(self.summarize_batch_size)
            .saturating_add(self.fetch_slack)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldStage {
    ReadHistory,
    Generate,
    EmptySummary,
    WriteSummary,
}

impl fmt::Display for FoldStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FoldStage::ReadHistory => "read_history",
            FoldStage::Generate => "generate",
            FoldStage::EmptySummary => "empty_summary",
            FoldStage::WriteSummary => "write_summary",
        };
        f.write_str(name)
    }
}

/// Result of one `maintain_summary` pass. Callers are free to ignore it.
#[derive(Debug, Clone, PartialEq)]
pub enum FoldOutcome {
    /// Window within bounds; nothing written.
    NotNeeded { window_len: usize },
    Folded { folded: usize, summary_id: i64 },
    /// Over the limit but there was nothing to fold.
    Skipped,
    /// Abandoned for this pass; the next pass re-evaluates from scratch.
    Failed { stage: FoldStage, reason: String },
}

impl FoldOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FoldOutcome::NotNeeded { .. } => "not_needed",
            FoldOutcome::Folded { .. } => "folded",
            FoldOutcome::Skipped => "skipped",
            FoldOutcome::Failed { .. } => "failed",
        }
    }
}

pub struct ContextWindowManager {
    store: Arc<dyn MessageStore>,
    reader: HistoryReader,
    generator: Arc<dyn TextGenerator>,
    config: WindowConfig,
}

impl ContextWindowManager {
    pub fn new(
        store: Arc<dyn MessageStore>,
        generator: Arc<dyn TextGenerator>,
        config: WindowConfig,
    ) -> Self {
        Self {
            reader: HistoryReader::new(Arc::clone(&store)),
            store,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub async fn maintain_summary(&self, user_id: &str) -> FoldOutcome {
        let outcome = self.try_fold(user_id).await;
        match &outcome {
            FoldOutcome::NotNeeded { window_len } => {
                debug!("Summary for user {} up to date ({} raw messages)", user_id, window_len)
            }
            FoldOutcome::Folded { folded, summary_id } => info!(
                "Folded {} messages into summary {} for user {}",
                folded, summary_id, user_id
            ),
            FoldOutcome::Skipped => {
                info!("No messages to fold for user {} although window is over limit; skipping", user_id)
            }
            FoldOutcome::Failed { stage, reason } => {
                warn!("Summary fold for user {} failed at {}: {}", user_id, stage, reason)
            }
        }
        crate::metrics::inc_summary_fold(outcome.label());
        outcome
    }

    async fn try_fold(&self, user_id: &str) -> FoldOutcome {
        let cap = self.config.fetch_cap();
        let history = match self.reader.read_history_strict(user_id, cap).await {
            Ok(history) => history,
            Err(e) => return failed(FoldStage::ReadHistory, e),
        };

        let window_len = history.messages.len();
        if window_len <= self.config.max_raw_messages {
            return FoldOutcome::NotNeeded { window_len };
        }

        let batch_size = self.config.summarize_batch_size;
        let batch = if window_len >= cap {
            // The read may have cut off the oldest messages; fetch them from the front.
            match self
                .reader
                .oldest_after(user_id, history.summary_timestamp, batch_size)
                .await
            {
                Ok(batch) => batch,
                Err(e) => return failed(FoldStage::ReadHistory, e),
            }
        } else {
            history.messages[..batch_size.min(window_len)].to_vec()
        };
        let Some(anchor) = batch.last().map(|m| m.timestamp) else {
            return FoldOutcome::Skipped;
        };

        let existing = history.summary.as_deref().unwrap_or(CONVERSATION_START_SENTINEL);
        let prompt = fold_prompt(existing, &format_messages_for_prompt(&batch));
        debug!(
            "Summarizing {} messages for user {} ({} in window)",
            batch.len(),
            user_id,
            window_len
        );

        let summary = match self.generator.generate(&prompt).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => return failed(FoldStage::Generate, e),
        };
        if summary.is_empty() {
            return FoldOutcome::Failed {
                stage: FoldStage::EmptySummary,
                reason: "summarizer returned no text".to_string(),
            };
        }

        match self.store.insert(NewMessage::summary(user_id, &summary, anchor)).await {
            Ok(row) => FoldOutcome::Folded { folded: batch.len(), summary_id: row.id },
            Err(e) => failed(FoldStage::WriteSummary, e),
        }
    }
}

fn failed(stage: FoldStage, error: anyhow::Error) -> FoldOutcome {
    FoldOutcome::Failed { stage, reason: error.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::memory_db::schema::{MessageQuery, MessageType, StoredMessage, TypeFilter};
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSummarizer {
        calls: AtomicUsize,
        failing: AtomicBool,
        blank: AtomicBool,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for FakeSummarizer {
        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.failing.load(Ordering::SeqCst) {
                return Err(anyhow::anyhow!("summarizer unavailable"));
            }
            if self.blank.load(Ordering::SeqCst) {
                return Ok("   ".to_string());
            }
            Ok(format!("summary #{}", n))
        }
    }

    /// Accepts raw messages but refuses summary rows.
    struct SummaryRejectingStore(InMemoryStore);

    #[async_trait]
    impl MessageStore for SummaryRejectingStore {
        async fn insert(&self, message: NewMessage) -> anyhow::Result<StoredMessage> {
            if message.message_type == MessageType::AiSummary {
                return Err(anyhow::anyhow!("disk full"));
            }
            self.0.insert(message).await
        }

        async fn select(&self, query: &MessageQuery) -> anyhow::Result<Vec<StoredMessage>> {
            self.0.select(query).await
        }

        async fn delete_user(&self, user_id: &str) -> anyhow::Result<usize> {
            self.0.delete_user(user_id).await
        }
    }

    /// Serves raw messages but fails every summary lookup.
    struct SummaryBlindStore(InMemoryStore);

    #[async_trait]
    impl MessageStore for SummaryBlindStore {
        async fn insert(&self, message: NewMessage) -> anyhow::Result<StoredMessage> {
            self.0.insert(message).await
        }

        async fn select(&self, query: &MessageQuery) -> anyhow::Result<Vec<StoredMessage>> {
            if query.message_type == TypeFilter::Only(MessageType::AiSummary) {
                return Err(anyhow::anyhow!("summary index unavailable"));
            }
            self.0.select(query).await
        }

        async fn delete_user(&self, user_id: &str) -> anyhow::Result<usize> {
            self.0.delete_user(user_id).await
        }
    }

    /// Yields before answering so concurrent passes interleave.
    struct SlowSummarizer;

    #[async_trait]
    impl TextGenerator for SlowSummarizer {
        async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok("concurrent summary".to_string())
        }
    }

    fn manager(store: &InMemoryStore, summarizer: &Arc<FakeSummarizer>, config: WindowConfig) -> ContextWindowManager {
        ContextWindowManager::new(Arc::new(store.clone()), summarizer.clone(), config)
    }

    async fn write_pair(store: &InMemoryStore, user_id: &str, turn: usize) {
        store
            .insert(NewMessage::human(user_id, "s1", &format!("question {}", turn)))
            .await
            .unwrap();
        store
            .insert(NewMessage::ai(user_id, "s1", &format!("answer {}", turn)))
            .await
            .unwrap();
    }

    async fn summaries(store: &InMemoryStore, user_id: &str) -> Vec<StoredMessage> {
        store
            .select(&MessageQuery::for_user(user_id).only(MessageType::AiSummary))
            .await
            .unwrap()
    }

    async fn window_len(store: &InMemoryStore, user_id: &str) -> usize {
        HistoryReader::new(Arc::new(store.clone()))
            .read_history(user_id, usize::MAX)
            .await
            .unwrap()
            .messages
            .len()
    }

    #[tokio::test]
    async fn test_sixteen_turns_fold_once_leaving_twenty_two() {
        let store = InMemoryStore::new();
        let summarizer = Arc::new(FakeSummarizer::default());
        let manager = manager(&store, &summarizer, WindowConfig::default());

        for turn in 1..=16 {
            write_pair(&store, "u1", turn).await;
            let outcome = manager.maintain_summary("u1").await;
            if turn < 16 {
                assert!(matches!(outcome, FoldOutcome::NotNeeded { .. }), "turn {}", turn);
            } else {
                assert!(matches!(outcome, FoldOutcome::Folded { folded: 10, .. }));
            }
        }

        assert_eq!(summaries(&store, "u1").await.len(), 1);
        assert_eq!(window_len(&store, "u1").await, 22);
        assert_eq!(store.row_count("u1"), 33);

        let prompts = summarizer.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(CONVERSATION_START_SENTINEL));
        assert!(prompts[0].contains("Human: question 1\nAi: answer 1\n"));
        assert!(prompts[0].contains("Ai: answer 5\n---"));
        assert!(!prompts[0].contains("question 6"));
    }

    #[tokio::test]
    async fn test_existing_summary_with_five_newer_messages_is_noop() {
        let store = InMemoryStore::new();
        let earlier = store.insert(NewMessage::human("u1", "s1", "old")).await.unwrap();
        store
            .insert(NewMessage::summary("u1", "earlier chat", earlier.timestamp))
            .await
            .unwrap();
        for i in 0..5 {
            store.insert(NewMessage::human("u1", "s1", &format!("new{}", i))).await.unwrap();
        }
        let rows_before = store.row_count("u1");
        let summarizer = Arc::new(FakeSummarizer::default());
        let manager = manager(&store, &summarizer, WindowConfig::default());

        assert_eq!(manager.maintain_summary("u1").await, FoldOutcome::NotNeeded { window_len: 5 });
        assert_eq!(store.row_count("u1"), rows_before);
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generator_failure_leaves_summaries_untouched_and_retries_next_pass() {
        let store = InMemoryStore::new();
        for turn in 0..16 {
            write_pair(&store, "u1", turn).await;
        }
        let summarizer = Arc::new(FakeSummarizer::default());
        summarizer.failing.store(true, Ordering::SeqCst);
        let manager = manager(&store, &summarizer, WindowConfig::default());

        let outcome = manager.maintain_summary("u1").await;
        assert!(matches!(outcome, FoldOutcome::Failed { stage: FoldStage::Generate, .. }));
        assert!(summaries(&store, "u1").await.is_empty());

        // Next turn re-evaluates the same, still-qualifying condition.
        write_pair(&store, "u1", 16).await;
        let outcome = manager.maintain_summary("u1").await;
        assert!(matches!(outcome, FoldOutcome::Failed { stage: FoldStage::Generate, .. }));
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 2);

        summarizer.failing.store(false, Ordering::SeqCst);
        assert!(matches!(manager.maintain_summary("u1").await, FoldOutcome::Folded { .. }));
        assert_eq!(summaries(&store, "u1").await.len(), 1);
        assert_eq!(window_len(&store, "u1").await, 24);
    }

    #[tokio::test]
    async fn test_blank_summary_is_not_written() {
        let store = InMemoryStore::new();
        for turn in 0..16 {
            write_pair(&store, "u1", turn).await;
        }
        let summarizer = Arc::new(FakeSummarizer::default());
        summarizer.blank.store(true, Ordering::SeqCst);
        let manager = manager(&store, &summarizer, WindowConfig::default());

        assert!(matches!(
            manager.maintain_summary("u1").await,
            FoldOutcome::Failed { stage: FoldStage::EmptySummary, .. }
        ));
        assert!(summaries(&store, "u1").await.is_empty());
    }

    #[tokio::test]
    async fn test_summary_write_failure_is_reported() {
        let inner = InMemoryStore::new();
        for turn in 0..16 {
            write_pair(&inner, "u1", turn).await;
        }
        let summarizer = Arc::new(FakeSummarizer::default());
        let manager = ContextWindowManager::new(
            Arc::new(SummaryRejectingStore(inner.clone())),
            summarizer.clone(),
            WindowConfig::default(),
        );

        assert!(matches!(
            manager.maintain_summary("u1").await,
            FoldOutcome::Failed { stage: FoldStage::WriteSummary, .. }
        ));
        assert!(summaries(&inner, "u1").await.is_empty());
        assert_eq!(inner.row_count("u1"), 32);
    }

    #[tokio::test]
    async fn test_unreadable_summary_abandons_the_pass() {
        let store = InMemoryStore::new();
        let summarizer = Arc::new(FakeSummarizer::default());
        for turn in 0..16 {
            write_pair(&store, "u1", turn).await;
        }
        let healthy = manager(&store, &summarizer, WindowConfig::default());
        assert!(matches!(healthy.maintain_summary("u1").await, FoldOutcome::Folded { .. }));
        assert_eq!(window_len(&store, "u1").await, 22);
        let rows_before = store.row_count("u1");

        let blind = ContextWindowManager::new(
            Arc::new(SummaryBlindStore(store.clone())),
            summarizer.clone(),
            WindowConfig::default(),
        );
        assert!(matches!(
            blind.maintain_summary("u1").await,
            FoldOutcome::Failed { stage: FoldStage::ReadHistory, .. }
        ));
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(summaries(&store, "u1").await.len(), 1);
        assert_eq!(store.row_count("u1"), rows_before);
    }

    #[tokio::test]
    async fn test_concurrent_folds_append_two_summaries_and_newest_wins() {
        let store = InMemoryStore::new();
        for turn in 0..16 {
            write_pair(&store, "u1", turn).await;
        }
        let manager = ContextWindowManager::new(
            Arc::new(store.clone()),
            Arc::new(SlowSummarizer),
            WindowConfig::default(),
        );

        let (first, second) = tokio::join!(manager.maintain_summary("u1"), manager.maintain_summary("u1"));
        assert!(matches!(first, FoldOutcome::Folded { folded: 10, .. }));
        assert!(matches!(second, FoldOutcome::Folded { folded: 10, .. }));

        let written = summaries(&store, "u1").await;
        assert_eq!(written.len(), 2);
        let newest_id = written.iter().map(|s| s.id).max().unwrap();
        let latest = HistoryReader::new(Arc::new(store.clone()))
            .latest_summary("u1")
            .await
            .unwrap();
        assert_eq!(latest.id, newest_id);

        assert_eq!(window_len(&store, "u1").await, 22);
        let raw = store
            .select(&MessageQuery::for_user("u1").except(MessageType::AiSummary))
            .await
            .unwrap();
        assert_eq!(raw.len(), 32);
    }

    #[test]
    fn test_fetch_cap_saturates() {
        let config = WindowConfig { max_raw_messages: usize::MAX, summarize_batch_size: 10, fetch_slack: 5 };
        assert_eq!(config.fetch_cap(), usize::MAX);
        assert_eq!(WindowConfig::default().fetch_cap(), 45);
    }

    #[tokio::test]
    async fn test_zero_batch_size_skips_without_calling_generator() {
        let store = InMemoryStore::new();
        for turn in 0..16 {
            write_pair(&store, "u1", turn).await;
        }
        let summarizer = Arc::new(FakeSummarizer::default());
        let config = WindowConfig { summarize_batch_size: 0, ..WindowConfig::default() };
        let manager = manager(&store, &summarizer, config);

        assert_eq!(manager.maintain_summary("u1").await, FoldOutcome::Skipped);
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
        assert!(summaries(&store, "u1").await.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_window_folds_true_oldest_messages() {
        let store = InMemoryStore::new();
        for turn in 0..40 {
            write_pair(&store, "u1", turn).await;
        }
        let summarizer = Arc::new(FakeSummarizer::default());
        let manager = manager(&store, &summarizer, WindowConfig::default());

        assert!(matches!(manager.maintain_summary("u1").await, FoldOutcome::Folded { folded: 10, .. }));
        let prompts = summarizer.prompts.lock().unwrap();
        assert!(prompts[0].contains("Human: question 0\n"));
        assert!(prompts[0].contains("Ai: answer 4\n---"));
        drop(prompts);
        assert_eq!(window_len(&store, "u1").await, 70);
    }

    #[tokio::test]
    async fn test_successive_folds_are_monotonic_and_chain_summaries() {
        let store = InMemoryStore::new();
        let summarizer = Arc::new(FakeSummarizer::default());
        let config = WindowConfig { max_raw_messages: 6, summarize_batch_size: 4, fetch_slack: 2 };
        let manager = manager(&store, &summarizer, config);

        let mut previous_summary_ts = None;
        for turn in 0..20 {
            write_pair(&store, "u1", turn).await;
            let before = HistoryReader::new(Arc::new(store.clone()))
                .read_history("u1", usize::MAX)
                .await
                .unwrap();
            if let FoldOutcome::Folded { folded, .. } = manager.maintain_summary("u1").await {
                let latest = HistoryReader::new(Arc::new(store.clone()))
                    .latest_summary("u1")
                    .await
                    .unwrap();
                let last_folded = &before.messages[folded - 1];
                assert!(latest.timestamp >= last_folded.timestamp);
                if let Some(prev) = previous_summary_ts {
                    assert!(latest.timestamp > prev);
                }
                previous_summary_ts = Some(latest.timestamp);
            }
        }

        let prompts = summarizer.prompts.lock().unwrap();
        assert!(prompts.len() > 1);
        // Every fold after the first builds on the previous summary.
        assert!(prompts[1].contains("Existing Summary:\n---\nsummary #1\n---"));
    }

    proptest! {
        #[test]
        fn prop_window_stays_bounded_and_log_only_grows(
            turns in 0usize..60,
            max_raw in 2usize..35,
            batch in 2usize..12,
        ) {
            let store = InMemoryStore::new();
            let summarizer = Arc::new(FakeSummarizer::default());
            let config = WindowConfig { max_raw_messages: max_raw, summarize_batch_size: batch, fetch_slack: 5 };
            let manager = manager(&store, &summarizer, config);

            tokio_test::block_on(async {
                let mut last_row_count = 0;
                for turn in 0..turns {
                    write_pair(&store, "u1", turn).await;
                    manager.maintain_summary("u1").await;

                    let window = window_len(&store, "u1").await;
                    prop_assert!(window <= max_raw, "window {} > limit {}", window, max_raw);

                    let rows = store.row_count("u1");
                    prop_assert!(rows >= last_row_count + 2);
                    last_row_count = rows;

                    let raw = store
                        .select(&MessageQuery::for_user("u1").except(MessageType::AiSummary))
                        .await
                        .unwrap()
                        .len();
                    prop_assert_eq!(raw, (turn + 1) * 2);
                }
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
