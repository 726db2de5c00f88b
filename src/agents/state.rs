//! Per-run shared state.
//!
//! Tools write into the run state; the routing loop reads `completed` before
//! every turn. The only way to change the state is [`RunStateUpdate`], and
//! none of its variants can clear the completion flag.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

/// Result metadata and completion flag for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunState {
    completed: bool,
    title: Option<String>,
    word_count: Option<u64>,
    summary: Option<String>,
}

/// A single field update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStateUpdate {
    /// Mark the run finished. Irreversible.
    Completed,
    Title(String),
    WordCount(u64),
    Summary(String),
}

impl RunState {
    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn word_count(&self) -> Option<u64> {
        self.word_count
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn apply(&mut self, update: RunStateUpdate) {
        match update {
            RunStateUpdate::Completed => self.completed = true,
            RunStateUpdate::Title(title) => self.title = Some(title),
            RunStateUpdate::WordCount(count) => self.word_count = Some(count),
            RunStateUpdate::Summary(summary) => self.summary = Some(summary),
        }
    }
}

/// Cloneable handle to one run's state.
#[derive(Debug, Clone, Default)]
pub struct SharedRunState(Arc<RwLock<RunState>>);

impl SharedRunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply updates atomically with respect to readers.
    pub async fn update(&self, updates: impl IntoIterator<Item = RunStateUpdate>) {
        let mut state = self.0.write().await;
        for update in updates {
            state.apply(update);
        }
    }

    pub async fn is_completed(&self) -> bool {
        self.0.read().await.completed
    }

    pub async fn snapshot(&self) -> RunState {
        self.0.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_are_independent() {
        let mut state = RunState::default();
        state.apply(RunStateUpdate::Title("Rain Note".to_string()));
        state.apply(RunStateUpdate::WordCount(50));
        state.apply(RunStateUpdate::Summary("A note about rain".to_string()));

        assert_eq!(state.title(), Some("Rain Note"));
        assert_eq!(state.word_count(), Some(50));
        assert_eq!(state.summary(), Some("A note about rain"));
        assert!(!state.completed());
    }

    #[test]
    fn test_completion_is_sticky() {
        let mut state = RunState::default();
        state.apply(RunStateUpdate::Completed);
        for update in [
            RunStateUpdate::Title("again".to_string()),
            RunStateUpdate::WordCount(0),
            RunStateUpdate::Summary(String::new()),
            RunStateUpdate::Completed,
        ] {
            state.apply(update);
            assert!(state.completed());
        }
    }

    #[tokio::test]
    async fn test_shared_handle_is_shared() {
        let state = SharedRunState::new();
        let tool_side = state.clone();
        assert!(!state.is_completed().await);

        tool_side
            .update([RunStateUpdate::Completed, RunStateUpdate::WordCount(12)])
            .await;

        assert!(state.is_completed().await);
        assert_eq!(state.snapshot().await.word_count(), Some(12));
    }

    #[test]
    fn test_serializes_all_fields() {
        let mut state = RunState::default();
        state.apply(RunStateUpdate::Title("T".to_string()));
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"completed": false, "title": "T", "word_count": null, "summary": null})
        );
    }
}
