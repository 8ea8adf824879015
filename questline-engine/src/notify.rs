//! Quest-end notifiers.
//!
//! `LogNotifier` is the default for headless runs. `RecordingNotifier` keeps
//! the pending end time per quest so tests can assert on it.
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use questline_game::QuestId;

use crate::store::{Notifier, NotifyError};

/// Notifier that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn schedule_quest_end(
        &self,
        quest_id: &QuestId,
        at: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        info!("quest {quest_id} ends at {at}");
        Ok(())
    }

    async fn cancel_quest_end(&self, quest_id: &QuestId) -> Result<(), NotifyError> {
        info!("quest {quest_id} end notification cancelled");
        Ok(())
    }
}

/// Notifier that keeps pending notifications in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pending: Mutex<HashMap<QuestId, DateTime<Utc>>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pending(&self, quest_id: &QuestId) -> Option<DateTime<Utc>> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(quest_id)
            .copied()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn schedule_quest_end(
        &self,
        quest_id: &QuestId,
        at: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(quest_id.clone(), at);
        Ok(())
    }

    async fn cancel_quest_end(&self, quest_id: &QuestId) -> Result<(), NotifyError> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(quest_id);
        Ok(())
    }
}
