use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use teloxide::types::ChatId;
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, MongoBackend, ScanFault};
use crate::config::StoreConfig;
use crate::error::{ChapterOverflow, StoreError};
use crate::model::{Advance, ChapterRecord, Subscriber};

/// Handle to the bot's persisted state: the subscriber set and the latest
/// chapter record. Cloning is cheap and every clone shares the backend.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn Backend>,
    database: String,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("database", &self.database)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Store {
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        log::info!("Connecting to database {}", config.database);
        let backend = MongoBackend::connect(config)
            .await
            .map_err(|e| StoreError::Connection(e.into()))?;
        Self::with_backend(Arc::new(backend), config).await
    }

    /// Wraps an already constructed backend and checks that it answers.
    pub async fn with_backend(
        backend: Arc<dyn Backend>,
        config: &StoreConfig,
    ) -> Result<Self, StoreError> {
        let store = Self {
            backend,
            database: config.database.clone(),
            timeout: config.operation_timeout,
            cancel: CancellationToken::new(),
        };
        store.ping().await?;
        log::info!("Database {} is reachable", store.database);
        Ok(store)
    }

    /// Operations started after `token` is cancelled, or still running when
    /// it is, fail with [`StoreError::Cancelled`].
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    async fn run<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        log::debug!("{operation}");
        let bounded = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, fut)
                    .await
                    .map_err(|_| StoreError::TimedOut(limit))?,
                None => fut.await,
            }
        };

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StoreError::Cancelled),
            result = bounded => result,
        };

        if let Err(e) = &result {
            if !e.is_not_found() {
                log::warn!("{operation} failed: {e}");
            }
        }
        result
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.run("ping", async {
            self.backend.ping().await.map_err(StoreError::Ping)
        })
        .await
    }

    /// Every subscribed chat, in no particular order.
    pub async fn list_subscriber_ids(&self) -> Result<Vec<ChatId>, StoreError> {
        self.run("list subscribers", async {
            let mut scan = self
                .backend
                .scan_subscribers()
                .await
                .map_err(StoreError::Query)?;

            let mut ids = Vec::new();
            while let Some(item) = scan.next().await {
                match item {
                    Ok(subscriber) => ids.push(subscriber.chat_id),
                    Err(ScanFault::Decode(e)) => return Err(StoreError::CursorDecode(e)),
                    Err(ScanFault::Iteration(e)) => return Err(StoreError::CursorIteration(e)),
                }
            }
            Ok(ids)
        })
        .await
    }

    /// Registers `chat_id`. Returns `false` if it was already subscribed.
    pub async fn add_subscriber(&self, chat_id: ChatId) -> Result<bool, StoreError> {
        self.run("add subscriber", async {
            self.backend
                .upsert_subscriber(&Subscriber::new(chat_id))
                .await
                .map_err(StoreError::Insert)
        })
        .await
    }

    /// Removes `chat_id`. Returns `false` if it wasn't subscribed.
    pub async fn remove_subscriber(&self, chat_id: ChatId) -> Result<bool, StoreError> {
        self.run("remove subscriber", async {
            self.backend
                .delete_subscriber(chat_id)
                .await
                .map(|deleted| deleted > 0)
                .map_err(StoreError::Delete)
        })
        .await
    }

    pub async fn latest_chapter(&self) -> Result<ChapterRecord, StoreError> {
        self.run("get latest chapter", async {
            self.backend
                .first_chapter()
                .await
                .map_err(StoreError::Query)?
                .ok_or(StoreError::NotFound)
        })
        .await
    }

    /// Moves the record from `chapter_number` to `chapter_number + 1`.
    ///
    /// Only a record still at `chapter_number` is touched, so a caller
    /// working from an outdated read gets [`Advance::Stale`] and nothing is
    /// written.
    pub async fn advance_chapter(
        &self,
        chapter_number: i64,
        url: &str,
    ) -> Result<Advance, StoreError> {
        self.run("advance chapter", async {
            let next = chapter_number
                .checked_add(1)
                .ok_or_else(|| StoreError::Update(Box::new(ChapterOverflow(chapter_number))))?;

            let matched = self
                .backend
                .update_chapter(chapter_number, &ChapterRecord::new(next, url))
                .await
                .map_err(StoreError::Update)?;

            if matched == 0 {
                log::info!("Chapter {chapter_number} is not the stored one, nothing advanced");
                Ok(Advance::Stale)
            } else {
                Ok(Advance::Advanced)
            }
        })
        .await
    }

    /// Stores `chapter` unless a chapter record already exists.
    /// Returns whether it was inserted.
    pub async fn seed_chapter(&self, chapter: &ChapterRecord) -> Result<bool, StoreError> {
        self.run("seed chapter", async {
            let existing = self
                .backend
                .first_chapter()
                .await
                .map_err(StoreError::Query)?;
            if existing.is_some() {
                return Ok(false);
            }

            self.backend
                .insert_chapter(chapter)
                .await
                .map_err(StoreError::Insert)?;
            Ok(true)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Fault, MemoryBackend};
    use crate::error::ErrorKind;

    async fn store(backend: &Arc<MemoryBackend>) -> Store {
        Store::with_backend(backend.clone(), &StoreConfig::new("memory://"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn advance_overflow_is_an_update_error() {
        let backend = Arc::new(MemoryBackend::with_chapter(ChapterRecord::new(i64::MAX, "a")));
        let store = store(&backend).await;

        let err = store.advance_chapter(i64::MAX, "b").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Update);
        assert_eq!(backend.chapters(), vec![ChapterRecord::new(i64::MAX, "a")]);
    }

    #[tokio::test]
    async fn failed_emptiness_check_blocks_seed() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store(&backend).await;
        backend.fail(Fault::FirstChapter);

        let err = store
            .seed_chapter(&ChapterRecord::new(1, "a"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Query);
        assert!(backend.chapters().is_empty());
    }

    #[tokio::test]
    async fn database_name_comes_from_config() {
        let backend = Arc::new(MemoryBackend::new());
        let store = Store::with_backend(backend, &StoreConfig::new("memory://").database("other"))
            .await
            .unwrap();
        assert_eq!(store.database_name(), "other");
    }
}
