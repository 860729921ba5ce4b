use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use teloxide::types::ChatId;
use thiserror::Error;

use super::{Backend, ScanFault, SubscriberScan};
use crate::error::DriverError;
use crate::model::{ChapterRecord, Subscriber};

/// A backend operation that can be made to fail.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Fault {
    Ping,
    ScanStart,
    /// The scan yields the stored subscribers, then an undecodable document.
    ScanDecode,
    /// The scan yields the stored subscribers, then breaks off.
    ScanIteration,
    Upsert,
    Delete,
    FirstChapter,
    InsertChapter,
    UpdateChapter,
}

#[derive(Debug, Error)]
#[error("injected {0:?} failure")]
pub struct InjectedFailure(pub Fault);

#[derive(Debug, Default)]
struct State {
    subscribers: Vec<Subscriber>,
    chapters: Vec<ChapterRecord>,
    faults: HashSet<Fault>,
}

/// Keeps both collections in process memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    stalled: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chapter(chapter: ChapterRecord) -> Self {
        let backend = Self::new();
        backend.lock().chapters.push(chapter);
        backend
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail(&self, fault: Fault) {
        self.lock().faults.insert(fault);
    }

    pub fn heal(&self, fault: Fault) {
        self.lock().faults.remove(&fault);
    }

    /// While stalled, every operation waits forever.
    pub fn stall(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Number of stored documents carrying `chat_id`.
    pub fn subscriber_count(&self, chat_id: ChatId) -> usize {
        self.lock()
            .subscribers
            .iter()
            .filter(|s| s.chat_id == chat_id)
            .count()
    }

    pub fn chapters(&self) -> Vec<ChapterRecord> {
        self.lock().chapters.clone()
    }

    async fn enter(&self, fault: Fault) -> Result<MutexGuard<'_, State>, DriverError> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let state = self.lock();
        if state.faults.contains(&fault) {
            return Err(Box::new(InjectedFailure(fault)));
        }
        Ok(state)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn ping(&self) -> Result<(), DriverError> {
        self.enter(Fault::Ping).await?;
        Ok(())
    }

    async fn scan_subscribers(&self) -> Result<SubscriberScan, DriverError> {
        let state = self.enter(Fault::ScanStart).await?;
        let mut items: Vec<_> = state.subscribers.iter().copied().map(Ok).collect();

        if state.faults.contains(&Fault::ScanDecode) {
            items.push(Err(ScanFault::Decode(Box::new(InjectedFailure(
                Fault::ScanDecode,
            )))));
        } else if state.faults.contains(&Fault::ScanIteration) {
            items.push(Err(ScanFault::Iteration(Box::new(InjectedFailure(
                Fault::ScanIteration,
            )))));
        }

        Ok(stream::iter(items).boxed())
    }

    async fn upsert_subscriber(&self, subscriber: &Subscriber) -> Result<bool, DriverError> {
        let mut state = self.enter(Fault::Upsert).await?;
        if state.subscribers.iter().any(|s| s.chat_id == subscriber.chat_id) {
            return Ok(false);
        }
        state.subscribers.push(*subscriber);
        Ok(true)
    }

    async fn delete_subscriber(&self, chat_id: ChatId) -> Result<u64, DriverError> {
        let mut state = self.enter(Fault::Delete).await?;
        match state.subscribers.iter().position(|s| s.chat_id == chat_id) {
            Some(index) => {
                state.subscribers.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn first_chapter(&self) -> Result<Option<ChapterRecord>, DriverError> {
        let state = self.enter(Fault::FirstChapter).await?;
        Ok(state.chapters.first().cloned())
    }

    async fn insert_chapter(&self, chapter: &ChapterRecord) -> Result<(), DriverError> {
        let mut state = self.enter(Fault::InsertChapter).await?;
        state.chapters.push(chapter.clone());
        Ok(())
    }

    async fn update_chapter(&self, current: i64, next: &ChapterRecord) -> Result<u64, DriverError> {
        let mut state = self.enter(Fault::UpdateChapter).await?;
        match state
            .chapters
            .iter_mut()
            .find(|c| c.chapter_number == current)
        {
            Some(chapter) => {
                *chapter = next.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::TryStreamExt;

    use super::*;

    #[tokio::test]
    async fn upsert_keeps_one_document() {
        let backend = MemoryBackend::new();
        let subscriber = Subscriber::new(ChatId(3));
        assert!(backend.upsert_subscriber(&subscriber).await.unwrap());
        assert!(!backend.upsert_subscriber(&subscriber).await.unwrap());
        assert_eq!(backend.subscriber_count(ChatId(3)), 1);
    }

    #[tokio::test]
    async fn faults_can_be_healed() {
        let backend = MemoryBackend::new();
        backend.fail(Fault::Delete);
        assert!(backend.delete_subscriber(ChatId(1)).await.is_err());
        backend.heal(Fault::Delete);
        assert_eq!(backend.delete_subscriber(ChatId(1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn scan_breaks_off_after_stored_documents() {
        let backend = MemoryBackend::new();
        backend
            .upsert_subscriber(&Subscriber::new(ChatId(10)))
            .await
            .unwrap();
        backend.fail(Fault::ScanIteration);

        let mut scan = backend.scan_subscribers().await.unwrap();
        assert_eq!(
            scan.next().await.map(|r| r.map_err(|_| ())),
            Some(Ok(Subscriber::new(ChatId(10))))
        );
        assert!(matches!(
            scan.try_next().await,
            Err(ScanFault::Iteration(_))
        ));
    }

    #[tokio::test]
    async fn update_only_touches_matching_chapter() {
        let backend = MemoryBackend::with_chapter(ChapterRecord::new(5, "a"));
        let next = ChapterRecord::new(6, "b");
        assert_eq!(backend.update_chapter(4, &next).await.unwrap(), 0);
        assert_eq!(backend.chapters(), vec![ChapterRecord::new(5, "a")]);
        assert_eq!(backend.update_chapter(5, &next).await.unwrap(), 1);
        assert_eq!(backend.chapters(), vec![next]);
    }
}
