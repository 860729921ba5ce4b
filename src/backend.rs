mod memory;
mod mongo;

use async_trait::async_trait;
use futures_core::stream::BoxStream;
use teloxide::types::ChatId;

use crate::error::DriverError;
use crate::model::{ChapterRecord, Subscriber};

pub use memory::{Fault, MemoryBackend};
pub use mongo::MongoBackend;

/// Why a subscriber scan stopped yielding documents.
#[derive(Debug)]
pub enum ScanFault {
    Decode(DriverError),
    Iteration(DriverError),
}

pub type SubscriberScan = BoxStream<'static, Result<Subscriber, ScanFault>>;

/// Raw document operations the store is built on. Implementations return the
/// driver's own error; the store decides which kind it becomes.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn ping(&self) -> Result<(), DriverError>;

    async fn scan_subscribers(&self) -> Result<SubscriberScan, DriverError>;

    /// Inserts the subscriber unless one with the same chat id exists.
    /// Returns whether a document was created.
    async fn upsert_subscriber(&self, subscriber: &Subscriber) -> Result<bool, DriverError>;

    /// Deletes at most one subscriber, returning the number removed.
    async fn delete_subscriber(&self, chat_id: ChatId) -> Result<u64, DriverError>;

    async fn first_chapter(&self) -> Result<Option<ChapterRecord>, DriverError>;

    async fn insert_chapter(&self, chapter: &ChapterRecord) -> Result<(), DriverError>;

    /// Overwrites the fields of the chapter whose number is `current` with
    /// `next`. Returns the number of matched documents.
    async fn update_chapter(&self, current: i64, next: &ChapterRecord) -> Result<u64, DriverError>;
}
