use async_trait::async_trait;
use futures_util::StreamExt;
use mongodb::bson::doc;
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use teloxide::types::ChatId;

use super::{Backend, ScanFault, SubscriberScan};
use crate::config::StoreConfig;
use crate::error::DriverError;
use crate::model::{ChapterRecord, Subscriber, CHAPTERS, SUBSCRIBERS};

#[derive(Debug, Clone)]
pub struct MongoBackend {
    database: Database,
}

impl MongoBackend {
    /// Builds a client from the connection string. The driver connects
    /// lazily, so this only fails on an invalid configuration.
    pub async fn connect(config: &StoreConfig) -> Result<Self, mongodb::error::Error> {
        let mut options = ClientOptions::parse(config.uri.as_str()).await?;
        if let Some(app_name) = &config.app_name {
            options.app_name = Some(app_name.clone());
        }
        let client = Client::with_options(options)?;
        Ok(Self::new(&client, &config.database))
    }

    pub fn new(client: &Client, database: &str) -> Self {
        Self {
            database: client.database(database),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    fn subscribers(&self) -> Collection<Subscriber> {
        self.database.collection(SUBSCRIBERS)
    }

    fn chapters(&self) -> Collection<ChapterRecord> {
        self.database.collection(CHAPTERS)
    }
}

fn scan_fault(err: mongodb::error::Error) -> ScanFault {
    if matches!(*err.kind, ErrorKind::BsonDeserialization(_)) {
        ScanFault::Decode(err.into())
    } else {
        ScanFault::Iteration(err.into())
    }
}

#[async_trait]
impl Backend for MongoBackend {
    async fn ping(&self) -> Result<(), DriverError> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn scan_subscribers(&self) -> Result<SubscriberScan, DriverError> {
        let cursor = self.subscribers().find(doc! {}).await?;
        Ok(cursor.map(|item| item.map_err(scan_fault)).boxed())
    }

    async fn upsert_subscriber(&self, subscriber: &Subscriber) -> Result<bool, DriverError> {
        let chat_id = subscriber.chat_id.0;
        let result = self
            .subscribers()
            .update_one(
                doc! { "chat_id": chat_id },
                doc! { "$setOnInsert": { "chat_id": chat_id } },
            )
            .upsert(true)
            .await?;
        Ok(result.upserted_id.is_some())
    }

    async fn delete_subscriber(&self, chat_id: ChatId) -> Result<u64, DriverError> {
        let result = self
            .subscribers()
            .delete_one(doc! { "chat_id": chat_id.0 })
            .await?;
        Ok(result.deleted_count)
    }

    async fn first_chapter(&self) -> Result<Option<ChapterRecord>, DriverError> {
        Ok(self.chapters().find_one(doc! {}).await?)
    }

    async fn insert_chapter(&self, chapter: &ChapterRecord) -> Result<(), DriverError> {
        self.chapters().insert_one(chapter).await?;
        Ok(())
    }

    async fn update_chapter(&self, current: i64, next: &ChapterRecord) -> Result<u64, DriverError> {
        let result = self
            .chapters()
            .update_one(
                doc! { "chapter_number": current },
                doc! { "$set": {
                    "chapter_number": next.chapter_number,
                    "latest_url": next.latest_url.as_str(),
                } },
            )
            .await?;
        Ok(result.matched_count)
    }
}
