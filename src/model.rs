use serde::{Deserialize, Serialize};
use teloxide::types::ChatId;

pub const SUBSCRIBERS: &str = "subscribers";
pub const CHAPTERS: &str = "chapters";

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub chat_id: ChatId,
}

impl Subscriber {
    pub fn new(chat_id: ChatId) -> Self {
        Self { chat_id }
    }
}

/// The most recently released chapter the bot knows about.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub chapter_number: i64,
    pub latest_url: String,
}

impl ChapterRecord {
    pub fn new(chapter_number: i64, latest_url: impl Into<String>) -> Self {
        Self {
            chapter_number,
            latest_url: latest_url.into(),
        }
    }
}

/// Outcome of advancing the chapter record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Advanced,
    /// No record carried the expected chapter number, nothing was written.
    Stale,
}

#[cfg(test)]
mod tests {
    use mongodb::bson::{self, doc};

    use super::*;

    #[test]
    fn subscriber_document_shape() {
        let document = bson::to_document(&Subscriber::new(ChatId(-1001))).unwrap();
        assert_eq!(document, doc! { "chat_id": -1001_i64 });
    }

    #[test]
    fn chapter_decodes_with_object_id() {
        let document = doc! {
            "_id": bson::oid::ObjectId::new(),
            "chapter_number": 1100_i64,
            "latest_url": "https://example.org/1100",
        };
        let chapter: ChapterRecord = bson::from_document(document).unwrap();
        assert_eq!(chapter, ChapterRecord::new(1100, "https://example.org/1100"));
    }

    #[test]
    fn chapter_missing_field_is_rejected() {
        let document = doc! { "chapter_number": 3_i64 };
        assert!(bson::from_document::<ChapterRecord>(document).is_err());
    }
}
