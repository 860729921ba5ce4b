pub mod backend;
pub mod config;
pub mod error;
pub mod model;
pub mod store;

pub use backend::{Backend, Fault, MemoryBackend, MongoBackend};
pub use config::StoreConfig;
pub use error::{ErrorKind, StoreError};
pub use model::{Advance, ChapterRecord, Subscriber};
pub use store::Store;
pub use teloxide::types::ChatId;
