use std::time::Duration;

pub const DEFAULT_DATABASE: &str = "op-bot-data";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub uri: String,
    pub database: String,
    /// Upper bound for a single operation. `None` waits indefinitely.
    pub operation_timeout: Option<Duration>,
    pub app_name: Option<String>,
}

impl StoreConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: DEFAULT_DATABASE.to_string(),
            operation_timeout: None,
            app_name: None,
        }
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }
}
