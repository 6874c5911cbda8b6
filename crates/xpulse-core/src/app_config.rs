#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    /// Postgres status store. When unset the CLI keeps request state in memory.
    pub database_url: Option<String>,
    pub env: Environment,
    pub log_level: String,
    /// Bearer credential for the content API.
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    /// Pause between result pages of one subject.
    pub page_delay_ms: u64,
    pub batch_max_size: usize,
    pub batch_max_concurrent: usize,
    pub batch_delay_ms: u64,
    /// Ceiling on the number of URLs accepted from one upload.
    pub max_batch_urls: usize,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("page_delay_ms", &self.page_delay_ms)
            .field("batch_max_size", &self.batch_max_size)
            .field("batch_max_concurrent", &self.batch_max_concurrent)
            .field("batch_delay_ms", &self.batch_delay_ms)
            .field("max_batch_urls", &self.max_batch_urls)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
