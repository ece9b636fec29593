//! Error taxonomy.
//!
//! Each component owns a `thiserror` enum for its own failure modes; this
//! module only defines the stable [`ErrorKind`] classification and the
//! top-level [`AppError`] that CLI/binary entry points convert into exit
//! codes and log lines. Library modules never construct `AppError`
//! directly — they return their own typed error and let the caller
//! classify it via [`Classify`].

use std::time::Duration;

use uuid::Uuid;

/// Stable error classification surfaced to callers and used to pick an
/// HTTP status / CLI exit behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    PermissionDenied,
    QuotaExceeded,
    RateLimited,
    DedupConflict,
    TransientUpstream,
    FailedJob,
    StaleToken,
    AuthReuse,
    Fatal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::QuotaExceeded => "quota_exceeded",
            Self::RateLimited => "rate_limited",
            Self::DedupConflict => "dedup_conflict",
            Self::TransientUpstream => "transient_upstream",
            Self::FailedJob => "failed_job",
            Self::StaleToken => "stale_token",
            Self::AuthReuse => "auth_reuse",
            Self::Fatal => "fatal",
        }
    }
}

/// Implemented by every component error enum so the binary edge can map
/// it to an [`ErrorKind`] without matching on provider-specific shapes.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document not found: {id}")]
    NotFound { id: Uuid },
    #[error("no public snapshot for share token")]
    ShareTokenNotFound,
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),
    #[error("pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("migration error: {0}")]
    Migration(#[from] refinery::Error),
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::ShareTokenNotFound => ErrorKind::NotFound,
            Self::DimensionMismatch { .. } => ErrorKind::Validation,
            Self::Database(_) | Self::Pool(_) => ErrorKind::TransientUpstream,
            Self::Migration(_) => ErrorKind::Fatal,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("ciphertext is malformed")]
    Malformed,
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("no encryption key configured")]
    MissingKey,
}

impl Classify for VaultError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Fatal
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("credential validation failed: {reason}")]
    InvalidCredentials { reason: String },
    #[error("token refresh failed: {reason}")]
    RefreshFailed { reason: String },
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("rate limited by upstream, retry after {0:?}")]
    RateLimited(Duration),
    #[error("template expression error: {0}")]
    Template(String),
}

impl Classify for ConnectorError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCredentials { .. } => ErrorKind::Validation,
            Self::RefreshFailed { .. } => ErrorKind::StaleToken,
            Self::Upstream(_) => ErrorKind::TransientUpstream,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Template(_) => ErrorKind::Validation,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Connector(#[from] ConnectorError),
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error("lock held by another worker")]
    LockContended,
    #[error("embedding failed: {0}")]
    Embedding(String),
}

impl Classify for IngestionError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(e) => e.kind(),
            Self::Connector(e) => e.kind(),
            Self::Vault(e) => e.kind(),
            Self::Quota(e) => e.kind(),
            Self::LockContended => ErrorKind::TransientUpstream,
            Self::Embedding(_) => ErrorKind::TransientUpstream,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("reranker failed: {0}")]
    Reranker(String),
}

impl Classify for RetrieverError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(e) => e.kind(),
            Self::Reranker(_) => ErrorKind::TransientUpstream,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider {provider} returned an invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },
    #[error("provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },
    #[error("provider {provider} timed out")]
    Timeout { provider: String },
}

impl Classify for LlmError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::TransientUpstream
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("external service error: {0}")]
    ExternalService(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl Classify for ToolError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameters(_) => ErrorKind::Validation,
            Self::ExecutionFailed(_) | Self::ExternalService(_) | Self::Timeout(_) => {
                ErrorKind::TransientUpstream
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("thread {thread_id} has an active run")]
    Busy { thread_id: Uuid },
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Retriever(#[from] RetrieverError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("checkpoint corrupt for thread {thread_id}: {reason}")]
    CorruptCheckpoint { thread_id: Uuid, reason: String },
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },
}

impl Classify for AgentError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Busy { .. } => ErrorKind::StaleToken,
            Self::Llm(e) => e.kind(),
            Self::Tool(e) => e.kind(),
            Self::Retriever(e) => e.kind(),
            Self::Store(e) => e.kind(),
            Self::CorruptCheckpoint { .. } => ErrorKind::Fatal,
            Self::UnknownTool { .. } => ErrorKind::Validation,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("permission denied for membership role")]
    PermissionDenied,
    #[error("share token not found")]
    ShareNotFound,
}

impl Classify for ChatError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(e) => e.kind(),
            Self::PermissionDenied => ErrorKind::PermissionDenied,
            Self::ShareNotFound => ErrorKind::NotFound,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    #[error("page quota exceeded: {pages_used}/{pages_limit}")]
    PagesExceeded { pages_used: i64, pages_limit: i64 },
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Classify for QuotaError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::PagesExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Store(e) => e.kind(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("lock backend unavailable: {0}")]
    LockUnavailable(String),
}

impl Classify for SchedulerError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::TransientUpstream
    }
}

/// Top-level error for CLI/binary edges. Library code should not produce
/// this directly.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("dependency unhealthy: {0}")]
    DependencyUnhealthy(String),
    #[error(transparent)]
    Ingestion(#[from] IngestionError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Exit code per the CLI contract: 0 ok, 1 config error, 2 dependency
    /// unhealthy, 3 unexpected crash.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 1,
            Self::DependencyUnhealthy(_) => 2,
            _ => 3,
        }
    }
}
