use thiserror::Error;

pub type Result<T> = std::result::Result<T, UsherError>;

/// Durable key-value store failures. Always recovered locally by the cache.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Failures talking to the remote summarization endpoint.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("endpoint returned HTTP {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Cross-context messaging failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("no page agent is listening in tab {0}")]
    NoReceiver(u32),

    #[error("tab {0} is closed")]
    TabClosed(u32),

    #[error("reply channel dropped")]
    ReplyDropped,

    #[error("no reply within {0} ms")]
    Timeout(u64),

    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

/// Top-level error, tagged with the pipeline phase that produced it.
#[derive(Error, Debug)]
pub enum UsherError {
    #[error("[inject] {0}")]
    Injection(String),

    #[error("[fetch] {0}")]
    Fetch(#[from] FetchError),

    #[error("[message] {0}")]
    Message(#[from] MessageError),

    #[error("[storage] {0}")]
    Storage(#[from] StorageError),

    #[error("[config] {0}")]
    Config(String),

    #[error("[page] {0}")]
    Page(String),
}

impl UsherError {
    /// Short phase name, used in log lines.
    pub fn phase(&self) -> &'static str {
        match self {
            UsherError::Injection(_) => "inject",
            UsherError::Fetch(_) => "fetch",
            UsherError::Message(_) => "message",
            UsherError::Storage(_) => "storage",
            UsherError::Config(_) => "config",
            UsherError::Page(_) => "page",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_phase() {
        let err = UsherError::Injection("restricted page".into());
        assert_eq!(err.to_string(), "[inject] restricted page");
        assert_eq!(err.phase(), "inject");

        let err: UsherError = MessageError::Timeout(250).into();
        assert_eq!(err.to_string(), "[message] no reply within 250 ms");
    }
}
