use thiserror::Error;

/// Errors raised by the source (vector store) side.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Connection, TLS or timeout failure below the HTTP layer.
    #[error("Transport error while calling {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server rejected the request because the page was too large.
    #[error("Payload too large for {endpoint}: {message}")]
    PayloadTooLarge { endpoint: String, message: String },

    /// Any other non-success HTTP status.
    #[error("Source returned HTTP {status} for {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("Unsupported vector layout in collection '{collection}': {message}")]
    UnsupportedVector { collection: String, message: String },

    #[error("Invalid source URL '{0}'")]
    InvalidUrl(String),
}

impl SourceError {
    /// True when shrinking the requested page is likely to help.
    ///
    /// Besides the dedicated variant this matches gRPC's "Message too long"
    /// and proxies that report the limit in the body of another status.
    pub fn is_payload_too_large(&self) -> bool {
        match self {
            SourceError::PayloadTooLarge { .. } => true,
            SourceError::Status { status: 413, .. } => true,
            SourceError::Status { body, .. } => mentions_size_limit(body),
            SourceError::Transport { source, .. } => mentions_size_limit(&source.to_string()),
            _ => false,
        }
    }

    /// 5xx, 429 and transport failures may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Transport { .. } => true,
            SourceError::Status { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            SourceError::PayloadTooLarge { .. } => true,
            SourceError::Decode { .. }
            | SourceError::UnsupportedVector { .. }
            | SourceError::InvalidUrl(_) => false,
        }
    }
}

fn mentions_size_limit(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("message too long") || lower.contains("payload too large")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16, body: &str) -> SourceError {
        SourceError::Status {
            endpoint: "/collections/c/points/scroll".into(),
            status,
            body: body.into(),
        }
    }

    #[test]
    fn detects_size_limit_failures() {
        assert!(status(413, "").is_payload_too_large());
        assert!(status(500, "grpc: Message too long (5000000 vs. 4194304)").is_payload_too_large());
        assert!(!status(500, "internal error").is_payload_too_large());
    }

    #[test]
    fn classifies_transient_statuses() {
        assert!(status(503, "").is_transient());
        assert!(status(429, "").is_transient());
        assert!(!status(404, "Not found: Collection `c` doesn't exist!").is_transient());
    }
}
