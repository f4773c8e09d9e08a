//! Resource read results as seen by the local client

use crate::mcp::types::McpResourceContent;

/// MIME type reported for textual payloads
pub const TEXT_MIME_TYPE: &str = "text/plain";

/// MIME type reported for binary payloads
pub const BLOB_MIME_TYPE: &str = "application/octet-stream";

/// The single payload the bridge returns for a resource read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourcePayload {
    /// Text content
    Text(String),
    /// Binary content, base64 encoded as received
    Blob(String),
}

impl ResourcePayload {
    /// Pick the payload out of a `resources/read` result.
    ///
    /// Only the first item counts. Its text wins when non-empty, then its
    /// blob; anything else degrades to empty text.
    pub fn from_contents(contents: Vec<McpResourceContent>) -> Self {
        let Some(first) = contents.into_iter().next() else {
            return Self::Text(String::new());
        };

        match (first.text, first.blob) {
            (Some(text), _) if !text.is_empty() => Self::Text(text),
            (_, Some(blob)) if !blob.is_empty() => Self::Blob(blob),
            _ => Self::Text(String::new()),
        }
    }

    /// MIME type to report alongside the payload
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Text(_) => TEXT_MIME_TYPE,
            Self::Blob(_) => BLOB_MIME_TYPE,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) | Self::Blob(s) => s.is_empty(),
        }
    }
}
