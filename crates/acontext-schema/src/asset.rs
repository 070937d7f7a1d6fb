use serde::{Deserialize, Serialize};

/// Content-addressed blob descriptor. Two assets with equal `sha256` refer
/// to the same content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Asset {
    pub bucket: String,
    pub key: String,
    pub sha256: String,
    #[serde(default)]
    pub etag: Option<String>,
    pub mime: String,
    pub size: u64,
}

impl Asset {
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        sha256: impl Into<String>,
        mime: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            sha256: sha256.into(),
            etag: None,
            mime: mime.into(),
            size,
        }
    }
}
