//! Document identity and per-document metadata.

use serde::{Deserialize, Serialize};

/// Identifier of a document within a workspace.
///
/// Ids are assigned by the host system; this core never generates them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata tracked for every known document.
///
/// Reconstructed from the root structure (source side) or from the index
/// backend (index side); never persisted by this core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    /// Document title, if one is set.
    pub title: Option<String>,
}

impl DocMeta {
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_id_display_roundtrip() {
        let id = DocId::new("doc-1");
        assert_eq!(id.as_str(), "doc-1");
        assert_eq!(id.to_string(), "doc-1");
        assert_eq!(DocId::from("doc-1"), id);
    }

    #[test]
    fn test_doc_id_serde_transparent() {
        let id = DocId::new("doc-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"doc-1\"");
        let back: DocId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_doc_meta_title() {
        let meta = DocMeta::with_title("Notes");
        assert_eq!(meta.title.as_deref(), Some("Notes"));
        assert_eq!(DocMeta::default().title, None);
    }
}
