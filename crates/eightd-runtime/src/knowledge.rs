//! Coaching and floor-rule retrieval.
//!
//! Coaching documents are keyed by [`ValidationTarget::knowledge_hint`]
//! (`D2_five_w_2h_coaching_validation`). The floor-rules document is a
//! singleton under [`FLOOR_RULES_HINT`]. Blank documents count as absent.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use eightd_core::ValidationTarget;

use crate::error::CoachError;

/// Key of the floor-compliance rules document.
pub const FLOOR_RULES_HINT: &str = "floor_rules_guidelines";

const COACHING_SUFFIX: &str = "_coaching_validation";
const EXTENSIONS: [&str; 2] = ["md", "txt"];

/// Read-only source of coaching text.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Coaching text for a step or section, `None` when there is none.
    async fn coaching(&self, target: &ValidationTarget) -> Result<Option<String>, CoachError>;

    /// The floor-compliance rules, `None` when not loaded.
    async fn floor_rules(&self) -> Result<Option<String>, CoachError>;

    /// How many coaching documents are available.
    async fn coaching_documents(&self) -> Result<usize, CoachError>;
}

fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// In-memory knowledge base.
#[derive(Debug, Clone, Default)]
pub struct StaticKnowledgeBase {
    documents: BTreeMap<String, String>,
}

impl StaticKnowledgeBase {
    pub fn builder() -> StaticKnowledgeBaseBuilder {
        StaticKnowledgeBaseBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct StaticKnowledgeBaseBuilder {
    documents: BTreeMap<String, String>,
}

impl StaticKnowledgeBaseBuilder {
    pub fn coaching(mut self, target: &ValidationTarget, text: impl Into<String>) -> Self {
        self.documents.insert(target.knowledge_hint(), text.into());
        self
    }

    pub fn floor_rules(mut self, text: impl Into<String>) -> Self {
        self.documents.insert(FLOOR_RULES_HINT.to_string(), text.into());
        self
    }

    pub fn build(self) -> StaticKnowledgeBase {
        StaticKnowledgeBase {
            documents: self.documents,
        }
    }
}

#[async_trait]
impl KnowledgeBase for StaticKnowledgeBase {
    async fn coaching(&self, target: &ValidationTarget) -> Result<Option<String>, CoachError> {
        Ok(self
            .documents
            .get(&target.knowledge_hint())
            .cloned()
            .and_then(non_blank))
    }

    async fn floor_rules(&self) -> Result<Option<String>, CoachError> {
        Ok(self.documents.get(FLOOR_RULES_HINT).cloned().and_then(non_blank))
    }

    async fn coaching_documents(&self) -> Result<usize, CoachError> {
        Ok(self
            .documents
            .iter()
            .filter(|(hint, text)| hint.ends_with(COACHING_SUFFIX) && !text.trim().is_empty())
            .count())
    }
}

/// Reads `{hint}.md` or `{hint}.txt` from a directory.
#[derive(Debug, Clone)]
pub struct DirectoryKnowledgeBase {
    root: PathBuf,
}

impl DirectoryKnowledgeBase {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn document(&self, hint: &str) -> Result<Option<String>, CoachError> {
        for extension in EXTENSIONS {
            let path = self.root.join(format!("{}.{}", hint, extension));
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => return Ok(non_blank(text)),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(CoachError::Knowledge(format!(
                        "failed to read {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl KnowledgeBase for DirectoryKnowledgeBase {
    async fn coaching(&self, target: &ValidationTarget) -> Result<Option<String>, CoachError> {
        self.document(&target.knowledge_hint()).await
    }

    async fn floor_rules(&self) -> Result<Option<String>, CoachError> {
        self.document(FLOOR_RULES_HINT).await
    }

    async fn coaching_documents(&self) -> Result<usize, CoachError> {
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(|e| {
            CoachError::Knowledge(format!("failed to list {}: {}", self.root.display(), e))
        })?;

        let mut count = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CoachError::Knowledge(e.to_string()))?
        {
            let path = entry.path();
            let is_document = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| EXTENSIONS.contains(&e));
            let is_coaching = path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.ends_with(COACHING_SUFFIX));
            if is_document && is_coaching {
                count += 1;
            }
        }
        Ok(count)
    }
}
