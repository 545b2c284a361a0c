//! Specification documents.
//!
//! Layout:
//!   .flowguard/specs/<id>/manifest.yaml  id, epic, title, timestamps
//!   .flowguard/specs/<id>/spec.md        Markdown body
//!
//! The body is plain Markdown. Requirement extraction in
//! [`crate::matcher`] relies on the conventional section headings
//! (`## Functional Requirements`, `## Technical Plan`, ...).

use crate::epic::Epic;
use crate::error::{FlowguardError, Result};
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// SpecManifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SpecManifest {
    id: String,
    epic_id: String,
    title: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Spec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spec {
    pub id: String,
    pub epic_id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Spec {
    pub fn new(
        id: impl Into<String>,
        epic_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            epic_id: epic_id.into(),
            title: title.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    /// Create a spec under an existing epic.
    pub fn create(
        root: &Path,
        id: impl Into<String>,
        epic_id: &str,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self> {
        let id = id.into();
        paths::validate_slug(&id)?;
        if !Epic::exists(root, epic_id) {
            return Err(FlowguardError::EpicNotFound(epic_id.to_string()));
        }
        if paths::spec_dir(root, &id).exists() {
            return Err(FlowguardError::SpecExists(id));
        }

        let spec = Self::new(id, epic_id, title, content);
        spec.save(root)?;
        Ok(spec)
    }

    pub fn load(root: &Path, id: &str) -> Result<Self> {
        let manifest_path = paths::spec_manifest(root, id);
        if !manifest_path.exists() {
            return Err(FlowguardError::SpecNotFound(id.to_string()));
        }
        let manifest: SpecManifest = crate::io::read_yaml(&manifest_path)?;

        let content_path = paths::spec_content_path(root, id);
        let content = if content_path.exists() {
            std::fs::read_to_string(&content_path)?
        } else {
            String::new()
        };

        Ok(Self {
            id: manifest.id,
            epic_id: manifest.epic_id,
            title: manifest.title,
            content,
            created_at: manifest.created_at,
            updated_at: manifest.updated_at,
        })
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let manifest = SpecManifest {
            id: self.id.clone(),
            epic_id: self.epic_id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        crate::io::write_yaml(&paths::spec_manifest(root, &self.id), &manifest)?;
        crate::io::atomic_write(
            &paths::spec_content_path(root, &self.id),
            self.content.as_bytes(),
        )
    }

    /// Replace the body and bump `updated_at`.
    pub fn update_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.updated_at = Utc::now();
    }

    /// All specs, optionally restricted to one epic, oldest first.
    pub fn list(root: &Path, epic_id: Option<&str>) -> Result<Vec<Self>> {
        let dir = root.join(paths::SPECS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut specs = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            match Self::load(root, &id) {
                Ok(s) if epic_id.is_none_or(|e| s.epic_id == e) => specs.push(s),
                Ok(_) | Err(FlowguardError::SpecNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        specs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(specs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
