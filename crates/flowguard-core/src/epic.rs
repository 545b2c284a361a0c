use crate::error::{FlowguardError, Result};
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Epic
// ---------------------------------------------------------------------------

/// A body of planned work. Specs belong to exactly one epic and
/// verifications are recorded against an epic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epic {
    pub slug: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Epic {
    pub fn new(slug: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            slug: slug.into(),
            title: title.into(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn create(
        root: &Path,
        slug: impl Into<String>,
        title: impl Into<String>,
        description: Option<String>,
    ) -> Result<Self> {
        let slug = slug.into();
        paths::validate_slug(&slug)?;

        if paths::epic_dir(root, &slug).exists() {
            return Err(FlowguardError::EpicExists(slug));
        }

        let mut epic = Self::new(slug, title);
        epic.description = description;
        epic.save(root)?;
        Ok(epic)
    }

    pub fn load(root: &Path, slug: &str) -> Result<Self> {
        let manifest = paths::epic_manifest(root, slug);
        if !manifest.exists() {
            return Err(FlowguardError::EpicNotFound(slug.to_string()));
        }
        crate::io::read_yaml(&manifest)
    }

    pub fn exists(root: &Path, slug: &str) -> bool {
        paths::epic_manifest(root, slug).exists()
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let manifest = paths::epic_manifest(root, &self.slug);
        crate::io::write_yaml(&manifest, self)
    }

    pub fn list(root: &Path) -> Result<Vec<Self>> {
        let dir = root.join(paths::EPICS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut epics = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                let slug = entry.file_name().to_string_lossy().into_owned();
                match Self::load(root, &slug) {
                    Ok(e) => epics.push(e),
                    Err(FlowguardError::EpicNotFound(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }
        epics.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(epics)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
