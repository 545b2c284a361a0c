use crate::error::{FlowguardError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const FLOWGUARD_DIR: &str = ".flowguard";
pub const EPICS_DIR: &str = ".flowguard/epics";
pub const SPECS_DIR: &str = ".flowguard/specs";
pub const VERIFICATIONS_DIR: &str = ".flowguard/verifications";

pub const CONFIG_FILE: &str = ".flowguard/config.yaml";

pub const MANIFEST_FILE: &str = "manifest.yaml";
pub const SPEC_CONTENT_FILE: &str = "spec.md";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn epic_dir(root: &Path, slug: &str) -> PathBuf {
    root.join(EPICS_DIR).join(slug)
}

pub fn epic_manifest(root: &Path, slug: &str) -> PathBuf {
    epic_dir(root, slug).join(MANIFEST_FILE)
}

pub fn spec_dir(root: &Path, id: &str) -> PathBuf {
    root.join(SPECS_DIR).join(id)
}

pub fn spec_manifest(root: &Path, id: &str) -> PathBuf {
    spec_dir(root, id).join(MANIFEST_FILE)
}

pub fn spec_content_path(root: &Path, id: &str) -> PathBuf {
    spec_dir(root, id).join(SPEC_CONTENT_FILE)
}

pub fn verifications_dir(root: &Path) -> PathBuf {
    root.join(VERIFICATIONS_DIR)
}

pub fn verification_path(root: &Path, id: &str) -> PathBuf {
    verifications_dir(root).join(format!("{id}.yaml"))
}

// ---------------------------------------------------------------------------
// Slug validation
// ---------------------------------------------------------------------------

static SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > 64 || !slug_re().is_match(slug) {
        return Err(FlowguardError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
