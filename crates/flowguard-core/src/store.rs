use crate::error::Result;
use crate::spec::Spec;
use crate::verification::Verification;
use std::path::{Path, PathBuf};

/// Persisted artifacts the verification pipeline reads and writes.
pub trait Storage: Send + Sync {
    fn load_spec(&self, id: &str) -> Result<Spec>;

    fn list_specs(&self, epic_id: Option<&str>) -> Result<Vec<Spec>>;

    fn save_verification(&self, verification: &Verification) -> Result<()>;
}

/// [`Storage`] over the `.flowguard/` directory of a project root.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Storage for FsStorage {
    fn load_spec(&self, id: &str) -> Result<Spec> {
        Spec::load(&self.root, id)
    }

    fn list_specs(&self, epic_id: Option<&str>) -> Result<Vec<Spec>> {
        Spec::list(&self.root, epic_id)
    }

    fn save_verification(&self, verification: &Verification) -> Result<()> {
        verification.save(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{DiffFormat, DiffSource};
    use crate::epic::Epic;
    use crate::verification::DiffAnalysis;
    use tempfile::TempDir;

    #[test]
    fn fs_storage_delegates_to_records() {
        let dir = TempDir::new().unwrap();
        Epic::create(dir.path(), "checkout", "Checkout", None).unwrap();
        Spec::create(dir.path(), "payments", "checkout", "Payments", "body").unwrap();

        let store = FsStorage::new(dir.path());
        assert_eq!(store.load_spec("payments").unwrap().content, "body");
        assert_eq!(store.list_specs(Some("checkout")).unwrap().len(), 1);

        let summary = crate::feedback::generate_summary(&[]);
        let v = Verification::new(
            "checkout",
            vec![],
            DiffSource::default(),
            DiffAnalysis::empty(DiffFormat::Unified),
            vec![],
            summary,
        );
        store.save_verification(&v).unwrap();
        assert!(Verification::load(dir.path(), &v.id).is_ok());
    }
}
