#![forbid(unsafe_code)]

use super::ChangeRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_REVS_LIMIT: usize = 1000;

/// Open-time configuration for a [`super::SqliteStore`].
#[derive(Clone, Debug)]
pub struct OpenOptions {
    path: PathBuf,
    name: Option<String>,
    read_only: bool,
    revs_limit: usize,
    deterministic_revs: bool,
    auto_compaction: bool,
    registry: Option<Arc<ChangeRegistry>>,
}

impl OpenOptions {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            name: None,
            read_only: false,
            revs_limit: DEFAULT_REVS_LIMIT,
            deterministic_revs: false,
            auto_compaction: false,
            registry: None,
        }
    }

    /// Key under which continuous change subscribers register. Defaults to the path.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Number of generations kept in each document's stored branch (minimum 1).
    pub fn revs_limit(mut self, revs_limit: usize) -> Self {
        self.revs_limit = revs_limit.max(1);
        self
    }

    pub fn deterministic_revs(mut self, deterministic_revs: bool) -> Self {
        self.deterministic_revs = deterministic_revs;
        self
    }

    pub fn auto_compaction(mut self, auto_compaction: bool) -> Self {
        self.auto_compaction = auto_compaction;
        self
    }

    /// Use a private subscriber registry instead of the process-wide one.
    pub fn registry(mut self, registry: Arc<ChangeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn get_revs_limit(&self) -> usize {
        self.revs_limit
    }

    pub fn uses_deterministic_revs(&self) -> bool {
        self.deterministic_revs
    }

    pub fn uses_auto_compaction(&self) -> bool {
        self.auto_compaction
    }

    pub(in crate::store) fn resolve_registry(&self) -> Arc<ChangeRegistry> {
        self.registry.clone().unwrap_or_else(ChangeRegistry::global)
    }
}
