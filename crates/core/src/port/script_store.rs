// Job Script Store Port
// Where generated job scripts are written and templates are read from

use crate::error::Result;
use std::path::{Path, PathBuf};

pub trait JobScriptStore: Send + Sync {
    /// Write `content` as `<prefix>_<stamp>.sh` and return its path
    ///
    /// `stamp` is a `YYYYmmdd-HHMMSS` timestamp supplied by the caller.
    fn write_script(&self, prefix: &str, stamp: &str, content: &str) -> Result<PathBuf>;

    /// Read an existing job script used as a template
    fn read_template(&self, path: &Path) -> Result<String>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory script store
    #[derive(Default)]
    pub struct MemoryScriptStore {
        scripts: Mutex<HashMap<PathBuf, String>>,
    }

    impl MemoryScriptStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a template readable through `read_template`
        pub fn with_template(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(path.into(), content.into());
            self
        }

        pub fn get(&self, path: &Path) -> Option<String> {
            self.scripts.lock().unwrap().get(path).cloned()
        }
    }

    impl JobScriptStore for MemoryScriptStore {
        fn write_script(&self, prefix: &str, stamp: &str, content: &str) -> Result<PathBuf> {
            let path = PathBuf::from(format!("/jobs/{}_{}.sh", prefix, stamp));
            self.scripts
                .lock()
                .unwrap()
                .insert(path.clone(), content.to_string());
            Ok(path)
        }

        fn read_template(&self, path: &Path) -> Result<String> {
            self.get(path)
                .ok_or_else(|| AppError::NotFound(path.display().to_string()))
        }
    }
}
