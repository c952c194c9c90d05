// Filesystem job script store
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use gnnlaunch_core::application::constants::JOB_SCRIPT_MODE;
use gnnlaunch_core::error::{AppError, Result};
use gnnlaunch_core::port::JobScriptStore;

/// Writes job scripts into the configured jobs directory
pub struct FsJobScriptStore {
    jobs_dir: PathBuf,
}

impl FsJobScriptStore {
    pub fn new(jobs_dir: impl Into<PathBuf>) -> Self {
        Self {
            jobs_dir: jobs_dir.into(),
        }
    }

    fn candidate(&self, prefix: &str, stamp: &str, n: usize) -> PathBuf {
        match n {
            0 => self.jobs_dir.join(format!("{}_{}.sh", prefix, stamp)),
            n => self.jobs_dir.join(format!("{}_{}-{}.sh", prefix, stamp, n)),
        }
    }

    /// Create the first free `<prefix>_<stamp>[-n].sh` (same-second launches)
    ///
    /// `create_new` makes the claim atomic, so two writers never share a file.
    fn create_free(&self, prefix: &str, stamp: &str) -> Result<(PathBuf, File)> {
        for n in 0.. {
            let path = self.candidate(prefix, stamp, n);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(AppError::Io(e)),
            }
        }
        Err(AppError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free job script name for {}_{}", prefix, stamp),
        )))
    }
}

impl JobScriptStore for FsJobScriptStore {
    fn write_script(&self, prefix: &str, stamp: &str, content: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.jobs_dir)?;
        let (path, mut file) = self.create_free(prefix, stamp)?;
        file.write_all(content.as_bytes())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(JOB_SCRIPT_MODE))?;
        }

        debug!(path = %path.display(), bytes = content.len(), "Job script stored");
        Ok(path)
    }

    fn read_template(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AppError::NotFound(format!("job template {}", path.display())),
            _ => AppError::Io(e),
        })
    }
}
