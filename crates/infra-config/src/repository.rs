use config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use gnnlaunch_core::domain::Settings;
use gnnlaunch_core::port::SettingsRepository;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::ConfigError;

/// Prefix of environment overrides (`GNNLAUNCH__SLURM__PARTITION=gpu`)
pub const ENV_PREFIX: &str = "GNNLAUNCH";

/// Settings file name inside the platform config directory
pub const CONFIG_FILE_NAME: &str = "gnnlaunch.toml";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "gnnlaunch")
}

/// Platform config location, falling back to the current directory
pub fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

fn default_workspace() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

/// Settings stored as a TOML file, layered over defaults and under
/// environment overrides.
///
/// A missing file is created with the defaults on first load.
pub struct FileSettingsRepository {
    path: PathBuf,
    defaults: Settings,
    env_prefix: Option<String>,
}

impl FileSettingsRepository {
    pub fn new(path: impl Into<PathBuf>, defaults: Settings) -> Self {
        Self {
            path: path.into(),
            defaults,
            env_prefix: Some(ENV_PREFIX.to_string()),
        }
    }

    /// Repository at `path` (or the platform default), with the workspace
    /// rooted in the platform data directory.
    pub fn discover(path: Option<PathBuf>) -> Self {
        let path = path.map(|p| expand(&p)).unwrap_or_else(default_config_path);
        Self::new(path, Settings::with_workspace(default_workspace()))
    }

    /// Read overrides from `<prefix>__*` variables instead (None disables)
    pub fn with_env_prefix(mut self, prefix: Option<&str>) -> Self {
        self.env_prefix = prefix.map(str::to_string);
        self
    }

    /// Settings written when no file exists yet
    pub fn defaults(&self) -> &Settings {
        &self.defaults
    }

    fn load_layered(&self) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&self.defaults)?)
            .add_source(
                File::from(self.path.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            );
        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        info!("Loading settings from {}", self.path.display());

        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.workspace_dir = expand(&settings.workspace_dir);
        settings.jobs_dir = expand(&settings.jobs_dir);
        settings.logs_dir = expand(&settings.logs_dir);
        Ok(settings)
    }

    fn ensure_dirs(settings: &Settings) -> Result<(), ConfigError> {
        for dir in settings.required_dirs() {
            if !dir.as_os_str().is_empty() && !dir.is_dir() {
                debug!(dir = %dir.display(), "Creating directory");
                fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    fn write(&self, settings: &Settings) -> Result<(), ConfigError> {
        Self::ensure_dirs(settings)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let text = toml::to_string_pretty(settings)?;
        fs::write(&self.path, text).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!("Settings saved to {}", self.path.display());
        Ok(())
    }

    fn read(&self) -> Result<Settings, ConfigError> {
        if !self.path.exists() {
            info!(
                "No settings file at {}, writing defaults",
                self.path.display()
            );
            self.write(&self.defaults)?;
        }
        let settings = self.load_layered()?;
        Self::ensure_dirs(&settings)?;
        Ok(settings)
    }
}

impl SettingsRepository for FileSettingsRepository {
    fn load(&self) -> gnnlaunch_core::Result<Settings> {
        Ok(self.read()?)
    }

    fn save(&self, settings: &Settings) -> gnnlaunch_core::Result<()> {
        Ok(self.write(settings)?)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo(temp: &TempDir) -> FileSettingsRepository {
        FileSettingsRepository::new(
            temp.path().join("conf/gnnlaunch.toml"),
            Settings::with_workspace(temp.path().join("ws")),
        )
        .with_env_prefix(None)
    }

    #[test]
    fn test_first_load_writes_defaults_and_dirs() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp);

        let settings = repo.load().unwrap();

        assert!(repo.location().exists());
        assert_eq!(settings, Settings::with_workspace(temp.path().join("ws")));
        assert!(settings.jobs_dir.is_dir());
        assert!(settings.logs_dir.is_dir());
    }

    #[test]
    fn test_partial_file_is_completed_from_defaults() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp);
        fs::create_dir_all(temp.path().join("conf")).unwrap();
        fs::write(
            repo.location(),
            "[slurm]\npartition = \"gpu\"\ngpus = 2\n\n[training]\nscript_path = \"/opt/train.py\"\n",
        )
        .unwrap();

        let settings = repo.load().unwrap();

        assert_eq!(settings.slurm.partition, "gpu");
        assert_eq!(settings.slurm.gpus, 2);
        assert_eq!(settings.slurm.mem, "16G");
        assert_eq!(settings.training.script_path, "/opt/train.py");
        assert_eq!(
            settings.training.default_args,
            "--data {dataset_dir} --model {model}"
        );
        assert_eq!(settings.workspace_dir, temp.path().join("ws"));
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp);

        let mut settings = repo.load().unwrap();
        settings.conversion.script_path = "/opt/convert.py".to_string();
        settings.slurm.use_slurm_by_default = true;
        repo.save(&settings).unwrap();

        assert_eq!(repo.load().unwrap(), settings);
    }

    #[test]
    fn test_environment_overrides_file() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp).with_env_prefix(Some("GNNLAUNCH_TEST_ENV"));
        std::env::set_var("GNNLAUNCH_TEST_ENV__SLURM__QOS", "high");
        std::env::set_var("GNNLAUNCH_TEST_ENV__SLURM__CPUS", "16");

        let settings = repo.load();
        std::env::remove_var("GNNLAUNCH_TEST_ENV__SLURM__QOS");
        std::env::remove_var("GNNLAUNCH_TEST_ENV__SLURM__CPUS");

        let settings = settings.unwrap();
        assert_eq!(settings.slurm.qos, "high");
        assert_eq!(settings.slurm.cpus, 16);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let repo = repo(&temp);
        fs::create_dir_all(temp.path().join("conf")).unwrap();
        fs::write(repo.location(), "[slurm\n").unwrap();

        assert!(repo.load().is_err());
    }
}
