// Settings Repository Port

use crate::domain::Settings;
use crate::error::Result;
use std::path::Path;

pub trait SettingsRepository: Send + Sync {
    /// Load settings, completing missing fields from defaults
    fn load(&self) -> Result<Settings>;

    /// Persist settings
    fn save(&self, settings: &Settings) -> Result<()>;

    /// Where the settings live (for display)
    fn location(&self) -> &Path;
}
