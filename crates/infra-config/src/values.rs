// Dotted-key editing (`gnnlaunch config set slurm.partition gpu`)

use gnnlaunch_core::domain::Settings;
use serde_json::Value;

use crate::error::ConfigError;

/// Return `settings` with the value at `key` replaced
///
/// The existing value's JSON type decides how `raw` is parsed, so
/// `slurm.gpus` only accepts integers and `slurm.use_slurm_by_default` only
/// booleans.
pub fn set_value(settings: &Settings, key: &str, raw: &str) -> Result<Settings, ConfigError> {
    let mut doc = serde_json::to_value(settings)?;

    let mut slot = &mut doc;
    for part in key.split('.') {
        slot = slot
            .as_object_mut()
            .and_then(|obj| obj.get_mut(part))
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
    }

    let invalid = |reason: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    *slot = match slot {
        Value::Bool(_) => Value::Bool(
            raw.trim()
                .parse::<bool>()
                .map_err(|_| invalid("expected true or false"))?,
        ),
        Value::Number(_) => Value::from(
            raw.trim()
                .parse::<u32>()
                .map_err(|_| invalid("expected a non-negative integer"))?,
        ),
        Value::String(_) => Value::String(raw.to_string()),
        Value::Object(_) => return Err(invalid("is a section, set one of its fields")),
        Value::Array(_) | Value::Null => return Err(invalid("cannot be set from the command line")),
    };

    Ok(serde_json::from_value(doc)?)
}
