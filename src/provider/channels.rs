use serde_json::Value;

use crate::error::{AppError, Result};

/// Maximum channels accepted by a single trigger call
pub const MAX_CHANNELS_PER_TRIGGER: usize = 100;

/// Maximum length of a channel name
pub const MAX_CHANNEL_NAME_LEN: usize = 164;

pub fn is_valid_channel_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_CHANNEL_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '=' | '@' | ',' | '.' | ';'))
}

/// Reject channel lists the transport would refuse.
pub fn validate_channels(channels: &[String]) -> Result<()> {
    if channels.is_empty() {
        return Err(AppError::Validation("channels must not be empty".to_string()));
    }

    if channels.len() > MAX_CHANNELS_PER_TRIGGER {
        return Err(AppError::Validation(format!(
            "at most {} channels per trigger, got {}",
            MAX_CHANNELS_PER_TRIGGER,
            channels.len()
        )));
    }

    if let Some(invalid) = channels.iter().find(|c| !is_valid_channel_name(c)) {
        return Err(AppError::Validation(format!(
            "invalid channel name '{}'",
            invalid
        )));
    }

    Ok(())
}

/// Read a channel list from untyped JSON.
pub fn channels_from_value(value: &Value) -> Result<Vec<String>> {
    let invalid = || AppError::Validation("channels must be a list of strings".to_string());

    value
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}
