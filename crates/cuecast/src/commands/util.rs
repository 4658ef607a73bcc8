//! Shared helpers for command handlers.

use std::path::Path;

use cuecast_core::ActionDescriptor;
use serde::Deserialize;

use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Parse an inline JSON object argument (`--data`).
pub fn parse_json_object(field: &str, raw: &str) -> Result<serde_json::Value, CliError> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| CliError::Validation {
        field: field.into(),
        reason: format!("invalid JSON: {e}"),
    })?;
    if !value.is_object() {
        return Err(CliError::Validation {
            field: field.into(),
            reason: "expected a JSON object".into(),
        });
    }
    Ok(value)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BatchFile {
    Bare(Vec<ActionDescriptor>),
    Wrapped { actions: Vec<ActionDescriptor> },
}

/// Read a batch file: an array of actions, or an object with `actions`.
pub fn read_batch_file(path: &Path) -> Result<Vec<ActionDescriptor>, CliError> {
    let contents = std::fs::read_to_string(path)?;
    let file: BatchFile = serde_json::from_str(&contents).map_err(|e| CliError::Validation {
        field: path.display().to_string(),
        reason: format!("invalid batch file: {e}"),
    })?;
    let actions = match file {
        BatchFile::Bare(actions) | BatchFile::Wrapped { actions } => actions,
    };
    if actions.is_empty() {
        return Err(CliError::Validation {
            field: path.display().to_string(),
            reason: "batch contains no actions".into(),
        });
    }
    Ok(actions)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::io::Write;

    #[test]
    fn batch_file_accepts_both_shapes() {
        let action = r#"{ "type": "CreateScene", "parameters": { "sceneName": "Intro" } }"#;
        for body in [format!("[{action}]"), format!(r#"{{ "actions": [{action}] }}"#)] {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            file.write_all(body.as_bytes()).unwrap();
            let actions = read_batch_file(file.path()).unwrap();
            assert_eq!(actions.len(), 1);
            assert_eq!(actions[0].action_type, "CreateScene");
        }
    }

    #[test]
    fn data_must_be_an_object() {
        assert!(parse_json_object("data", "[1, 2]").is_err());
        assert!(parse_json_object("data", r#"{"sceneName": "A"}"#).is_ok());
    }
}
