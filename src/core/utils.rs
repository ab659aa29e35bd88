use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::Path;

use crate::api::RunError;

/// Ensure the directory holding `path` exists.
pub fn ensure_parent_dir(path: &Path) -> Result<(), RunError> {
    let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) else {
        return Ok(());
    };
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Picks the pipeline input from the argument, a file, or stdin.
pub fn read_input(text: Option<String>, file: Option<&Path>) -> Result<String, RunError> {
    let input = match (text, file) {
        (Some(_), Some(_)) => {
            return Err(RunError::Input(
                "Use either --input or --input-file, not both".to_string(),
            ))
        }
        (Some(text), None) => text,
        (None, Some(path)) => fs::read_to_string(path)
            .map_err(|e| RunError::Input(format!("Unable to read {}: {}", path.display(), e)))?,
        (None, None) => {
            let stdin = io::stdin();
            if stdin.is_terminal() {
                return Err(RunError::Input(
                    "No input given. Pass --input, --input-file, or pipe text on stdin".to_string(),
                ));
            }
            let mut buf = String::new();
            stdin.lock().read_to_string(&mut buf)?;
            buf
        }
    };
    non_empty(input)
}

fn non_empty(input: String) -> Result<String, RunError> {
    if input.trim().is_empty() {
        Err(RunError::Input("Pipeline input is empty".to_string()))
    } else {
        Ok(input)
    }
}
