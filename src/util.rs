//! Small helpers shared across modules.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{MnemosyneError, Result};

/// Maximum size of a JSON input file read into memory (10 MB).
pub const MAX_INPUT_SIZE: u64 = 10 * 1024 * 1024;

/// Read a file into a string, refusing anything larger than `max_size` bytes.
pub fn read_to_string_with_limit(path: &Path, max_size: u64) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|e| MnemosyneError::storage(path, e))?;

    let size = metadata.len();
    if size > max_size {
        return Err(MnemosyneError::invalid_value(
            "input",
            format!(
                "{} is too large ({} bytes, max {} bytes)",
                path.display(),
                size,
                max_size
            ),
        ));
    }

    fs::read_to_string(path).map_err(|e| MnemosyneError::storage(path, e))
}

/// Read and parse a JSON file no larger than [`MAX_INPUT_SIZE`].
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_to_string_with_limit(path, MAX_INPUT_SIZE)?;
    serde_json::from_str(&content)
        .map_err(|e| MnemosyneError::serde(format!("{}: {}", path.display(), e)))
}

/// Truncate to at most `max` characters, appending `...` when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{}...", head)
    }
}
