use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ScanError;

/// Read and deserialize a JSON file.
///
/// Empty or malformed content is an error carrying the file path.
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, ScanError> {
    let data = fs::read_to_string(path).map_err(|e| ScanError::io(path, e))?;
    serde_json::from_str(&data).map_err(|e| ScanError::json(path, e))
}

/// Serialize a value as pretty JSON, creating parent directories as needed.
pub fn write_json_file<T: Serialize>(value: &T, path: &Path) -> Result<(), ScanError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ScanError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| ScanError::json(path, e))?;
    fs::write(path, json).map_err(|e| ScanError::io(path, e))
}
