//! Validators and transformers used by the standard field specs.

use std::path::Path;

/// Non-empty after trimming whitespace.
pub fn non_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

/// The value names an existing regular file.
///
/// Hits the filesystem, so field specs using it are marked as cached.
pub fn is_existing_file(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && Path::new(value).is_file()
}

pub fn identity(value: &str) -> String {
    value.to_string()
}

pub fn trimmed(value: &str) -> String {
    value.trim().to_string()
}

/// Absolute form of a path, without resolving symlinks.
pub fn absolute_path(value: &str) -> String {
    let value = value.trim();
    match std::path::absolute(value) {
        Ok(path) => path.to_string_lossy().into_owned(),
        Err(_) => value.to_string(),
    }
}
