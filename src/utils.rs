//! Utilities module.

use std::path::Path;

/// Gets the file name of the given path, or the whole path if it has none.
pub fn get_file_name<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.display().to_string(),
    }
}

/// Reduces a client supplied file name to a safe base name.
///
/// Directory components of both path styles are removed, as are control characters. Returns
/// `None` if nothing usable remains.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let clean: String = base.chars().filter(|c| !c.is_control()).collect();
    let clean = clean.trim();

    if clean.is_empty() || clean == "." || clean == ".." {
        None
    } else {
        Some(clean.to_owned())
    }
}

/// Checks whether the file name has the `.apk` extension, in any case.
pub fn has_apk_extension(name: &str) -> bool {
    name.to_lowercase().ends_with(".apk")
}
