//! Classification of camera RAW file extensions.

use std::path::Path;

/// Extensions of the RAW formats the decoder is expected to handle.
pub const RAW_EXTENSIONS: [&str; 7] = ["arw", "cr2", "nef", "dng", "orf", "raf", "srw"];

/// Check whether a file extension (without the dot) names a supported RAW
/// format. Case-insensitive.
pub fn is_raw_extension(ext: &str) -> bool {
    RAW_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
}

/// Check whether a path ends in a supported RAW extension.
pub fn is_raw_path(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(is_raw_extension)
}
