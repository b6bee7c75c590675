//! # Storage Module
//!
//! Output-file naming and directory handling for the file sink.
//!
//! ## Plain English
//!
//! The user may name an output file exactly, or just point at a folder.
//! For a folder we make up a name from the current date and time, so two
//! runs never overwrite each other. Missing folders are created.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;

/// Extension given to generated raw-frame files
pub const RAW_EXTENSION: &str = "raw";

// ============================================
// PATH RESOLUTION
// ============================================

/// Generates a unique file name inside `directory`.
///
/// Format: `frames_YYYYMMDD_HHMMSS.raw`
pub fn generate_filename(directory: &Path) -> PathBuf {
    let now = Local::now();
    directory.join(format!(
        "frames_{}.{}",
        now.format("%Y%m%d_%H%M%S"),
        RAW_EXTENSION
    ))
}

/// Turns a configured output path into the file to create.
///
/// An existing directory, or a path ending in a separator, gets a
/// generated file name. The parent directory is created if needed.
pub fn resolve_output_path(path: &Path) -> io::Result<PathBuf> {
    let names_directory = path.is_dir() || path.as_os_str().to_string_lossy().ends_with('/');

    let file = if names_directory {
        ensure_directory(path)?;
        generate_filename(path)
    } else {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_directory(parent)?;
        }
        path.to_path_buf()
    };

    Ok(file)
}

// ============================================
// UTILITY FUNCTIONS
// ============================================

/// Ensures a directory exists.
pub fn ensure_directory(path: &Path) -> io::Result<()> {
    if !path.exists() {
        log::info!("Creating output directory: {:?}", path);
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Returns a human-readable byte count.
pub fn size_human(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_filename_generation() {
        let path = generate_filename(Path::new("/test"));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("frames_"));
        assert!(name.ends_with(".raw"));
        assert_eq!(path.parent(), Some(Path::new("/test")));
    }

    #[test]
    fn test_directory_gets_generated_name() {
        let dir = tempdir().unwrap();
        let resolved = resolve_output_path(dir.path()).unwrap();
        assert_eq!(resolved.parent(), Some(dir.path()));
        assert!(resolved.to_string_lossy().ends_with(".raw"));
    }

    #[test]
    fn test_file_path_creates_parent() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("nested").join("out.bin");

        let resolved = resolve_output_path(&target).unwrap();
        assert_eq!(resolved, target);
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_trailing_slash_means_directory() {
        let dir = tempdir().unwrap();
        let wanted = format!("{}/captures/", dir.path().display());

        let resolved = resolve_output_path(Path::new(&wanted)).unwrap();
        assert!(dir.path().join("captures").is_dir());
        assert!(resolved.starts_with(dir.path().join("captures")));
    }

    #[test]
    fn test_size_human() {
        assert_eq!(size_human(512), "512 bytes");
        assert!(size_human(5 * 1024 * 1024).contains("MB"));
    }
}
