//! Test utilities for MiniCRM crates.

use std::path::PathBuf;
use tempfile::TempDir;

/// Creates a temporary directory that is cleaned up on drop.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Creates a temporary file with given content.
pub fn temp_file(content: &str) -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let path = dir.path().join("test_file");
    std::fs::write(&path, content).expect("Failed to write temp file");
    (dir, path)
}

/// Returns a path for a not-yet-created SQLite file inside a fresh temp dir.
///
/// Keep the `TempDir` alive for as long as the database is in use.
pub fn temp_db_path(name: &str) -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let path = dir.path().join(format!("{}.db", name));
    (dir, path)
}

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a Result is Err and return the error.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_temp_dir_creation() {
        let dir = temp_dir();
        assert!(dir.path().exists());
        assert!(dir.path().is_dir());
    }

    #[test]
    fn test_temp_db_path_is_not_created() {
        let (dir, path) = temp_db_path("crm");
        assert!(path.starts_with(dir.path()));
        assert!(!path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("db"));
    }

    #[test]
    fn test_assert_macros() {
        let ok: Result<u32, String> = Ok(7);
        assert_eq!(assert_ok!(ok), 7);

        let err: Result<u32, String> = Err("boom".to_string());
        assert_eq!(assert_err!(err), "boom");
    }

    proptest! {
        #[test]
        fn test_temp_file_content_roundtrip(content in "\\PC*") {
            let (_dir, path) = temp_file(&content);
            let read_content = std::fs::read_to_string(&path).unwrap();
            prop_assert_eq!(content, read_content);
        }
    }
}
