//! Assertion helpers for testing

use repokit::CommitInfo;

/// Assert that a file exists
#[macro_export]
macro_rules! assert_file_exists {
    ($path:expr) => {
        assert!($path.exists(), "File should exist: {}", $path.display());
    };
}

/// Assert that a file does not exist
#[macro_export]
macro_rules! assert_file_not_exists {
    ($path:expr) => {
        assert!(
            !$path.exists(),
            "File should not exist: {}",
            $path.display()
        );
    };
}

/// Assert at most `rows` entries, newest first
pub fn assert_newest_first(history: &[CommitInfo], rows: usize) {
    assert!(
        history.len() <= rows,
        "expected at most {} entries, got {}",
        rows,
        history.len()
    );
    for pair in history.windows(2) {
        assert!(
            pair[0].timestamp >= pair[1].timestamp,
            "history out of order: {} ({}) before {} ({})",
            pair[0].commit,
            pair[0].timestamp,
            pair[1].commit,
            pair[1].timestamp
        );
    }
}

/// Messages of a history, in order
pub fn messages(history: &[CommitInfo]) -> Vec<&str> {
    history.iter().map(|entry| entry.message.as_str()).collect()
}
