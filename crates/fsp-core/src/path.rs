// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Volume-relative path helpers
//!
//! Paths are `\`-separated and rooted at `\`. Comparison is ordinal, so two
//! paths name the same file only if they are byte-for-byte equal.

use crate::error::{FsError, FsResult};

pub const SEPARATOR: char = '\\';
pub const ROOT: &str = "\\";

/// Longest path (in UTF-16 units, exclusive) a volume accepts.
pub const MAX_PATH: usize = 260;

/// Split `path` at its last run of separators.
///
/// Returns `(remain, suffix)` where `remain` is everything before the run
/// (or the root when nothing precedes it) and `suffix` is the final
/// component. A path without any separator has an empty `remain`.
pub fn suffix(path: &str) -> (&str, &str) {
    let Some(last) = path.rfind(SEPARATOR) else {
        return ("", path);
    };
    let suffix = &path[last + SEPARATOR.len_utf8()..];
    let remain = path[..last].trim_end_matches(SEPARATOR);
    if remain.is_empty() {
        (ROOT, suffix)
    } else {
        (remain, suffix)
    }
}

/// Path of the directory containing `path`.
pub fn parent(path: &str) -> &str {
    suffix(path).0
}

pub fn is_root(path: &str) -> bool {
    path == ROOT
}

/// Length of `path` as the transport measures it.
pub fn wide_len(path: &str) -> usize {
    path.encode_utf16().count()
}

/// Reject paths that do not fit the volume's fixed-size name field.
pub fn check_length(path: &str) -> FsResult<()> {
    if wide_len(path) >= MAX_PATH {
        return Err(FsError::NameInvalid);
    }
    Ok(())
}
