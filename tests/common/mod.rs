#![allow(dead_code)]

pub use shellexec_test_utils::builders;
pub use shellexec_test_utils::{RecordingSink, init_tracing, with_timeout};

use std::path::{Path, PathBuf};

/// Write `len` bytes of `*` to `dir/name` and return the path and content.
pub fn star_file(dir: &Path, name: &str, len: usize) -> (PathBuf, String) {
    let content = "*".repeat(len);
    let path = dir.join(name);
    std::fs::write(&path, &content).expect("write star file");
    (path, content)
}

/// Bigger than any common OS pipe buffer.
pub const PIPE_OVERFLOW: usize = 64 * 1024 + 1;
