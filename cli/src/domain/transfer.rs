//! Artifact transfer plan and report types.

use std::path::{Path, PathBuf};

/// Local tree to upload, as paths relative to the local root in walk order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferPlan {
    pub directories: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

/// What a completed upload created on the remote side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub directories_created: Vec<PathBuf>,
    pub files_copied: Vec<PathBuf>,
}

/// Join a relative local path onto a remote root using `/` separators.
#[must_use]
pub fn remote_path(remote_root: &str, relative: &Path) -> String {
    let mut out = remote_root.trim_end_matches('/').to_string();
    for part in relative.components() {
        out.push('/');
        out.push_str(&part.as_os_str().to_string_lossy());
    }
    out
}
