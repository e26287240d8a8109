//! Artifact sync: walk a local tree and upload it file by file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

use crate::application::ports::RemoteTransport;
use crate::domain::transfer::remote_path;
use crate::domain::{DeployError, TransferPlan, TransferReport};

/// Collect the directories and files under `local_root`, skipping `.git`.
///
/// Hidden and git-ignored files are included; the deployment needs exactly
/// what is on disk. Entries are sorted by name so the order is stable.
///
/// # Errors
///
/// Returns an error if `local_root` is not a directory or cannot be read.
pub fn plan_tree(local_root: &Path) -> Result<TransferPlan> {
    anyhow::ensure!(
        local_root.is_dir(),
        "deployment source {} is not a directory",
        local_root.display()
    );

    let walker = WalkBuilder::new(local_root)
        .standard_filters(false)
        .follow_links(false)
        .filter_entry(|entry| entry.file_name() != ".git")
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut plan = TransferPlan::default();
    for entry in walker {
        let entry = entry.with_context(|| format!("walking {}", local_root.display()))?;
        if entry.depth() == 0 {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(local_root)
            .with_context(|| format!("{} is outside the source root", entry.path().display()))?
            .to_path_buf();
        match entry.file_type() {
            Some(ft) if ft.is_dir() => plan.directories.push(relative),
            Some(ft) if ft.is_file() => plan.files.push(relative),
            _ => tracing::debug!(path = %relative.display(), "skipping non-regular file"),
        }
    }
    Ok(plan)
}

/// Upload `local_root` to `remote_root` over an open connection.
///
/// Directories are created first, then files are copied in plan order. The
/// first failing file stops the upload.
///
/// # Errors
///
/// Returns [`DeployError::Transfer`] naming the failed path and every file
/// copied before it, or an error if the local tree cannot be walked.
pub async fn upload_tree<T: RemoteTransport>(
    transport: &T,
    conn: &T::Connection,
    local_root: &Path,
    remote_root: &str,
) -> Result<TransferReport> {
    let plan = plan_tree(local_root)?;
    upload_plan(transport, conn, local_root, remote_root, &plan).await
}

/// Upload an already computed plan.
///
/// # Errors
///
/// See [`upload_tree`].
pub async fn upload_plan<T: RemoteTransport>(
    transport: &T,
    conn: &T::Connection,
    local_root: &Path,
    remote_root: &str,
    plan: &TransferPlan,
) -> Result<TransferReport> {
    let mut report = TransferReport::default();
    let fail = |failed: PathBuf, reason: anyhow::Error, report: TransferReport| DeployError::Transfer {
        failed,
        reason: format!("{reason:#}"),
        copied: report.files_copied,
        directories_created: report.directories_created,
    };

    if let Err(e) = transport.make_dir(conn, remote_root).await {
        return Err(fail(PathBuf::from(remote_root), e, report).into());
    }

    for dir in &plan.directories {
        let remote = remote_path(remote_root, dir);
        if let Err(e) = transport.make_dir(conn, &remote).await {
            return Err(fail(dir.clone(), e, report).into());
        }
        tracing::debug!(remote = %remote, "created directory");
        report.directories_created.push(dir.clone());
    }

    for file in &plan.files {
        let remote = remote_path(remote_root, file);
        if let Err(e) = transport.put_file(conn, &local_root.join(file), &remote).await {
            tracing::warn!(file = %file.display(), copied = report.files_copied.len(), "copy failed");
            return Err(fail(file.clone(), e, report).into());
        }
        tracing::debug!(remote = %remote, "copied");
        report.files_copied.push(file.clone());
    }

    tracing::info!(
        directories = report.directories_created.len(),
        files = report.files_copied.len(),
        remote_root,
        "artifact sync complete"
    );
    Ok(report)
}
