//! Staging of the SSH private key as an owner-only temporary file.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::application::ports::{CredentialStager, StagedCredential};

/// Writes key material to a fresh `NamedTempFile` with mode 600.
#[derive(Debug, Default)]
pub struct TempKeyStager {
    dir: Option<PathBuf>,
}

impl TempKeyStager {
    /// Stage keys in `dir` instead of the system temp directory.
    #[must_use]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }
}

/// A staged key file. Removed by [`StagedCredential::wipe`], or on drop if
/// wipe is never reached.
#[derive(Debug)]
pub struct TempKeyFile(NamedTempFile);

impl StagedCredential for TempKeyFile {
    fn path(&self) -> &Path {
        self.0.path()
    }

    fn wipe(self) -> Result<()> {
        let path = self.0.path().to_path_buf();
        self.0
            .close()
            .with_context(|| format!("remove {}", path.display()))?;
        tracing::debug!(path = %path.display(), "staged key removed");
        Ok(())
    }
}

impl CredentialStager for TempKeyStager {
    type Artifact = TempKeyFile;

    fn stage(&self, material: &str) -> Result<TempKeyFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("canary-key-").suffix(".pem");
        let mut file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .context("create staged key file")?;

        set_permissions(file.path(), 0o600)?;
        file.write_all(material.as_bytes())
            .context("write staged key file")?;
        // OpenSSH rejects PEM keys without a final newline.
        if !material.ends_with('\n') {
            file.write_all(b"\n").context("write staged key file")?;
        }
        file.flush().context("flush staged key file")?;

        tracing::debug!(path = %file.path().display(), "SSH key staged");
        Ok(TempKeyFile(file))
    }
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .with_context(|| format!("set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
