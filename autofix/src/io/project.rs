//! Reading and overwriting files inside the project directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::path::stays_within_root;
use crate::core::types::{Patch, ResolvedOrigin};
use crate::error::FixError;

fn project_path(root: &Path, relative: &Path) -> Result<PathBuf> {
    if !stays_within_root(relative) {
        return Err(FixError::PathEscapesProject {
            path: relative.to_path_buf(),
        }
        .into());
    }
    Ok(root.join(relative))
}

/// Read a project file, mapping a missing file to [`FixError::FileNotFound`].
pub fn read_source(root: &Path, relative: &Path) -> Result<String> {
    let path = project_path(root, relative)?;
    debug!(path = %path.display(), "reading source");
    match fs::read_to_string(&path) {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(FixError::FileNotFound {
            path: relative.to_path_buf(),
        }
        .into()),
        Err(err) => Err(err).with_context(|| format!("read {}", path.display())),
    }
}

/// Replace the origin file's entire content with `patch`.
///
/// No backup is taken. The file must already exist; a patch never creates
/// new files.
pub fn apply_patch(root: &Path, origin: &ResolvedOrigin, patch: &Patch) -> Result<()> {
    let path = project_path(root, origin.as_path())?;
    if !path.is_file() {
        return Err(FixError::FileNotFound {
            path: origin.as_path().to_path_buf(),
        }
        .into());
    }
    fs::write(&path, &patch.content).with_context(|| format!("write {}", path.display()))?;
    info!(path = %path.display(), bytes = patch.content.len(), "patch applied");
    Ok(())
}
