//! Recursive file listing for bulk pushes

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{SyncError, SyncResult};

/// List every file below `root`, depth first.
///
/// Each directory yields the files of its subdirectories before its own
/// files. Returned paths are absolute when `root` is. Directories are
/// tracked by canonical path, so a symlink pointing back up the tree is
/// listed once and then skipped.
pub fn list_files(root: &Path) -> SyncResult<Vec<PathBuf>> {
    let metadata = fs::metadata(root).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SyncError::NotFound {
            path: root.to_path_buf(),
        },
        _ => SyncError::from_read(e, root.to_path_buf()),
    })?;

    if !metadata.is_dir() {
        return Err(SyncError::NotFound {
            path: root.to_path_buf(),
        });
    }

    let mut visited = HashSet::new();
    let mut files = Vec::new();
    collect(root, &mut visited, &mut files)?;
    Ok(files)
}

fn collect(dir: &Path, visited: &mut HashSet<PathBuf>, files: &mut Vec<PathBuf>) -> SyncResult<()> {
    let canonical = dir
        .canonicalize()
        .map_err(|e| SyncError::from_read(e, dir.to_path_buf()))?;
    if !visited.insert(canonical) {
        debug!("Skipping already listed directory {:?}", dir);
        return Ok(());
    }

    let mut subdirs = Vec::new();
    let mut own_files = Vec::new();

    let entries = fs::read_dir(dir).map_err(|e| SyncError::from_read(e, dir.to_path_buf()))?;
    for entry in entries {
        let entry = entry.map_err(|e| SyncError::from_read(e, dir.to_path_buf()))?;
        let path = entry.path();

        // Follows symlinks; dangling links are neither files nor directories
        match fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => subdirs.push(path),
            Ok(meta) if meta.is_file() => own_files.push(path),
            Ok(_) => {}
            Err(e) => debug!("Skipping unreadable entry {:?}: {}", path, e),
        }
    }

    subdirs.sort();
    own_files.sort();

    for subdir in subdirs {
        collect(&subdir, visited, files)?;
    }
    files.extend(own_files);
    Ok(())
}
