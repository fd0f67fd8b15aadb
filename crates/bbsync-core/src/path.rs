//! Filename handling
//!
//! The game stores scripts under its own path convention:
//!
//! - separators are always `/`
//! - a file inside a directory is addressed with exactly one leading `/`,
//!   e.g. `/lib/helpers.js`
//! - a file at the top level is addressed bare, e.g. `main.js`
//!
//! The game rejects bare filenames with a leading slash and nested
//! filenames without one, so both branches of [`canonicalize_for_wire`]
//! matter.

use std::path::{Path, PathBuf};

/// Collapse any run of `/` or `\` into a single `/` and drop `.` segments.
///
/// A leading or trailing separator in the input is kept (as a single `/`).
pub fn collapse_separators(raw: &str) -> String {
    let is_sep = |c: char| c == '/' || c == '\\';

    let segments: Vec<&str> = raw
        .split(is_sep)
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();

    let mut out = String::with_capacity(raw.len());
    if raw.starts_with(is_sep) {
        out.push('/');
    }
    out.push_str(&segments.join("/"));
    if raw.ends_with(is_sep) && !segments.is_empty() {
        out.push('/');
    }
    out
}

/// Normalize a user-provided script root.
///
/// The result has no leading `./` or `/` and exactly one trailing `/`. The
/// workspace root itself (`""`, `"."`, `"./"`) normalizes to `"/"`. Hidden
/// directory names such as `.scripts` keep their dot.
pub fn normalize_script_root(raw: &str) -> String {
    let collapsed = collapse_separators(raw.trim());
    let trimmed = collapsed.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("{}/", trimmed)
    }
}

/// Convert a file path into the game's filename form.
///
/// The first workspace root that contains `absolute_path` is stripped, then
/// the script root, then spaces become `-`. Paths outside every workspace
/// root fall back to their final segment, so directory structure is lost
/// for them.
pub fn normalize_filename(
    absolute_path: &Path,
    script_root: &str,
    workspace_roots: &[PathBuf],
) -> String {
    let path = collapse_separators(&absolute_path.to_string_lossy());

    for root in workspace_roots {
        let root = collapse_separators(&root.to_string_lossy());
        let Some(relative) = strip_dir_prefix(&path, root.trim_end_matches('/')) else {
            continue;
        };

        let relative = relative.trim_start_matches('/');
        let script_root = normalize_script_root(script_root);
        let prefix = script_root.trim_start_matches('/');
        let relative = if prefix.is_empty() {
            relative
        } else {
            relative.strip_prefix(prefix).unwrap_or(relative)
        };

        return relative.replace(' ', "-");
    }

    path.rsplit('/')
        .next()
        .unwrap_or_default()
        .replace(' ', "-")
}

/// Apply the game's leading-slash rule to a filename.
///
/// Idempotent: canonicalizing an already canonical filename is a no-op.
pub fn canonicalize_for_wire(filename: &str) -> String {
    let collapsed = collapse_separators(filename);
    let bare = collapsed.trim_start_matches('/');

    if bare.contains('/') {
        format!("/{}", bare)
    } else {
        bare.to_string()
    }
}

/// Strip `root` from `path` only when it ends on a segment boundary.
fn strip_dir_prefix<'a>(path: &'a str, root: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(root)?;
    if root.is_empty() || rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}
