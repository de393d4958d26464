//! Logical grid path helpers and length validation
//! ------------------------------------------------
//! Grid paths are absolute, '/'-separated logical identifiers, never OS
//! paths. Length limits are imposed by the grid; they are enforced here so a
//! bad path is rejected before any network call is issued.

use crate::error::{GridError, GridResult, PathLengthKind};

pub const MAX_PATH_LEN: usize = 1067;
pub const MAX_DIR_LEN: usize = 640;
pub const MAX_NAME_LEN: usize = MAX_PATH_LEN - MAX_DIR_LEN;

/// Validate a path against the grid's length limits.
/// Checks run in order (full path, dirname, basename) and short-circuit on
/// the first violation. Callers run this for every path parameter they
/// accept, before any remote call.
pub fn validate(path: &str) -> GridResult<()> {
    if path.len() > MAX_PATH_LEN {
        return Err(GridError::path_length(PathLengthKind::FullPath, path, path.len(), MAX_PATH_LEN));
    }
    let dir = dirname(path);
    if dir.len() > MAX_DIR_LEN {
        return Err(GridError::path_length(PathLengthKind::Dirname, path, dir.len(), MAX_DIR_LEN));
    }
    let name = basename(path);
    if name.len() > MAX_NAME_LEN {
        return Err(GridError::path_length(PathLengthKind::Basename, path, name.len(), MAX_NAME_LEN));
    }
    Ok(())
}

/// Parent of a logical path. `dirname("/a/b") == "/a"`, `dirname("/a") == "/"`,
/// and the root is its own parent.
pub fn dirname(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    match trimmed.rsplit_once('/') {
        Some(("", _)) => "/",
        Some((dir, _)) => dir,
        None => "/",
    }
}

/// Final segment of a logical path; empty for the root.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((_, name)) => name,
        None => trimmed,
    }
}

pub fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), name)
    }
}

// ---- Protected base directories of a zone ----
// Propagation walks never strip or patch access above these.

#[inline]
pub fn zone_home(zone: &str) -> String { format!("/{}/home", zone) }

#[inline]
pub fn zone_trash(zone: &str) -> String { format!("/{}/trash", zone) }

#[inline]
pub fn user_home(zone: &str, user: &str) -> String { format!("/{}/home/{}", zone, user) }
