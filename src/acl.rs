//! Permission levels and effective-grant resolution.
//!
//! A principal's effective grant on a resource is the maximum explicit level
//! across the principal itself and every group it belongs to. Grants are
//! owned by the grid and never cached here: each decision re-reads current
//! grants, because they may have changed between deciding to act and acting.

use serde::{Deserialize, Serialize};

use crate::error::GridResult;
use crate::grid::GridConnection;

/// Totally ordered: `None < Read < Write < Own`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    None,
    Read,
    Write,
    Own,
}

/// Derived view of a resolved level. `own` implies `write` implies `read` by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EffectiveGrant {
    pub read: bool,
    pub write: bool,
    pub own: bool,
}

impl EffectiveGrant {
    pub fn from_level(level: PermissionLevel) -> Self {
        Self {
            read: level >= PermissionLevel::Read,
            write: level >= PermissionLevel::Write,
            own: level == PermissionLevel::Own,
        }
    }
}

/// Principal plus the groups it belongs to, per the grid's membership records.
fn group_closure(conn: &mut dyn GridConnection, principal: &str) -> GridResult<Vec<String>> {
    let mut closure = vec![principal.to_string()];
    closure.extend(conn.groups_of(principal)?);
    Ok(closure)
}

/// Maximum explicit level on `path` across the principal's group closure.
pub fn effective_level(conn: &mut dyn GridConnection, principal: &str, path: &str) -> GridResult<PermissionLevel> {
    let closure = group_closure(conn, principal)?;
    let grants = conn.list_grants(path)?;
    let mut level = PermissionLevel::None;
    for (who, lvl) in grants {
        if closure.iter().any(|c| c == &who) && lvl > level {
            level = lvl;
        }
    }
    Ok(level)
}

pub fn effective_grant(conn: &mut dyn GridConnection, principal: &str, path: &str) -> GridResult<EffectiveGrant> {
    Ok(EffectiveGrant::from_level(effective_level(conn, principal, path)?))
}

pub fn readable(conn: &mut dyn GridConnection, principal: &str, path: &str) -> GridResult<bool> {
    Ok(effective_grant(conn, principal, path)?.read)
}

pub fn writable(conn: &mut dyn GridConnection, principal: &str, path: &str) -> GridResult<bool> {
    Ok(effective_grant(conn, principal, path)?.write)
}

pub fn owns(conn: &mut dyn GridConnection, principal: &str, path: &str) -> GridResult<bool> {
    Ok(effective_grant(conn, principal, path)?.own)
}
