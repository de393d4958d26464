//! Post-move permission fix-up.
//!
//! Moving an entry between collections changes who can reach it: inherited
//! grants on the destination may be stale, and traversal grants on the old
//! ancestor chain may no longer guard anything. The grid only applies ACL
//! inheritance at creation time, so after a move the client must recompute
//! which grants to drop, re-derive, or patch in. Which actions run is fixed
//! entirely by the inheritance flags of the two parent collections.
//!
//! Failure semantics: the first remote error aborts the whole fix-up and
//! partial changes are not rolled back (the grid exposes no multi-object
//! transaction). Callers treat this as best-effort on top of the move, not
//! atomic with it.

use crate::acl::{self, PermissionLevel};
use crate::config::GridConfig;
use crate::context::RequestContext;
use crate::error::GridResult;
use crate::grid::GridConnection;
use crate::listing;
use crate::paths;

/// The four fix-up behaviors, keyed by (source parent inherits, destination
/// parent inherits). The exhaustive match in `plan_for` is the whole table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixPlan {
    /// src inherits, dst inherits: clear stale destination grants, then copy
    /// the destination parent's grants down.
    ResetThenInherit,
    /// src inherits, dst does not: clear stale destination grants only.
    ResetOnly,
    /// src does not inherit, dst does: drop now-pointless source-side
    /// traversal grants, then reset and re-derive the destination.
    CleanupThenResetInherit,
    /// neither inherits: drop source-side traversal grants, then patch read
    /// access down the new ancestor chain.
    CleanupThenMakeAccessible,
}

pub fn plan_for(src_inherits: bool, dst_inherits: bool) -> FixPlan {
    match (src_inherits, dst_inherits) {
        (true, true) => FixPlan::ResetThenInherit,
        (true, false) => FixPlan::ResetOnly,
        (false, true) => FixPlan::CleanupThenResetInherit,
        (false, false) => FixPlan::CleanupThenMakeAccessible,
    }
}

pub struct Propagator<'a> {
    conn: &'a mut dyn GridConnection,
    ctx: &'a RequestContext,
    zone: String,
    moving_user: String,
    admins: Vec<String>,
    page_size: u32,
}

impl<'a> Propagator<'a> {
    pub fn new(
        conn: &'a mut dyn GridConnection,
        ctx: &'a RequestContext,
        config: &GridConfig,
        moving_user: impl Into<String>,
        admins: &[String],
    ) -> Self {
        Self {
            conn,
            ctx,
            zone: config.zone.clone(),
            moving_user: moving_user.into(),
            admins: admins.to_vec(),
            page_size: config.page_size,
        }
    }

    /// Recompute grants after `src` was moved to `dst`. Source-side cleanup
    /// (when the plan calls for it) always completes before any destination
    /// action: it reads the pre-move ancestor state, while the destination
    /// actions read the post-move grantee list.
    pub fn fix_after_move(&mut self, src: &str, dst: &str, skip_source_cleanup: bool) -> GridResult<()> {
        paths::validate(src)?;
        paths::validate(dst)?;
        let src_parent = paths::dirname(src).to_string();
        let dst_parent = paths::dirname(dst).to_string();
        if src_parent == dst_parent {
            // Pure rename: the set of principals able to reach the entry is
            // unchanged.
            tracing::debug!(target: "gridacl::propagate",
                "rename within {} needs no fix-up request_id={}", src_parent, self.ctx.request_id);
            return Ok(());
        }
        let src_inherits = self.conn.inherits_acl(&src_parent)?;
        let dst_inherits = self.conn.inherits_acl(&dst_parent)?;
        let plan = plan_for(src_inherits, dst_inherits);
        tracing::info!(target: "gridacl::propagate",
            "fix-up {:?} src={} dst={} request_id={}", plan, src, dst, self.ctx.request_id);
        match plan {
            FixPlan::ResetThenInherit => {
                self.reset_perms(dst)?;
                self.inherit_perms(dst)?;
            }
            FixPlan::ResetOnly => {
                self.reset_perms(dst)?;
            }
            FixPlan::CleanupThenResetInherit => {
                if !skip_source_cleanup {
                    self.remove_obsolete_perms(src)?;
                }
                self.reset_perms(dst)?;
                self.inherit_perms(dst)?;
            }
            FixPlan::CleanupThenMakeAccessible => {
                if !skip_source_cleanup {
                    self.remove_obsolete_perms(src)?;
                }
                self.make_accessible(dst)?;
            }
        }
        Ok(())
    }

    /// Grants on `path` minus the principals propagation never touches: the
    /// moving user, the configured admins, and this session's own identity.
    fn grantees_of(&mut self, path: &str) -> GridResult<Vec<(String, PermissionLevel)>> {
        let me = self.conn.identity().to_string();
        Ok(self
            .conn
            .list_grants(path)?
            .into_iter()
            .filter(|(who, _)| who != &self.moving_user && who != &me && !self.admins.contains(who))
            .collect())
    }

    /// Strip every grantee's permission on `path`, recursively when it is a
    /// collection. Clears stale grants before re-deriving them from the new
    /// parent.
    fn reset_perms(&mut self, path: &str) -> GridResult<()> {
        let recursive = self.conn.is_collection(path)?;
        for (grantee, _) in self.grantees_of(path)? {
            tracing::debug!(target: "gridacl::propagate",
                "reset {} for {} recursive={}", path, grantee, recursive);
            self.conn.revoke_grant(path, &grantee, recursive)?;
        }
        Ok(())
    }

    /// Copy each grantee of the parent collection onto `path` at its exact
    /// level, recursively. Realizes ACL inheritance explicitly, since the
    /// grid only auto-applies it at creation time.
    fn inherit_perms(&mut self, path: &str) -> GridResult<()> {
        let parent = paths::dirname(path).to_string();
        let recursive = self.conn.is_collection(path)?;
        for (grantee, level) in self.grantees_of(&parent)? {
            tracing::debug!(target: "gridacl::propagate",
                "inherit {:?} on {} for {} recursive={}", level, path, grantee, recursive);
            self.conn.set_grant(path, &grantee, level, recursive)?;
        }
        Ok(())
    }

    /// A traversal grant on a directory is only needed while the directory
    /// still guards something its holder can read. For each grantee of the
    /// old parent, walk the ancestor chain upward revoking the grant at every
    /// ancestor that is not a base directory and has no child readable by the
    /// grantee; stop at the first ancestor that fails either test. The
    /// readable-child test inspects immediate children only.
    fn remove_obsolete_perms(&mut self, src: &str) -> GridResult<()> {
        let start = paths::dirname(src).to_string();
        for (grantee, _) in self.grantees_of(&start)? {
            let mut cur = start.clone();
            loop {
                if self.is_base_dir(&cur, &grantee) {
                    break;
                }
                if self.has_readable_child(&cur, &grantee)? {
                    break;
                }
                tracing::debug!(target: "gridacl::propagate",
                    "revoke obsolete traversal grant on {} for {}", cur, grantee);
                self.conn.revoke_grant(&cur, &grantee, false)?;
                cur = paths::dirname(&cur).to_string();
            }
        }
        Ok(())
    }

    /// A grantee who can read the moved entry must be able to traverse every
    /// ancestor down to it. Walk upward from the new parent granting read
    /// wherever the grantee cannot already read, stopping at (and leaving
    /// untouched) the first base directory. Existing write/own grants are
    /// never downgraded.
    fn make_accessible(&mut self, dst: &str) -> GridResult<()> {
        for (grantee, _) in self.grantees_of(dst)? {
            let mut cur = paths::dirname(dst).to_string();
            while !self.is_base_dir(&cur, &grantee) {
                if !acl::readable(&mut *self.conn, &grantee, &cur)? {
                    tracing::debug!(target: "gridacl::propagate",
                        "grant traversal read on {} for {}", cur, grantee);
                    self.conn.set_grant(&cur, &grantee, PermissionLevel::Read, false)?;
                }
                cur = paths::dirname(&cur).to_string();
            }
        }
        Ok(())
    }

    /// Protected ancestors the walks never cross or touch: the zone home
    /// root, the trash root, the grantee's own home, and the filesystem root
    /// as a terminal guard.
    fn is_base_dir(&self, path: &str, grantee: &str) -> bool {
        path == "/"
            || path == paths::zone_home(&self.zone)
            || path == paths::zone_trash(&self.zone)
            || path == paths::user_home(&self.zone, grantee)
    }

    fn has_readable_child(&mut self, dir: &str, grantee: &str) -> GridResult<bool> {
        for entry in listing::collect_children(&mut *self.conn, dir, self.page_size)? {
            if acl::readable(&mut *self.conn, grantee, &entry.path)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
