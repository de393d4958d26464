//! In-memory adapter of the storage port.
//!
//! Backs the crate's own tests and is exported so downstream consumers can
//! test against the same port without a live grid. State sits behind a shared
//! lock so the connector handle and any number of connections observe one
//! namespace; every port call is appended to a call log for assertions.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::acl::PermissionLevel;
use crate::config::GridConfig;
use crate::context::RequestContext;
use crate::error::{GridError, GridResult};
use crate::grid::{GridConnection, GridConnector, ListEntry, ListQuery, Page, ResourceKind};
use crate::paths;

/// One recorded port call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    ListGrants { path: String },
    SetGrant { path: String, principal: String, level: PermissionLevel, recursive: bool },
    RevokeGrant { path: String, principal: String, recursive: bool },
    InheritsAcl { path: String },
    IsCollection { path: String },
    GroupsOf { user: String },
    QueryPage { path: String, offset: u64, page_size: u32 },
    Close,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    kind: ResourceKind,
    inherits: bool,
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    grants: BTreeMap<String, BTreeMap<String, PermissionLevel>>,
    groups: BTreeMap<String, Vec<String>>,
    calls: Vec<Call>,
    // Connect scripting
    transient_connect_failures: u32,
    fatal_connect: bool,
    connect_attempts: u32,
    close_count: u32,
    // Remote-op fault injection: every call of this op fails
    fail_op: Option<&'static str>,
}

#[derive(Clone)]
pub struct MemGrid {
    state: Arc<RwLock<State>>,
}

impl MemGrid {
    pub fn new() -> Self {
        Self { state: Arc::new(RwLock::new(State::default())) }
    }

    /// Create a collection node, materializing missing ancestors as
    /// non-inheriting collections.
    pub fn add_collection(&self, path: &str, inherits: bool) {
        let mut st = self.state.write();
        ensure_ancestors(&mut st, path);
        st.nodes.insert(path.to_string(), Node { kind: ResourceKind::Collection, inherits });
    }

    pub fn add_object(&self, path: &str) {
        let mut st = self.state.write();
        ensure_ancestors(&mut st, path);
        st.nodes.insert(path.to_string(), Node { kind: ResourceKind::DataObject, inherits: false });
    }

    pub fn remove(&self, path: &str) {
        let mut st = self.state.write();
        st.nodes.remove(path);
        st.grants.remove(path);
        let prefix = format!("{}/", path);
        st.nodes.retain(|p, _| !p.starts_with(&prefix));
        st.grants.retain(|p, _| !p.starts_with(&prefix));
    }

    pub fn grant(&self, path: &str, principal: &str, level: PermissionLevel) {
        let mut st = self.state.write();
        apply_grant(&mut st, path, principal, level);
    }

    pub fn add_group_member(&self, group: &str, user: &str) {
        self.state.write().groups.entry(user.to_string()).or_default().push(group.to_string());
    }

    /// Script the next `n` connect attempts to fail with a retryable error.
    pub fn fail_connects(&self, n: u32) {
        self.state.write().transient_connect_failures = n;
    }

    /// Script every connect attempt to fail fatally (non-retryable).
    pub fn fail_connects_fatal(&self) {
        self.state.write().fatal_connect = true;
    }

    /// Make every call of the named port operation fail.
    pub fn fail_op(&self, op: &'static str) {
        self.state.write().fail_op = Some(op);
    }

    pub fn clear_fail_op(&self) {
        self.state.write().fail_op = None;
    }

    // ---- Inspection ----

    pub fn calls(&self) -> Vec<Call> {
        self.state.read().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.write().calls.clear();
    }

    pub fn connect_attempts(&self) -> u32 {
        self.state.read().connect_attempts
    }

    pub fn close_count(&self) -> u32 {
        self.state.read().close_count
    }

    /// Explicit grant level, `None` when absent.
    pub fn grant_level(&self, path: &str, principal: &str) -> PermissionLevel {
        self.state
            .read()
            .grants
            .get(path)
            .and_then(|m| m.get(principal).copied())
            .unwrap_or(PermissionLevel::None)
    }
}

impl Default for MemGrid {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_ancestors(st: &mut State, path: &str) {
    let mut dir = paths::dirname(path).to_string();
    let mut missing = Vec::new();
    while dir != "/" && !st.nodes.contains_key(&dir) {
        missing.push(dir.clone());
        dir = paths::dirname(&dir).to_string();
    }
    for p in missing.into_iter().rev() {
        st.nodes.insert(p, Node { kind: ResourceKind::Collection, inherits: false });
    }
}

fn apply_grant(st: &mut State, path: &str, principal: &str, level: PermissionLevel) {
    let m = st.grants.entry(path.to_string()).or_default();
    if level == PermissionLevel::None {
        m.remove(principal);
    } else {
        m.insert(principal.to_string(), level);
    }
}

fn subtree_paths(st: &State, root: &str) -> Vec<String> {
    let prefix = format!("{}/", root);
    let mut out = vec![root.to_string()];
    out.extend(st.nodes.keys().filter(|p| p.starts_with(&prefix)).cloned());
    out
}

impl GridConnector for MemGrid {
    fn connect(&self, config: &GridConfig, _ctx: &RequestContext) -> GridResult<Box<dyn GridConnection>> {
        let mut st = self.state.write();
        st.connect_attempts += 1;
        st.calls.push(Call::Connect);
        if st.fatal_connect {
            return Err(GridError::connect("authentication rejected", false));
        }
        if st.transient_connect_failures > 0 {
            st.transient_connect_failures -= 1;
            return Err(GridError::connect("connection refused", true));
        }
        Ok(Box::new(MemConnection { state: self.state.clone(), identity: config.username.clone() }))
    }
}

pub struct MemConnection {
    state: Arc<RwLock<State>>,
    identity: String,
}

impl MemConnection {
    fn check_fault(&self, op: &'static str, path: &str) -> GridResult<()> {
        if self.state.read().fail_op == Some(op) {
            return Err(GridError::remote(op, path, "injected fault"));
        }
        Ok(())
    }
}

impl GridConnection for MemConnection {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn list_grants(&mut self, path: &str) -> GridResult<Vec<(String, PermissionLevel)>> {
        self.check_fault("list_grants", path)?;
        let mut st = self.state.write();
        st.calls.push(Call::ListGrants { path: path.to_string() });
        Ok(st
            .grants
            .get(path)
            .map(|m| m.iter().map(|(p, l)| (p.clone(), *l)).collect())
            .unwrap_or_default())
    }

    fn set_grant(&mut self, path: &str, principal: &str, level: PermissionLevel, recursive: bool) -> GridResult<()> {
        self.check_fault("set_grant", path)?;
        let mut st = self.state.write();
        st.calls.push(Call::SetGrant {
            path: path.to_string(),
            principal: principal.to_string(),
            level,
            recursive,
        });
        let targets = if recursive { subtree_paths(&st, path) } else { vec![path.to_string()] };
        for p in targets {
            apply_grant(&mut st, &p, principal, level);
        }
        Ok(())
    }

    fn revoke_grant(&mut self, path: &str, principal: &str, recursive: bool) -> GridResult<()> {
        self.check_fault("revoke_grant", path)?;
        let mut st = self.state.write();
        st.calls.push(Call::RevokeGrant {
            path: path.to_string(),
            principal: principal.to_string(),
            recursive,
        });
        let targets = if recursive { subtree_paths(&st, path) } else { vec![path.to_string()] };
        for p in targets {
            apply_grant(&mut st, &p, principal, PermissionLevel::None);
        }
        Ok(())
    }

    fn inherits_acl(&mut self, collection: &str) -> GridResult<bool> {
        self.check_fault("inherits_acl", collection)?;
        let mut st = self.state.write();
        st.calls.push(Call::InheritsAcl { path: collection.to_string() });
        match st.nodes.get(collection) {
            Some(n) if n.kind == ResourceKind::Collection => Ok(n.inherits),
            Some(_) => Err(GridError::remote("inherits_acl", collection, "not a collection")),
            None => Err(GridError::remote("inherits_acl", collection, "no such collection")),
        }
    }

    fn is_collection(&mut self, path: &str) -> GridResult<bool> {
        self.check_fault("is_collection", path)?;
        let mut st = self.state.write();
        st.calls.push(Call::IsCollection { path: path.to_string() });
        match st.nodes.get(path) {
            Some(n) => Ok(n.kind == ResourceKind::Collection),
            None => Err(GridError::remote("is_collection", path, "no such path")),
        }
    }

    fn groups_of(&mut self, user: &str) -> GridResult<Vec<String>> {
        self.check_fault("groups_of", user)?;
        let mut st = self.state.write();
        st.calls.push(Call::GroupsOf { user: user.to_string() });
        Ok(st.groups.get(user).cloned().unwrap_or_default())
    }

    fn query_page(&mut self, query: &ListQuery, offset: u64, page_size: u32) -> GridResult<Page> {
        let ListQuery::ChildrenOf(parent) = query;
        self.check_fault("query_page", parent)?;
        let mut st = self.state.write();
        st.calls.push(Call::QueryPage { path: parent.clone(), offset, page_size });
        let children: Vec<ListEntry> = st
            .nodes
            .iter()
            .filter(|(p, _)| paths::dirname(p) == parent.as_str() && p.as_str() != parent.as_str())
            .map(|(p, n)| ListEntry { path: p.clone(), kind: n.kind })
            .collect();
        let total = children.len() as u64;
        let start = offset.min(total) as usize;
        let end = (offset + page_size as u64).min(total) as usize;
        let rows = children[start..end].to_vec();
        // The server-side cursor reports the running count of rows emitted so
        // far; that count is the next offset to ask for.
        let consumed = end as u64;
        Ok(Page { rows, is_last: consumed >= total, next_offset: Some(consumed) })
    }

    fn close(&mut self) -> GridResult<()> {
        self.check_fault("close", "")?;
        let mut st = self.state.write();
        st.close_count += 1;
        st.calls.push(Call::Close);
        Ok(())
    }
}
