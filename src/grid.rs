//! The storage port: the narrow interface this crate needs from the remote
//! grid. One production adapter talks the real wire protocol (out of scope
//! here); `crate::memgrid` provides the in-memory adapter used by tests.
//! Adapters are selected by dependency injection, never by inheritance.

use serde::{Deserialize, Serialize};

use crate::acl::PermissionLevel;
use crate::config::GridConfig;
use crate::context::RequestContext;
use crate::error::GridResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Collection,
    DataObject,
}

/// One row of a paged listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEntry {
    pub path: String,
    pub kind: ResourceKind,
}

/// A page from the remote query engine. `next_offset` is the endpoint's own
/// notion of the next offset (carried by the last row's running count), not
/// necessarily `offset + rows.len()`.
#[derive(Debug, Clone)]
pub struct Page {
    pub rows: Vec<ListEntry>,
    pub is_last: bool,
    pub next_offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListQuery {
    /// Immediate children (collections and data objects) of a collection.
    ChildrenOf(String),
}

/// A live, exclusively-owned connection to the grid. One logical operation
/// owns it for its whole lifetime; it is never shared across operations.
pub trait GridConnection {
    /// The principal this connection is authenticated as.
    fn identity(&self) -> &str;

    /// Explicit grants on `path`. At most one entry per principal; absence
    /// means no access.
    fn list_grants(&mut self, path: &str) -> GridResult<Vec<(String, PermissionLevel)>>;

    fn set_grant(&mut self, path: &str, principal: &str, level: PermissionLevel, recursive: bool) -> GridResult<()>;

    fn revoke_grant(&mut self, path: &str, principal: &str, recursive: bool) -> GridResult<()>;

    /// Whether new children of `collection` copy its ACL at creation time.
    fn inherits_acl(&mut self, collection: &str) -> GridResult<bool>;

    fn is_collection(&mut self, path: &str) -> GridResult<bool>;

    /// Groups the user belongs to (direct membership).
    fn groups_of(&mut self, user: &str) -> GridResult<Vec<String>>;

    fn query_page(&mut self, query: &ListQuery, offset: u64, page_size: u32) -> GridResult<Page>;

    fn close(&mut self) -> GridResult<()>;
}

/// Connection factory. Implementations perform one connect attempt per call;
/// retry policy lives in `crate::session`, not in the adapter.
pub trait GridConnector: Send + Sync {
    fn connect(&self, config: &GridConfig, ctx: &RequestContext) -> GridResult<Box<dyn GridConnection>>;
}
