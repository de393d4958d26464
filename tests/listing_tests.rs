//! Paged listing tests: offset-cursor advancement, termination, and the
//! server-defined next-offset hint.

use std::collections::HashSet;

use anyhow::Result;

use gridacl::acl::PermissionLevel;
use gridacl::config::GridConfig;
use gridacl::context::RequestContext;
use gridacl::error::GridResult;
use gridacl::grid::{GridConnection, GridConnector, ListEntry, ListQuery, Page, ResourceKind};
use gridacl::listing;
use gridacl::memgrid::{Call, MemGrid};

fn test_config() -> GridConfig {
    GridConfig {
        host: "grid.test".into(),
        zone: "tempZone".into(),
        username: "svc".into(),
        retry_sleep_ms: 10,
        ..GridConfig::default()
    }
}

fn connect(grid: &MemGrid) -> Box<dyn GridConnection> {
    grid.connect(&test_config(), &RequestContext::new()).expect("connect")
}

#[test]
fn three_pages_of_fifty() -> Result<()> {
    let grid = MemGrid::new();
    let parent = "/tempZone/home/alice/big";
    grid.add_collection(parent, false);
    for i in 0..150 {
        grid.add_object(&format!("{}/obj{:03}", parent, i));
    }
    let mut conn = connect(&grid);
    grid.clear_calls();

    let rows: Vec<ListEntry> = listing::children(conn.as_mut(), parent, 50).collect::<GridResult<_>>()?;
    assert_eq!(rows.len(), 150, "all rows must be yielded");
    let unique: HashSet<&str> = rows.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(unique.len(), 150, "no duplicate rows");

    let fetches: Vec<(u64, u32)> = grid
        .calls()
        .iter()
        .filter_map(|c| match c {
            Call::QueryPage { offset, page_size, .. } => Some((*offset, *page_size)),
            _ => None,
        })
        .collect();
    assert_eq!(fetches, vec![(0, 50), (50, 50), (100, 50)], "exactly three fetches at the expected offsets");
    Ok(())
}

#[test]
fn empty_collection_terminates_on_first_page() -> Result<()> {
    let grid = MemGrid::new();
    let parent = "/tempZone/home/alice/empty";
    grid.add_collection(parent, false);
    let mut conn = connect(&grid);
    grid.clear_calls();

    let rows: Vec<ListEntry> = listing::children(conn.as_mut(), parent, 50).collect::<GridResult<_>>()?;
    assert!(rows.is_empty());
    let fetches = grid.calls().iter().filter(|c| matches!(c, Call::QueryPage { .. })).count();
    assert_eq!(fetches, 1, "an empty page marked last must stop the stream");
    Ok(())
}

#[test]
fn abandoning_mid_iteration_is_safe() -> Result<()> {
    let grid = MemGrid::new();
    let parent = "/tempZone/home/alice/partial";
    grid.add_collection(parent, false);
    for i in 0..120 {
        grid.add_object(&format!("{}/obj{:03}", parent, i));
    }
    let mut conn = connect(&grid);
    grid.clear_calls();

    let taken: Vec<ListEntry> = listing::children(conn.as_mut(), parent, 50)
        .take(10)
        .collect::<GridResult<_>>()?;
    assert_eq!(taken.len(), 10);
    let fetches = grid.calls().iter().filter(|c| matches!(c, Call::QueryPage { .. })).count();
    assert_eq!(fetches, 1, "only the first page should have been fetched");

    // The connection remains usable for a fresh, restarted stream.
    let all: Vec<ListEntry> = listing::children(conn.as_mut(), parent, 50).collect::<GridResult<_>>()?;
    assert_eq!(all.len(), 120);
    Ok(())
}

/// A connection whose pages carry a next-offset hint that differs from
/// `offset + rows.len()`: the cursor must follow the hint, never its own
/// arithmetic.
struct SkewedConn {
    total: u64,
    skew: u64,
    requested: Vec<u64>,
}

impl GridConnection for SkewedConn {
    fn identity(&self) -> &str {
        "svc"
    }
    fn list_grants(&mut self, _path: &str) -> GridResult<Vec<(String, PermissionLevel)>> {
        unreachable!("listing only")
    }
    fn set_grant(&mut self, _p: &str, _w: &str, _l: PermissionLevel, _r: bool) -> GridResult<()> {
        unreachable!("listing only")
    }
    fn revoke_grant(&mut self, _p: &str, _w: &str, _r: bool) -> GridResult<()> {
        unreachable!("listing only")
    }
    fn inherits_acl(&mut self, _c: &str) -> GridResult<bool> {
        unreachable!("listing only")
    }
    fn is_collection(&mut self, _p: &str) -> GridResult<bool> {
        unreachable!("listing only")
    }
    fn groups_of(&mut self, _u: &str) -> GridResult<Vec<String>> {
        unreachable!("listing only")
    }
    fn query_page(&mut self, _q: &ListQuery, offset: u64, page_size: u32) -> GridResult<Page> {
        self.requested.push(offset);
        let remaining = self.total.saturating_sub(offset);
        let count = remaining.min(page_size as u64);
        let rows = (0..count)
            .map(|i| ListEntry { path: format!("/x/row{}", offset + i), kind: ResourceKind::DataObject })
            .collect();
        let consumed = offset + count;
        Ok(Page {
            rows,
            is_last: consumed >= self.total,
            // The endpoint reports a cursor further along than the row count
            // (server-side duplicate suppression).
            next_offset: Some(consumed + self.skew),
        })
    }
    fn close(&mut self) -> GridResult<()> {
        Ok(())
    }
}

#[test]
fn cursor_follows_server_hint_not_page_length() -> Result<()> {
    let mut conn = SkewedConn { total: 30, skew: 5, requested: Vec::new() };
    let rows: Vec<ListEntry> =
        listing::children(&mut conn, "/x", 10).collect::<GridResult<_>>()?;
    // Pages at 0 (rows 0..10, hint 15), 15 (rows 15..25, hint 30), 30 (empty, last).
    assert_eq!(conn.requested, vec![0, 15, 30]);
    assert_eq!(rows.len(), 20);
    Ok(())
}
