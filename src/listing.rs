//! Lazy, offset-cursor streaming of paged listing rows.
//!
//! The remote query engine returns fixed-size pages with an end-of-result
//! marker and its own next-offset hint (a running count carried by the last
//! row). `Rows` is an explicit iterator holding `(offset, done)` state: it
//! never re-fetches a consumed offset, terminates on any page marked last
//! (even an empty one), and holds nothing beyond the connection borrow, so
//! abandoning it mid-iteration leaks nothing. Restart is from the beginning
//! only.

use std::collections::VecDeque;

use crate::error::GridResult;
use crate::grid::{GridConnection, ListEntry, ListQuery};

pub struct Rows<'a> {
    conn: &'a mut dyn GridConnection,
    query: ListQuery,
    page_size: u32,
    offset: u64,
    buf: VecDeque<ListEntry>,
    done: bool,
}

impl<'a> Rows<'a> {
    pub fn new(conn: &'a mut dyn GridConnection, query: ListQuery, page_size: u32) -> Self {
        Self { conn, query, page_size, offset: 0, buf: VecDeque::new(), done: false }
    }

    fn fetch_next_page(&mut self) -> GridResult<()> {
        let page = self.conn.query_page(&self.query, self.offset, self.page_size)?;
        tracing::debug!(target: "gridacl::listing",
            "page offset={} rows={} is_last={}", self.offset, page.rows.len(), page.is_last);
        if page.rows.is_empty() || page.is_last {
            self.done = true;
        }
        if !self.done {
            // Advance by the server's own cursor, not by page length: skew
            // and duplicate handling are server-defined.
            self.offset = page.next_offset.unwrap_or(self.offset + page.rows.len() as u64);
        }
        self.buf.extend(page.rows);
        Ok(())
    }
}

impl Iterator for Rows<'_> {
    type Item = GridResult<ListEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.is_empty() {
            if self.done {
                return None;
            }
            if let Err(e) = self.fetch_next_page() {
                self.done = true;
                return Some(Err(e));
            }
        }
        self.buf.pop_front().map(Ok)
    }
}

/// Stream the immediate children of a collection.
pub fn children<'a>(conn: &'a mut dyn GridConnection, collection: &str, page_size: u32) -> Rows<'a> {
    Rows::new(conn, ListQuery::ChildrenOf(collection.to_string()), page_size)
}

/// Drain a child listing into memory. The walks in `crate::propagate` use
/// this for immediate-children checks, where result sets are small.
pub fn collect_children(conn: &mut dyn GridConnection, collection: &str, page_size: u32) -> GridResult<Vec<ListEntry>> {
    children(conn, collection, page_size).collect()
}
