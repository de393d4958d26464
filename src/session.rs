//! Connection lifecycle: bounded-retry open, scoped acquisition, and the
//! streaming hand-off case where release is deferred to the stream's close.

use std::io::Read;
use std::thread;

use crate::config::GridConfig;
use crate::context::RequestContext;
use crate::error::GridResult;
use crate::grid::{GridConnection, GridConnector};
use crate::tprintln;

pub struct Session {
    conn: Option<Box<dyn GridConnection>>,
    ctx: RequestContext,
}

impl Session {
    /// Connect with bounded retry. Only the transient connect class is
    /// retried; any other error, or retry exhaustion, surfaces the last
    /// error. `max_retries` bounds total attempts, so 3 means at most three
    /// connect calls.
    pub fn open(connector: &dyn GridConnector, config: &GridConfig, ctx: RequestContext) -> GridResult<Session> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match connector.connect(config, &ctx) {
                Ok(conn) => {
                    tracing::debug!(target: "gridacl::session",
                        "connected request_id={} user={} attempt={}", ctx.request_id, config.username, attempt);
                    return Ok(Session { conn: Some(conn), ctx });
                }
                Err(e) if e.is_retryable_connect() && attempt < config.max_retries.max(1) => {
                    tracing::debug!(target: "gridacl::session",
                        "connect attempt {} failed request_id={}: {}", attempt, ctx.request_id, e);
                    thread::sleep(config.retry_sleep());
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn request_id(&self) -> &str {
        &self.ctx.request_id
    }

    /// Run `body` against the connection and release the session on every
    /// exit path, including a body error. A close failure after a successful
    /// body becomes the result; a body error wins over a close failure.
    pub fn run<T>(
        mut self,
        body: impl FnOnce(&mut dyn GridConnection, &RequestContext) -> GridResult<T>,
    ) -> GridResult<T> {
        let out = {
            let conn = self.conn.as_mut().expect("session already released");
            body(conn.as_mut(), &self.ctx)
        };
        let closed = self.release();
        match out {
            Err(e) => Err(e),
            Ok(v) => closed.map(|_| v),
        }
    }

    /// Streaming variant: if the body hands back an open reader, release is
    /// deferred to the returned handle, whose close (or drop) closes this
    /// session too. A body error still releases before propagating.
    pub fn run_streaming<R: Read>(
        mut self,
        body: impl FnOnce(&mut dyn GridConnection, &RequestContext) -> GridResult<R>,
    ) -> GridResult<StreamHandle<R>> {
        let out = {
            let conn = self.conn.as_mut().expect("session already released");
            body(conn.as_mut(), &self.ctx)
        };
        match out {
            Ok(stream) => Ok(StreamHandle { stream, session: Some(self) }),
            Err(e) => {
                let _ = self.release();
                Err(e)
            }
        }
    }

    fn release(&mut self) -> GridResult<()> {
        match self.conn.take() {
            Some(mut conn) => {
                tprintln!("session.release request_id={}", self.ctx.request_id);
                conn.close()
            }
            None => Ok(()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Best-effort; normal paths release explicitly through run/close.
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = conn.close() {
                tracing::debug!(target: "gridacl::session",
                    "close on drop failed request_id={}: {}", self.ctx.request_id, e);
            }
        }
    }
}

/// A data stream still backed by its session. Reading proxies to the inner
/// reader; closing (or dropping) the handle closes the session.
pub struct StreamHandle<R: Read> {
    stream: R,
    session: Option<Session>,
}

impl<R: Read> StreamHandle<R> {
    pub fn close(mut self) -> GridResult<()> {
        match self.session.take() {
            Some(mut s) => s.release(),
            None => Ok(()),
        }
    }
}

impl<R: Read> Read for StreamHandle<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stream.read(buf)
    }
}

impl<R: Read> Drop for StreamHandle<R> {
    fn drop(&mut self) {
        if let Some(mut s) = self.session.take() {
            let _ = s.release();
        }
    }
}

/// Convenience: open a session and run one scoped body.
pub fn with_session<T>(
    connector: &dyn GridConnector,
    config: &GridConfig,
    ctx: RequestContext,
    body: impl FnOnce(&mut dyn GridConnection, &RequestContext) -> GridResult<T>,
) -> GridResult<T> {
    Session::open(connector, config, ctx)?.run(body)
}
