//! Connection lifecycle tests: bounded retry on transient connect failures,
//! release on every exit path, and the deferred-release streaming hand-off.

use std::io::{Cursor, Read};

use anyhow::Result;

use gridacl::config::GridConfig;
use gridacl::context::RequestContext;
use gridacl::error::{GridError, GridResult};
use gridacl::memgrid::MemGrid;
use gridacl::session::{with_session, Session};

fn test_config() -> GridConfig {
    GridConfig {
        host: "grid.test".into(),
        zone: "tempZone".into(),
        username: "svc".into(),
        max_retries: 3,
        retry_sleep_ms: 10,
        ..GridConfig::default()
    }
}

#[test]
fn open_succeeds_after_transient_failures() -> Result<()> {
    let grid = MemGrid::new();
    grid.fail_connects(2);
    let session = Session::open(&grid, &test_config(), RequestContext::new());
    assert!(session.is_ok(), "third attempt should succeed: {:?}", session.err());
    assert_eq!(grid.connect_attempts(), 3, "two retries after the first failure");
    Ok(())
}

#[test]
fn open_gives_up_after_max_retries() {
    let grid = MemGrid::new();
    grid.fail_connects(100);
    let err = Session::open(&grid, &test_config(), RequestContext::new())
        .err()
        .expect("exhausted retries must fail");
    assert!(err.is_retryable_connect(), "last error should be the transient connect error");
    assert_eq!(grid.connect_attempts(), 3, "max_retries bounds total attempts");
}

#[test]
fn fatal_connect_error_is_not_retried() {
    let grid = MemGrid::new();
    grid.fail_connects_fatal();
    let err = Session::open(&grid, &test_config(), RequestContext::new())
        .err()
        .expect("fatal connect must fail");
    assert!(matches!(err, GridError::Connect { retryable: false, .. }));
    assert_eq!(grid.connect_attempts(), 1, "non-retryable errors surface immediately");
}

#[test]
fn run_releases_on_success() -> Result<()> {
    let grid = MemGrid::new();
    let cfg = test_config();
    let out = Session::open(&grid, &cfg, RequestContext::new())?
        .run(|conn, _ctx| Ok(conn.identity().to_string()))?;
    assert_eq!(out, "svc");
    assert_eq!(grid.close_count(), 1, "session must close exactly once");
    Ok(())
}

#[test]
fn run_releases_when_body_fails() -> Result<()> {
    let grid = MemGrid::new();
    let cfg = test_config();
    let res: GridResult<()> = Session::open(&grid, &cfg, RequestContext::new())?
        .run(|_conn, _ctx| Err(GridError::remote("set_grant", "/tempZone/x", "boom")));
    let err = res.err().expect("body error must propagate");
    assert!(matches!(err, GridError::Remote { .. }), "body error wins over close");
    assert_eq!(grid.close_count(), 1, "session must close before the error propagates");
    Ok(())
}

#[test]
fn streaming_defers_release_until_stream_close() -> Result<()> {
    let grid = MemGrid::new();
    let cfg = test_config();
    let mut handle = Session::open(&grid, &cfg, RequestContext::new())?
        .run_streaming(|_conn, _ctx| Ok(Cursor::new(b"payload".to_vec())))?;
    assert_eq!(grid.close_count(), 0, "session stays open while the stream is outstanding");

    let mut buf = String::new();
    handle.read_to_string(&mut buf)?;
    assert_eq!(buf, "payload");
    assert_eq!(grid.close_count(), 0, "reading does not release");

    handle.close()?;
    assert_eq!(grid.close_count(), 1, "closing the stream closes the session");
    Ok(())
}

#[test]
fn streaming_body_error_still_releases() -> Result<()> {
    let grid = MemGrid::new();
    let cfg = test_config();
    let res = Session::open(&grid, &cfg, RequestContext::new())?
        .run_streaming(|_conn, _ctx| -> GridResult<Cursor<Vec<u8>>> {
            Err(GridError::remote("open_stream", "/tempZone/x", "gone"))
        });
    assert!(res.is_err());
    assert_eq!(grid.close_count(), 1);
    Ok(())
}

#[test]
fn dropping_the_stream_handle_releases() -> Result<()> {
    let grid = MemGrid::new();
    let cfg = test_config();
    {
        let _handle = Session::open(&grid, &cfg, RequestContext::new())?
            .run_streaming(|_conn, _ctx| Ok(Cursor::new(Vec::new())))?;
    }
    assert_eq!(grid.close_count(), 1, "drop must release as a backstop");
    Ok(())
}

#[test]
fn with_session_wraps_open_and_run() -> Result<()> {
    let grid = MemGrid::new();
    let cfg = test_config();
    let ctx = RequestContext::with_id("req-42");
    let id = with_session(&grid, &cfg, ctx, |_conn, ctx| Ok(ctx.request_id.clone()))?;
    assert_eq!(id, "req-42", "caller-supplied correlation ids are preserved");
    assert_eq!(grid.close_count(), 1);
    Ok(())
}
