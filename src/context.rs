//! Request-scoped correlation context, threaded explicitly through every call
//! chain. Nothing here is global or thread-local; concurrent sessions each
//! carry their own value.

use base64::Engine;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

fn gen_id() -> String {
    // 128-bit random token base64url without padding
    let mut buf = [0u8; 16];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

impl RequestContext {
    pub fn new() -> Self {
        Self { request_id: gen_id() }
    }

    /// For callers that already carry a correlation id (e.g. from an inbound
    /// request) and want grid-side logs joined to it.
    pub fn with_id(request_id: impl Into<String>) -> Self {
        Self { request_id: request_id.into() }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
