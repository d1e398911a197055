use http::{Extensions, Method, StatusCode};

use crate::body::Body;
use crate::freshness;
use crate::query::Query;
use crate::request::Request;
use crate::response::Response;

/// Per-request root handed down the middleware chain. Owns the two facades
/// plus a typed state bag middleware use to pass values downstream.
///
/// The common accessors of both facades are forwarded here so short
/// middleware read naturally; anything less common is reached through
/// [`request`](Context::request) and [`response`](Context::response).
#[derive(Debug)]
pub struct Context {
    request: Request,
    response: Response,
    state: Extensions,
    original_url: String,
    auto_respond: bool,
}

impl Context {
    pub(crate) fn new(request: Request, response: Response) -> Self {
        let original_url = request.url().to_owned();
        Self { request, response, state: Extensions::new(), original_url, auto_respond: true }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Typed per-request storage shared along the chain.
    pub fn state(&self) -> &Extensions {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut Extensions {
        &mut self.state
    }

    /// The target as it arrived, before any middleware rewrote it.
    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    /// Whether the finalizer writes the staged response. Turned off by
    /// middleware that take over the raw transport.
    pub fn auto_respond(&self) -> bool {
        self.auto_respond
    }

    pub fn set_auto_respond(&mut self, auto_respond: bool) {
        self.auto_respond = auto_respond;
    }

    // Request forwards.

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn url(&self) -> &str {
        self.request.url()
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn querystring(&self) -> &str {
        self.request.querystring()
    }

    pub fn query(&self) -> &Query {
        self.request.query()
    }

    pub fn headers(&self) -> &http::HeaderMap {
        self.request.headers()
    }

    pub fn host(&self) -> String {
        self.request.host()
    }

    pub fn ip(&self) -> &str {
        self.request.ip()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    // Response forwards.

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.response.set_status(status);
    }

    pub fn body(&self) -> &Body {
        self.response.body()
    }

    pub fn set_body<B: Into<Body>>(&mut self, body: B) {
        self.response.set_body(body);
    }

    pub fn redirect(&mut self, location: &str) -> crate::error::Result<()> {
        self.response.redirect(location)
    }

    /// True when the client copy is still valid for what this response is
    /// about to carry. Only meaningful for GET/HEAD with a 2xx or 304
    /// staged; anything else is never fresh.
    pub fn is_fresh(&self) -> bool {
        let method = self.request.method();
        if method != Method::GET && method != Method::HEAD {
            return false;
        }
        let status = self.response.status();
        if !status.is_success() && status != StatusCode::NOT_MODIFIED {
            return false;
        }
        freshness::fresh(self.request.headers(), self.response.headers())
    }

    pub fn is_stale(&self) -> bool {
        !self.is_fresh()
    }
}
