use http::request::Parts;
use http::{HeaderMap, Method, StatusCode, Uri, Version};
use mime::Mime;
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use std::net::IpAddr;
use std::sync::Arc;

use crate::accept::Accept;
use crate::app::Config;
use crate::body::InboundBody;
use crate::error::{HttpError, Result};
use crate::query::Query;
use crate::transport::ConnectionInfo;

/// Read side of one exchange: the parsed head, the consumable payload and
/// everything derived from them.
///
/// Derivations that cost something to compute (`uri`, `query`, `accept`,
/// `ip`) are memoized on first read. Rewriting the target through
/// [`set_url`](Request::set_url) and friends drops the affected caches, so
/// rewriting middleware always observes the current target.
#[derive(Debug)]
pub struct Request {
    parts: Parts,
    url: String,
    body: Option<InboundBody>,
    conn: ConnectionInfo,
    config: Arc<Config>,
    cached_uri: OnceCell<Uri>,
    cached_query: OnceCell<Query>,
    cached_accept: OnceCell<Accept>,
    cached_ip: OnceCell<String>,
}

impl Request {
    pub(crate) fn new(parts: Parts, body: InboundBody, conn: ConnectionInfo, config: Arc<Config>) -> Self {
        let url = parts.uri.to_string();
        Self {
            parts,
            url,
            body: Some(body),
            conn,
            config,
            cached_uri: OnceCell::new(),
            cached_query: OnceCell::new(),
            cached_accept: OnceCell::new(),
            cached_ip: OnceCell::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.parts.method = method;
    }

    pub fn version(&self) -> Version {
        self.parts.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.parts.headers
    }

    /// Header value as text. `referrer` and `referer` are interchangeable.
    pub fn header(&self, name: &str) -> Option<&str> {
        let value = if name.eq_ignore_ascii_case("referrer") || name.eq_ignore_ascii_case("referer") {
            self.parts.headers.get(http::header::REFERER).or_else(|| self.parts.headers.get("referrer"))
        } else {
            self.parts.headers.get(name)
        };
        value.and_then(|v| v.to_str().ok())
    }

    /// Request target as received, or as last rewritten.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url<S: Into<String>>(&mut self, url: S) {
        self.url = url.into();
        self.invalidate_target_caches();
    }

    /// Parsed form of [`url`](Request::url). An unparseable target degrades
    /// to `/` instead of failing.
    pub fn uri(&self) -> &Uri {
        self.cached_uri.get_or_init(|| self.url.parse().unwrap_or_default())
    }

    pub fn path(&self) -> &str {
        self.uri().path()
    }

    /// Replaces the path, keeping the query string.
    pub fn set_path(&mut self, path: &str) {
        let query = self.querystring().to_owned();
        let mut url = path.to_owned();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        self.url = url;
        self.invalidate_target_caches();
    }

    /// Raw query string without the leading `?`.
    pub fn querystring(&self) -> &str {
        self.uri().query().unwrap_or("")
    }

    /// Replaces the query string, keeping the path.
    pub fn set_querystring(&mut self, querystring: &str) {
        let mut url = self.path().to_owned();
        if !querystring.is_empty() {
            url.push('?');
            url.push_str(querystring);
        }
        self.url = url;
        self.invalidate_target_caches();
    }

    /// Query string parsed into an ordered multimap, memoized per target.
    pub fn query(&self) -> &Query {
        self.cached_query.get_or_init(|| Query::parse(self.querystring()))
    }

    pub fn set_query(&mut self, query: &Query) {
        self.set_querystring(&query.encode());
    }

    /// Deserializes the query string into a typed structure, including
    /// nested bracket syntax. A shape mismatch is the caller's fault, so
    /// the failure carries a 400.
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_qs::from_str(self.querystring())
            .map_err(|e| HttpError::new(StatusCode::BAD_REQUEST, e.to_string()))
    }

    /// `protocol://host` for this exchange.
    pub fn origin(&self) -> String {
        format!("{}://{}", self.protocol(), self.host())
    }

    /// Absolute form of the current target.
    pub fn href(&self) -> String {
        if self.url.starts_with("http://") || self.url.starts_with("https://") {
            self.url.clone()
        } else {
            format!("{}{}", self.origin(), self.url)
        }
    }

    /// `host:port` for this exchange. Prefers `X-Forwarded-Host` when proxy
    /// mode is on, then the protocol-level authority on HTTP/2+, then the
    /// `Host` header. Only the first entry of a comma-separated value
    /// counts.
    pub fn host(&self) -> String {
        let forwarded = if self.config.proxy { self.header("x-forwarded-host") } else { None };
        let host = forwarded
            .or_else(|| {
                (self.parts.version >= Version::HTTP_2)
                    .then(|| self.parts.uri.authority().map(|a| a.as_str()))
                    .flatten()
            })
            .or_else(|| self.header("host"))
            .unwrap_or("");
        host.split(',').next().unwrap_or("").trim().to_owned()
    }

    /// Host without the port. Bracketed IPv6 literals keep their brackets.
    pub fn hostname(&self) -> String {
        let host = self.host();
        if host.starts_with('[') {
            match host.find(']') {
                Some(end) => host[..=end].to_owned(),
                None => String::new(),
            }
        } else {
            host.split(':').next().unwrap_or("").to_owned()
        }
    }

    /// Subdomain labels, ordered from the label closest to the registered
    /// domain outward. `www.api.example.com` with the default offset of 2
    /// yields `["api", "www"]`. IP hosts have none.
    pub fn subdomains(&self) -> Vec<String> {
        let hostname = self.hostname();
        let bare = hostname.trim_start_matches('[').trim_end_matches(']');
        if bare.is_empty() || bare.parse::<IpAddr>().is_ok() {
            return Vec::new();
        }
        hostname
            .split('.')
            .rev()
            .skip(self.config.subdomain_offset)
            .map(str::to_owned)
            .collect()
    }

    /// `https` when the connection itself is encrypted; otherwise the first
    /// `X-Forwarded-Proto` entry when proxy mode is on; otherwise `http`.
    pub fn protocol(&self) -> String {
        if self.conn.encrypted {
            return "https".to_owned();
        }
        if self.config.proxy {
            if let Some(proto) = self.header("x-forwarded-proto") {
                let first = proto.split(',').next().unwrap_or("").trim();
                if !first.is_empty() {
                    return first.to_owned();
                }
            }
        }
        "http".to_owned()
    }

    pub fn secure(&self) -> bool {
        self.protocol() == "https"
    }

    /// Forwarding chain from the configured proxy header. Empty unless
    /// proxy mode is on. When a maximum is configured, only that many
    /// trailing entries survive.
    pub fn ips(&self) -> Vec<String> {
        if !self.config.proxy {
            return Vec::new();
        }
        let Some(value) = self.header(self.config.proxy_ip_header.as_str()) else {
            return Vec::new();
        };
        let mut ips: Vec<String> =
            value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect();
        let max = self.config.max_ips_count;
        if max > 0 && ips.len() > max {
            ips = ips.split_off(ips.len() - max);
        }
        ips
    }

    /// Best guess at the client address: head of the forwarding chain, or
    /// the socket peer. Cached after the first read.
    pub fn ip(&self) -> &str {
        self.cached_ip.get_or_init(|| {
            self.ips().into_iter().next().unwrap_or_else(|| {
                self.conn.remote_addr.map(|addr| addr.ip().to_string()).unwrap_or_default()
            })
        })
    }

    /// Negotiation helper parsed from the `Accept` header, memoized.
    pub fn accept(&self) -> &Accept {
        self.cached_accept.get_or_init(|| Accept::parse(self.header("accept")))
    }

    /// Picks the candidate the client prefers.
    pub fn accepts<'a>(&self, candidates: &'a [Mime]) -> Option<&'a Mime> {
        self.accept().negotiate(candidates)
    }

    /// Declared payload length, when the client sent one.
    pub fn length(&self) -> Option<u64> {
        self.header("content-length").and_then(|v| v.parse().ok())
    }

    pub fn content_type(&self) -> Option<Mime> {
        self.header("content-type").and_then(|v| v.parse().ok())
    }

    pub fn charset(&self) -> Option<String> {
        self.content_type()
            .and_then(|m| m.get_param(mime::CHARSET).map(|c| c.as_str().to_owned()))
    }

    pub fn is_idempotent(&self) -> bool {
        const METHODS: [Method; 6] =
            [Method::GET, Method::HEAD, Method::PUT, Method::DELETE, Method::OPTIONS, Method::TRACE];
        METHODS.contains(self.method())
    }

    pub fn body(&self) -> Option<&InboundBody> {
        self.body.as_ref()
    }

    /// Hands out the payload. It can be taken exactly once; later calls
    /// return `None`.
    pub fn take_body(&mut self) -> Option<InboundBody> {
        self.body.take()
    }

    pub fn conn(&self) -> &ConnectionInfo {
        &self.conn
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn invalidate_target_caches(&mut self) {
        self.cached_uri.take();
        self.cached_query.take();
    }
}
