//! Oracle
//!
//! An oracle answers one question: what does the target echo back for this remote path.
use crate::request_template::{InlineTemplate, ReqTemplateFile, RequestTemplate};

use anyhow::{Context, Result};

use hyper::client::HttpConnector;
use hyper::{body, Body, Client, Request, StatusCode};

use log::{debug, info};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};

use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

/// Characters left alone when the path is put into the request.
const PATH_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Errors that keep an oracle from giving a definitive answer.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("could not build request for {path}: {reason}")]
    Request { path: String, reason: String },
    #[error("request for {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: hyper::Error,
    },
    #[error("request for {path} timed out after {timeout:?}")]
    Timeout { path: String, timeout: Duration },
    #[error("response for {path} is not JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("response for {path} has no string field {field}")]
    MissingField { path: String, field: String },
}

/// Source of remote content.
pub trait Oracle {
    /// Fetch the content of a remote path.
    ///
    /// `Ok(None)` is a definitive "nothing here", e.g. the target answered with an error
    /// status. `Err` means the exchange itself went wrong.
    fn fetch(&self, path: &str) -> Result<Option<String>, OracleError>;
}

impl<O: Oracle + ?Sized> Oracle for &O {
    fn fetch(&self, path: &str) -> Result<Option<String>, OracleError> {
        (**self).fetch(path)
    }
}

impl<O: Oracle + ?Sized> Oracle for Box<O> {
    fn fetch(&self, path: &str) -> Result<Option<String>, OracleError> {
        (**self).fetch(path)
    }
}

/// Where the request template comes from.
#[derive(Clone, Debug)]
pub enum TemplateSource {
    /// Raw HTTP request file
    File(PathBuf),
    Inline(InlineTemplate),
}

/// Everything an [HttpOracle] needs to talk to one target.
#[derive(Clone, Debug)]
pub struct OracleConfig {
    pub template: TemplateSource,
    /// Regex marking where the path goes in the template
    pub marker: String,
    /// Response field holding the echoed content. A leading '/' makes it a JSON pointer.
    pub field: String,
    pub timeout: Duration,
}

/// Percent-encode a remote path for use in the payload.
pub fn encode_path(path: &str) -> String {
    utf8_percent_encode(path, PATH_SET).to_string()
}

/// Pull the echoed content out of a JSON response body, trimmed of surrounding whitespace.
pub fn extract_field(raw: &[u8], field: &str, path: &str) -> Result<String, OracleError> {
    let json: Value = serde_json::from_slice(raw).map_err(|source| OracleError::Json {
        path: path.to_owned(),
        source,
    })?;
    let value = if field.starts_with('/') {
        json.pointer(field)
    } else {
        json.get(field)
    };
    value
        .and_then(Value::as_str)
        .map(|content| content.trim().to_owned())
        .ok_or_else(|| OracleError::MissingField {
            path: path.to_owned(),
            field: field.to_owned(),
        })
}

/// Oracle sending one templated HTTP request per path.
///
/// The client runs on a private current-thread runtime and every fetch blocks until the
/// response is in or the timeout hits, so only one request is ever in flight.
pub struct HttpOracle {
    runtime: Runtime,
    client: Client<HttpConnector>,
    req_templ: RequestTemplate,
    field: String,
    timeout: Duration,
}

impl HttpOracle {
    /// Create new HttpOracle
    pub fn new(config: OracleConfig) -> Result<Self> {
        let marker = Regex::new(&config.marker)
            .with_context(|| format!("Invalid marker: {}", config.marker))?;
        let req_templ = match &config.template {
            TemplateSource::File(path) => RequestTemplate::try_from(ReqTemplateFile::new(
                File::open(path).with_context(|| format!("Could not open {}", path.display()))?,
                &config.marker,
            )?)?,
            TemplateSource::Inline(settings) => RequestTemplate::inline(settings, marker)?,
        };
        Ok(HttpOracle {
            runtime: Builder::new_current_thread().enable_all().build()?,
            client: Client::builder().pool_max_idle_per_host(0).build_http(),
            req_templ,
            field: config.field,
            timeout: config.timeout,
        })
    }

    /// Send a single request, returns the status and the whole body
    async fn send_req(&self, req: Request<Body>) -> Result<(StatusCode, body::Bytes), hyper::Error> {
        let resp = self.client.request(req).await?;
        let status = resp.status();
        let raw = body::to_bytes(resp.into_body()).await?;
        Ok((status, raw))
    }
}

impl Oracle for HttpOracle {
    fn fetch(&self, path: &str) -> Result<Option<String>, OracleError> {
        let req = self
            .req_templ
            .replace_then_request(&encode_path(path))
            .map_err(|err| OracleError::Request {
                path: path.to_owned(),
                reason: format!("{:#}", err),
            })?;

        let (status, raw) = self
            .runtime
            .block_on(async { tokio::time::timeout(self.timeout, self.send_req(req)).await })
            .map_err(|_| OracleError::Timeout {
                path: path.to_owned(),
                timeout: self.timeout,
            })?
            .map_err(|source| OracleError::Transport {
                path: path.to_owned(),
                source,
            })?;

        if status != StatusCode::OK {
            info!("error code {}, skip", status);
            return Ok(None);
        }
        debug!("response: {}", String::from_utf8_lossy(&raw));
        extract_field(&raw, &self.field, path).map(Some)
    }
}
