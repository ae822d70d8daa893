use clap::ValueEnum;
use hyper::Method;

#[derive(Copy, Clone, ValueEnum, Debug)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

/// Parse a `Name: value` header argument.
pub fn parse_header(arg: &str) -> Result<(String, String), String> {
    let (key, value) = arg
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got {:?}", arg))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty header name in {:?}", arg));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
