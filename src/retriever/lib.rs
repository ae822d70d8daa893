//! retriever
//!
//! Library side of rip_xxe. Walks a remote filesystem through an XXE oracle that echoes
//! file contents back in its responses, and mirrors every file it finds under a local
//! directory.
//!
//! The [Oracle](oracle::Oracle) trait is the only thing tying the walk to a target.
//! [HttpOracle](oracle::HttpOracle) is the stock implementation: it fills a
//! [RequestTemplate](request_template::RequestTemplate) with the percent-encoded path and
//! pulls the echoed content out of a JSON response.
pub mod listing;
pub mod oracle;
pub mod request_template;
pub mod retriever;
pub mod store;
