use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use pretty_assertions::assert_eq;
use retriever::listing::{ListingHeuristic, FILENAME_REGEX};
use retriever::oracle::{HttpOracle, Oracle, OracleConfig, OracleError, TemplateSource};
use retriever::request_template::InlineTemplate;
use retriever::retriever::Retriever;
use retriever::store::LocalStore;
use serde_json::json;
use tempfile::TempDir;

use std::convert::Infallible;
use std::fs;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Answers a request with a status and a body, given the request method and body.
type Handler = fn(&Method, &str) -> (StatusCode, String);

/// Start a target on an ephemeral port in a background thread.
fn spawn_target(handler: Handler) -> SocketAddr {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let make_svc = make_service_fn(move |_conn| async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| async move {
                    let method = req.method().clone();
                    let raw = hyper::body::to_bytes(req.into_body()).await?;
                    let (status, text) = handler(&method, &String::from_utf8_lossy(&raw));
                    let mut resp = Response::new(Body::from(text));
                    *resp.status_mut() = status;
                    Ok::<_, hyper::Error>(resp)
                }))
            });
            let server = Server::bind(&([127, 0, 0, 1], 0).into()).serve(make_svc);
            tx.send(server.local_addr()).unwrap();
            server.await.unwrap();
        });
    });
    rx.recv().unwrap()
}

/// Pretend file system of the target: the path between the markers of the test template.
fn file_system(method: &Method, body: &str) -> (StatusCode, String) {
    if method != Method::PUT {
        return (StatusCode::METHOD_NOT_ALLOWED, String::new());
    }
    let path = body
        .split_once("<path>")
        .and_then(|(_, rest)| rest.split_once("</path>"))
        .map(|(path, _)| path)
        .unwrap_or_default();
    let content = match path {
        "/etc/" => "hostname\npasswd\nmy file\n",
        "/etc/hostname/" => "  web-01\n",
        "/etc/passwd/" => "root:x:0:0:root:/root:/bin/bash",
        "/etc/my%20file/" => "note: encoded",
        "/broken/" => return (StatusCode::OK, "<html>oops</html>".to_string()),
        "/slow/" => {
            thread::sleep(Duration::from_millis(1500));
            "late"
        }
        _ => return (StatusCode::NOT_FOUND, json!({"error": "not found"}).to_string()),
    };
    (StatusCode::OK, json!({"id": 1, "surname": content}).to_string())
}

fn config(addr: SocketAddr) -> OracleConfig {
    OracleConfig {
        template: TemplateSource::Inline(InlineTemplate {
            host: addr.to_string(),
            url: "/api/user".to_string(),
            body: "<user><path>§§</path></user>".to_string(),
            ..InlineTemplate::default()
        }),
        marker: "§§".to_string(),
        field: "surname".to_string(),
        timeout: Duration::from_millis(500),
    }
}

#[test]
fn echoed_content_is_returned_trimmed() {
    let oracle = HttpOracle::new(config(spawn_target(file_system))).unwrap();
    assert_eq!(oracle.fetch("/etc/hostname/").unwrap().as_deref(), Some("web-01"));
}

#[test]
fn error_status_means_no_content() {
    let oracle = HttpOracle::new(config(spawn_target(file_system))).unwrap();
    assert_eq!(oracle.fetch("/nope/").unwrap(), None);
}

#[test]
fn unparseable_response_is_an_error() {
    let oracle = HttpOracle::new(config(spawn_target(file_system))).unwrap();
    assert!(matches!(oracle.fetch("/broken/"), Err(OracleError::Json { .. })));
}

#[test]
fn slow_target_times_out() {
    let oracle = HttpOracle::new(config(spawn_target(file_system))).unwrap();
    assert!(matches!(oracle.fetch("/slow/"), Err(OracleError::Timeout { .. })));
}

#[test]
fn unreachable_target_is_an_error() {
    // grab a free port, then let it go again
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let oracle = HttpOracle::new(config(addr)).unwrap();
    assert!(matches!(oracle.fetch("/etc/"), Err(OracleError::Transport { .. })));
}

#[test]
fn request_file_template() {
    let addr = spawn_target(file_system);
    let dir = TempDir::new().unwrap();
    let req_path = dir.path().join("req.txt");
    let mut req_file = fs::File::create(&req_path).unwrap();
    write!(
        req_file,
        "PUT /api/user HTTP/1.1\nHost: {}\nContent-Type: application/xml\n\n<user>\n<path>XXE</path>\n</user>",
        addr
    )
    .unwrap();

    let oracle = HttpOracle::new(OracleConfig {
        template: TemplateSource::File(req_path),
        marker: "XXE".to_string(),
        ..config(addr)
    })
    .unwrap();
    assert_eq!(oracle.fetch("/etc/hostname/").unwrap().as_deref(), Some("web-01"));
}

#[test]
fn mirrors_the_target() {
    let out = TempDir::new().unwrap();
    let oracle = HttpOracle::new(config(spawn_target(file_system))).unwrap();
    let r = Retriever::new(
        oracle,
        ListingHeuristic::new(FILENAME_REGEX).unwrap(),
        LocalStore::new(out.path()),
    );

    assert_eq!(
        r.retrieve("/etc/").unwrap().as_deref(),
        Some("hostname\npasswd\nmy file")
    );
    assert!(!out.path().join("etc").is_file());
    assert_eq!(fs::read_to_string(out.path().join("etc/hostname")).unwrap(), "web-01");
    assert_eq!(
        fs::read_to_string(out.path().join("etc/passwd")).unwrap(),
        "root:x:0:0:root:/root:/bin/bash"
    );
    assert_eq!(
        fs::read_to_string(out.path().join("etc/my file")).unwrap(),
        "note: encoded"
    );
}
