//! End-to-end tests for the browser bridge.
//!
//! A fake WebDriver endpoint runs on its own thread and runtime. On
//! navigation it fetches the target URL itself, the way a browser would,
//! so navigating to the proxy only completes if the proxy is served while
//! the command waits.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use proxied_webdriver::{
    AppRequest, AppResponse, AsyncWebDriver, By, Capabilities, Dialect, Error, EventLoop,
    KernelError, ProxyConfig, ProxyServer,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Fake WebDriver Endpoint
// ============================================================================

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    body: String,
}

struct FakeState {
    dialect: Dialect,
    client: reqwest::Client,
    page: Mutex<String>,
    current_url: Mutex<String>,
    requests: Mutex<Vec<Recorded>>,
}

struct FakeDriver {
    addr: SocketAddr,
    state: Arc<FakeState>,
}

impl FakeDriver {
    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().clone()
    }

    fn find(&self, method: Method, path: &str) -> Option<Recorded> {
        self.requests()
            .into_iter()
            .find(|r| r.method == method && r.path == path)
    }
}

fn start_fake(dialect: Dialect) -> FakeDriver {
    let state = Arc::new(FakeState {
        dialect,
        client: reqwest::Client::builder().no_proxy().build().expect("client"),
        page: Mutex::new(String::new()),
        current_url: Mutex::new(String::new()),
        requests: Mutex::new(Vec::new()),
    });

    let (tx, rx) = std::sync::mpsc::channel();
    let shared = Arc::clone(&state);

    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("runtime");

        runtime.block_on(async move {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            tx.send(listener.local_addr().expect("addr")).expect("send addr");

            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    continue;
                };
                let state = Arc::clone(&shared);
                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { Ok::<_, Infallible>(route(&state, req).await) }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });
    });

    let addr = rx.recv().expect("fake driver address");
    FakeDriver { addr, state }
}

fn reply(status: StatusCode, body: Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json; charset=utf-8")
        .body(Full::new(Bytes::from(body.to_string())))
        .expect("response")
}

fn ok(state: &FakeState, value: Value) -> Response<Full<Bytes>> {
    match state.dialect {
        Dialect::W3c => reply(StatusCode::OK, json!({ "value": value })),
        Dialect::Legacy => reply(
            StatusCode::OK,
            json!({ "sessionId": "s2", "status": 0, "value": value }),
        ),
    }
}

fn element(state: &FakeState, id: &str) -> Value {
    match state.dialect {
        Dialect::W3c => json!({ "element-6066-11e4-a52f-4a5e4f4d52ac": id }),
        Dialect::Legacy => json!({ "ELEMENT": id }),
    }
}

fn no_such_element(state: &FakeState) -> Response<Full<Bytes>> {
    match state.dialect {
        Dialect::W3c => reply(
            StatusCode::NOT_FOUND,
            json!({"value": {
                "error": "no such element",
                "message": "Unable to locate element: #missing",
                "stacktrace": ""
            }}),
        ),
        Dialect::Legacy => reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"sessionId": "s2", "status": 7, "value": {"message": "Unable to locate element"}}),
        ),
    }
}

async fn route(state: &FakeState, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let raw = req
        .into_body()
        .collect()
        .await
        .map(|c| c.to_bytes())
        .unwrap_or_default();
    let body = String::from_utf8_lossy(&raw).into_owned();
    let params: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

    state.requests.lock().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        body,
    });

    if method == Method::POST && path == "/session" {
        return match state.dialect {
            Dialect::W3c => reply(
                StatusCode::OK,
                json!({"value": {"sessionId": "s1", "capabilities": {"browserName": "chrome"}}}),
            ),
            Dialect::Legacy => reply(
                StatusCode::OK,
                json!({"sessionId": "s2", "status": 0, "value": {"browserName": "x"}}),
            ),
        };
    }

    let session = match state.dialect {
        Dialect::W3c => "/session/s1",
        Dialect::Legacy => "/session/s2",
    };
    let Some(rest) = path.strip_prefix(session) else {
        return reply(
            StatusCode::NOT_FOUND,
            json!({"value": {"error": "invalid session id", "message": path}}),
        );
    };

    match (&method, rest) {
        (&Method::DELETE, "") => ok(state, Value::Null),
        (&Method::POST, "/url") => {
            let target = params["url"].as_str().unwrap_or_default().to_string();
            match state.client.get(&target).send().await {
                Ok(response) => {
                    let page = response.text().await.unwrap_or_default();
                    *state.page.lock() = page;
                    *state.current_url.lock() = target;
                    ok(state, Value::Null)
                }
                Err(e) => reply(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"value": {"error": "unknown error", "message": e.to_string()}}),
                ),
            }
        }
        (&Method::GET, "/url") => ok(state, json!(state.current_url.lock().clone())),
        (&Method::GET, "/title") => {
            let page = state.page.lock().clone();
            let title = page
                .split_once("<title>")
                .and_then(|(_, tail)| tail.split_once("</title>"))
                .map_or("", |(title, _)| title)
                .to_string();
            ok(state, json!(title))
        }
        (&Method::POST, "/element") => {
            if params["value"] == "#missing" {
                no_such_element(state)
            } else {
                ok(state, element(state, "e1"))
            }
        }
        (&Method::POST, "/elements") => ok(state, json!([element(state, "e1"), element(state, "e2")])),
        (&Method::POST, "/element/e1/click") => ok(state, Value::Null),
        (&Method::POST, "/element/e1/value") => ok(state, Value::Null),
        (&Method::GET, "/element/e1/text") => ok(state, json!("Sign in")),
        (&Method::GET, "/element/e1/attribute/href") => ok(state, json!("/home")),
        (&Method::GET, "/element/e1/attribute/disabled") => ok(state, Value::Null),
        (&Method::POST, "/execute/sync") => ok(state, params["args"].clone()),
        _ => reply(
            StatusCode::NOT_FOUND,
            json!({"value": {"error": "unknown command", "message": format!("{method} {path}")}}),
        ),
    }
}

// ============================================================================
// Harness
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Starts a proxy whose application serves one page and counts hits.
fn start_proxy(event_loop: &EventLoop) -> (ProxyServer, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    let kernel = move |req: &AppRequest| -> Result<AppResponse, KernelError> {
        counter.fetch_add(1, Ordering::SeqCst);
        match req.path() {
            "/home" => Ok(AppResponse::ok(
                "<html><head><title>Dashboard</title></head><body></body></html>",
            )
            .with_header("Content-Type", "text/html; charset=utf-8")),
            _ => Ok(AppResponse::not_found()),
        }
    };

    let server = ProxyServer::new(kernel, event_loop.clone(), ProxyConfig::new());
    server.listen().expect("listen");
    (server, hits)
}

fn connect(fake: &FakeDriver, event_loop: &EventLoop) -> AsyncWebDriver {
    AsyncWebDriver::builder()
        .server_url(fake.url())
        .desired_capabilities(Capabilities::new().with("browserName", "chrome"))
        .connect(event_loop)
        .expect("connect")
}

// ============================================================================
// Session Negotiation
// ============================================================================

#[test]
fn negotiates_w3c_session() {
    init_tracing();
    let fake = start_fake(Dialect::W3c);
    let event_loop = EventLoop::new().expect("loop");

    let driver = connect(&fake, &event_loop);

    assert_eq!(driver.dialect(), Dialect::W3c);
    assert_eq!(driver.session_id().as_str(), "s1");
    assert_eq!(driver.capabilities().browser_name(), Some("chrome"));

    let negotiation = fake.find(Method::POST, "/session").expect("negotiation request");
    let payload: Value = serde_json::from_str(&negotiation.body).expect("json payload");
    assert_eq!(payload["capabilities"]["firstMatch"][0]["browserName"], "chrome");
    assert_eq!(payload["desiredCapabilities"]["browserName"], "chrome");
}

#[test]
fn negotiates_legacy_session() {
    init_tracing();
    let fake = start_fake(Dialect::Legacy);
    let event_loop = EventLoop::new().expect("loop");

    let driver = connect(&fake, &event_loop);

    assert_eq!(driver.dialect(), Dialect::Legacy);
    assert_eq!(driver.session_id().as_str(), "s2");
    assert_eq!(driver.capabilities().browser_name(), Some("x"));

    let button = driver.find_element(&By::css("button")).expect("element");
    assert_eq!(button.as_str(), "e1");
}

#[test]
fn connect_from_inside_the_loop_is_rejected() {
    let event_loop = EventLoop::new().expect("loop");
    let inner = event_loop.clone();

    let result = event_loop
        .drive(async move {
            AsyncWebDriver::builder()
                .server_url("http://127.0.0.1:9")
                .connect(&inner)
        })
        .expect("drive");

    assert!(matches!(result, Err(Error::LoopReentered)));
}

// ============================================================================
// Commands
// ============================================================================

#[test]
fn proxy_is_served_while_navigation_waits() -> anyhow::Result<()> {
    init_tracing();
    let fake = start_fake(Dialect::W3c);
    let event_loop = EventLoop::new()?;
    let (server, hits) = start_proxy(&event_loop);
    let driver = connect(&fake, &event_loop);

    let home = format!("{}home", server.url()?);
    driver.get(&home)?;

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(driver.title()?, "Dashboard");
    assert_eq!(driver.current_url()?, home);
    assert_eq!(server.in_flight(), 0);

    driver.quit()?;
    assert!(fake.find(Method::DELETE, "/session/s1").is_some());

    server.flush()?;
    Ok(())
}

#[test]
fn element_commands_round_trip() {
    init_tracing();
    let fake = start_fake(Dialect::W3c);
    let event_loop = EventLoop::new().expect("loop");
    let driver = connect(&fake, &event_loop);

    let button = driver.find_element(&By::css("button.primary")).expect("element");
    assert_eq!(button.as_str(), "e1");

    let lookup = fake.find(Method::POST, "/session/s1/element").expect("lookup");
    let params: Value = serde_json::from_str(&lookup.body).expect("json");
    assert_eq!(params, json!({"using": "css selector", "value": "button.primary"}));

    driver.click(&button).expect("click");
    let click = fake
        .find(Method::POST, "/session/s1/element/e1/click")
        .expect("click request");
    assert_eq!(click.body, "{}");

    driver.send_keys(&button, "ok").expect("send keys");
    let keys = fake
        .find(Method::POST, "/session/s1/element/e1/value")
        .expect("keys request");
    let params: Value = serde_json::from_str(&keys.body).expect("json");
    assert_eq!(params["text"], "ok");
    assert_eq!(params["value"], json!(["o", "k"]));

    assert_eq!(driver.text(&button).expect("text"), "Sign in");
    assert_eq!(
        driver.attribute(&button, "href").expect("href").as_deref(),
        Some("/home")
    );
    assert_eq!(driver.attribute(&button, "disabled").expect("disabled"), None);

    let all = driver.find_elements(&By::tag("button")).expect("elements");
    assert_eq!(all.len(), 2);

    let echoed = driver
        .execute_script("return arguments;", vec![json!(5), json!("x")])
        .expect("script");
    assert_eq!(echoed, json!([5, "x"]));

    assert!(
        fake.requests()
            .iter()
            .filter(|r| r.method == Method::GET)
            .all(|r| r.body.is_empty())
    );
}

#[test]
fn w3c_error_payload_becomes_webdriver_error() {
    init_tracing();
    let fake = start_fake(Dialect::W3c);
    let event_loop = EventLoop::new().expect("loop");
    let driver = connect(&fake, &event_loop);

    let err = driver.find_element(&By::id("missing")).expect_err("must fail");

    assert!(matches!(err, Error::WebDriver { .. }));
    assert_eq!(err.webdriver_code(), Some("no such element"));
    assert!(err.to_string().contains("Unable to locate element"));
}

#[test]
fn legacy_status_becomes_webdriver_error() {
    init_tracing();
    let fake = start_fake(Dialect::Legacy);
    let event_loop = EventLoop::new().expect("loop");
    let driver = connect(&fake, &event_loop);

    let err = driver.find_element(&By::id("missing")).expect_err("must fail");

    assert_eq!(err.webdriver_code(), Some("7"));
}

#[test]
fn unrouted_command_is_reported() {
    init_tracing();
    let fake = start_fake(Dialect::W3c);
    let event_loop = EventLoop::new().expect("loop");
    let driver = connect(&fake, &event_loop);

    let err = driver.refresh().expect_err("must fail");
    assert_eq!(err.webdriver_code(), Some("unknown command"));
}
