use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderValue, Request, Response, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use katana_core::{Backend, RouteTarget};
use tower::ServiceExt;
use tracing::{error, warn};

use crate::state::DaemonState;

pub type ForwardClient = Client<HttpConnector, Body>;

pub fn build_client() -> ForwardClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

/// Route a request that already terminated TLS: dashboard host dispatches
/// in-process to the API router, anything else proxies to its compose
/// backend over the docker network. Falls back to a plain 404/502 when the
/// route table has nothing for the incoming `Host`.
pub async fn handle(
    state: Arc<DaemonState>,
    client: ForwardClient,
    client_addr: std::net::SocketAddr,
    req: Request<Body>,
) -> Response<Body> {
    let host = match req.headers().get(axum::http::header::HOST).and_then(|v| v.to_str().ok()) {
        Some(h) => h.to_string(),
        None => return not_found("missing Host header"),
    };

    match state.route_table.lookup(&host).await {
        Some(RouteTarget::Dashboard) => {
            let router = crate::api::router(state.clone());
            match router.oneshot(req).await {
                Ok(resp) => resp,
                Err(infallible) => match infallible {},
            }
        }
        Some(RouteTarget::Backend(backend)) => {
            forward_to_backend(client, client_addr, backend, req).await
        }
        None => not_found(&format!("no route for host '{host}'")),
    }
}

async fn forward_to_backend(
    client: ForwardClient,
    client_addr: std::net::SocketAddr,
    backend: Backend,
    mut req: Request<Body>,
) -> Response<Body> {
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let new_uri = match format!("http://{}:{}{}", backend.host, backend.port, path_and_query)
        .parse::<Uri>()
    {
        Ok(uri) => uri,
        Err(e) => {
            error!(error = %e, host = %backend.host, "failed to build backend URI");
            return bad_gateway("invalid backend address");
        }
    };
    *req.uri_mut() = new_uri;

    let headers = req.headers_mut();
    headers.insert(
        "x-forwarded-proto",
        HeaderValue::from_static("https"),
    );
    if let Ok(host_value) = HeaderValue::from_str(&client_addr.ip().to_string()) {
        headers.insert("x-real-ip", host_value.clone());
        append_forwarded_for(headers, host_value);
    }
    if let Some(original_host) = req.headers().get(axum::http::header::HOST).cloned() {
        req.headers_mut().insert("x-forwarded-host", original_host);
    }

    if is_upgrade_request(&req) {
        return proxy_upgrade(client, req, backend).await;
    }

    match client.request(req).await {
        Ok(resp) => resp.map(Body::new),
        Err(e) => {
            warn!(error = %e, host = %backend.host, port = backend.port, "backend not reachable");
            bad_gateway("backend not reachable")
        }
    }
}

fn is_upgrade_request(req: &Request<Body>) -> bool {
    let has_upgrade_header = req.headers().get(axum::http::header::UPGRADE).is_some();
    let connection_says_upgrade = req
        .headers()
        .get(axum::http::header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').any(|tok| tok.trim().eq_ignore_ascii_case("upgrade")))
        .unwrap_or(false);
    has_upgrade_header && connection_says_upgrade
}

/// Splice the browser<->proxy and proxy<->backend byte streams together once
/// both sides have completed the HTTP/1.1 upgrade handshake, so a WebSocket
/// (or any other protocol switch) passes through unmodified after the
/// initial request. The 101 response is relayed back to the browser first;
/// hyper completes that side's upgrade once it's flushed.
async fn proxy_upgrade(
    client: ForwardClient,
    mut req: Request<Body>,
    backend: Backend,
) -> Response<Body> {
    let client_upgrade = hyper::upgrade::on(&mut req);

    let mut resp = match client.request(req).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(error = %e, host = %backend.host, port = backend.port, "backend not reachable for upgrade");
            return bad_gateway("backend not reachable");
        }
    };

    if resp.status() != StatusCode::SWITCHING_PROTOCOLS {
        return resp.map(Body::new);
    }

    let backend_upgrade = hyper::upgrade::on(&mut resp);
    tokio::spawn(async move {
        let (client_io, backend_io) = match tokio::try_join!(client_upgrade, backend_upgrade) {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "upgrade handshake did not complete on one side");
                return;
            }
        };
        let mut client_io = TokioIo::new(client_io);
        let mut backend_io = TokioIo::new(backend_io);
        if let Err(e) = tokio::io::copy_bidirectional(&mut client_io, &mut backend_io).await {
            warn!(error = %e, "upgraded proxy stream ended");
        }
    });

    resp.map(Body::new)
}

fn append_forwarded_for(headers: &mut axum::http::HeaderMap, addr: HeaderValue) {
    match headers.get("x-forwarded-for").cloned() {
        Some(existing) => {
            let combined = format!("{}, {}", existing.to_str().unwrap_or(""), addr.to_str().unwrap_or(""));
            if let Ok(value) = HeaderValue::from_str(&combined) {
                headers.insert("x-forwarded-for", value);
            }
        }
        None => {
            headers.insert("x-forwarded-for", addr);
        }
    }
}

fn not_found(message: &str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Body::from(message.to_string()))
        .unwrap_or_default()
}

fn bad_gateway(message: &str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::BAD_GATEWAY)
        .body(Body::from(message.to_string()))
        .unwrap_or_default()
}
