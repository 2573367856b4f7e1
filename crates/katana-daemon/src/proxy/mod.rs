pub mod forward;
pub mod tls;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use rustls::ServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::{error, info, warn};

use crate::proxy::forward::ForwardClient;
use crate::state::DaemonState;
use tls::ReloadingCertResolver;

/// Run the HTTP (plain redirect) and HTTPS (TLS-terminating reverse proxy)
/// listeners until either one fails to bind. Both run for the lifetime of
/// the process; a connection error on either never brings the other down.
pub async fn run(state: Arc<DaemonState>) -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        tracing::debug!("rustls crypto provider already installed");
    }

    let bind_ip = state.config.bind_address();
    let http_addr: SocketAddr = format!("{bind_ip}:{}", state.config.proxy.http_port).parse()?;
    let https_addr: SocketAddr = format!("{bind_ip}:{}", state.config.proxy.https_port).parse()?;

    let client = forward::build_client();

    let https_port = state.config.proxy.https_port;
    let redirect = tokio::spawn(run_redirect_listener(http_addr, https_port));
    let tls_proxy = tokio::spawn(run_tls_listener(https_addr, state, client));

    tokio::select! {
        res = redirect => res??,
        res = tls_proxy => res??,
    }

    Ok(())
}

async fn run_redirect_listener(addr: SocketAddr, https_port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "http redirect listener bound");

    loop {
        let (stream, _peer) = listener.accept().await?;
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = hyper::service::service_fn(move |req| redirect_to_https(req, https_port));
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(error = %err, "http redirect connection error");
            }
        });
    }
}

async fn redirect_to_https(
    req: Request<Incoming>,
    https_port: u16,
) -> Result<Response<Body>, std::convert::Infallible> {
    let host = req
        .headers()
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .split(':')
        .next()
        .unwrap_or("")
        .to_string();
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let port_suffix = if https_port == 443 {
        String::new()
    } else {
        format!(":{https_port}")
    };
    let location = format!("https://{host}{port_suffix}{path}");

    let response = Response::builder()
        .status(StatusCode::PERMANENT_REDIRECT)
        .header(axum::http::header::LOCATION, location)
        .body(Body::empty())
        .unwrap_or_else(|_| Response::new(Body::empty()));
    Ok(response)
}

async fn run_tls_listener(
    addr: SocketAddr,
    state: Arc<DaemonState>,
    client: ForwardClient,
) -> anyhow::Result<()> {
    let resolver = Arc::new(ReloadingCertResolver::new(&state.cert_manager));
    let mut server_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_cert_resolver(resolver);
    server_config.alpn_protocols = vec![b"http/1.1".to_vec()];
    let acceptor = TlsAcceptor::from(Arc::new(server_config));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "https proxy listener bound");

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let acceptor = acceptor.clone();
        let state = state.clone();
        let client = client.clone();

        tokio::spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, %peer_addr, "tls handshake failed");
                    return;
                }
            };

            let io = TokioIo::new(tls_stream);
            let service = hyper::service::service_fn(move |req: Request<Incoming>| {
                let state = state.clone();
                let client = client.clone();
                async move {
                    let req = req.map(Body::new);
                    Ok::<_, std::convert::Infallible>(
                        forward::handle(state, client, peer_addr, req).await,
                    )
                }
            });

            if let Err(err) = http1::Builder::new()
                .serve_connection(io, service)
                .await
            {
                error!(error = %err, %peer_addr, "https connection error");
            }
        });
    }
}
