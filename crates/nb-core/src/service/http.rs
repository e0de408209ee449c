//! HTTP transport.
//!
//! `POST /` carries one envelope per request body. `GET /health` answers
//! with the engine status. Any other verb on `/` gets 405; unknown paths
//! get 404. Worker threads share one [`Service`]; engine access inside it is
//! serialized by the bridge.

use super::Service;
use crate::logging::event_names;
use nb_common::{Error, Result};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response};
use tracing::{debug, error, info, warn};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: u64 = 1024 * 1024;

/// How often idle workers check the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// A running HTTP server.
pub struct HttpServer {
    server: Arc<tiny_http::Server>,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    addr: SocketAddr,
}

impl HttpServer {
    /// Bind `addr` and start `workers` request threads.
    pub fn bind(addr: &str, service: Arc<Service>, workers: usize) -> Result<Self> {
        let server = tiny_http::Server::http(addr)
            .map_err(|e| Error::Config(format!("cannot listen on {}: {}", addr, e)))?;
        let bound = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| Error::Config(format!("{} is not an IP address", addr)))?;
        let server = Arc::new(server);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(workers.max(1));
        for idx in 0..workers.max(1) {
            let server = Arc::clone(&server);
            let service = Arc::clone(&service);
            let shutdown = Arc::clone(&shutdown);
            let handle = thread::Builder::new()
                .name(format!("nb-http-{}", idx))
                .spawn(move || serve_loop(&server, &service, &shutdown))?;
            handles.push(handle);
        }

        info!(
            event = event_names::SERVER_LISTENING,
            addr = %bound,
            workers = handles.len(),
            "rpc server listening"
        );
        Ok(Self {
            server,
            shutdown,
            workers: handles,
            addr: bound,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Block until the workers exit.
    pub fn join(mut self) {
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }

    /// Stop accepting and wait for in-flight requests.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.server.unblock();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        info!(event = event_names::SERVER_STOPPED, addr = %self.addr, "rpc server stopped");
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.stop();
        }
    }
}

fn serve_loop(server: &tiny_http::Server, service: &Service, shutdown: &AtomicBool) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let request = match server.recv_timeout(ACCEPT_POLL) {
            Ok(Some(req)) => req,
            Ok(None) => continue,
            Err(e) => {
                if !shutdown.load(Ordering::SeqCst) {
                    error!(error = %e, "rpc server accept error");
                }
                break;
            }
        };
        handle_request(request, service);
    }
}

fn handle_request(mut request: Request, service: &Service) {
    let method = request.method().clone();
    let path = request.url().split('?').next().unwrap_or("").to_string();
    debug!(method = %method, path = %path, "http request");

    let response = match (method, path.as_str()) {
        (Method::Post, "/") | (Method::Post, "/rpc") => {
            let mut body = String::new();
            let read = request
                .as_reader()
                .take(MAX_BODY_BYTES)
                .read_to_string(&mut body);
            match read {
                Ok(_) => json_response(200, service.handle_json(&body)),
                Err(e) => {
                    warn!(error = %e, "unreadable request body");
                    text_response(400, "request body must be UTF-8 JSON")
                }
            }
        }
        (Method::Get, "/health") | (Method::Get, "/healthz") => {
            match serde_json::to_string(&service.ping()) {
                Ok(body) => json_response(200, body),
                Err(e) => text_response(500, &format!("error: {}", e)),
            }
        }
        (_, "/") | (_, "/rpc") => {
            let mut resp = text_response(405, "only POST is supported");
            if let Ok(allow) = Header::from_bytes(&b"Allow"[..], &b"POST"[..]) {
                resp.add_header(allow);
            }
            resp
        }
        _ => text_response(404, "not found"),
    };

    if let Err(e) = request.respond(response) {
        warn!(error = %e, "failed to send http response");
    }
}

fn json_response(status: u16, body: String) -> Response<std::io::Cursor<Vec<u8>>> {
    let mut resp = Response::from_string(body).with_status_code(status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        resp.add_header(header);
    }
    resp
}

fn text_response(status: u16, body: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body).with_status_code(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeStatus;
    use crate::channel::ChannelState;
    use crate::service::Backend;
    use nb_common::ParseResult;
    use std::io::Write;
    use std::net::TcpStream;

    struct IdleBackend;

    impl Backend for IdleBackend {
        fn parse(&self, _text: &str) -> Result<ParseResult> {
            Ok(ParseResult::default())
        }
        fn parse_imperative(&self, _text: &str) -> Result<ParseResult> {
            Ok(ParseResult::default())
        }
        fn status(&self) -> BridgeStatus {
            BridgeStatus {
                state: ChannelState::Unstarted,
                pid: None,
                busy: false,
                requests: 0,
                timeouts: 0,
            }
        }
    }

    fn raw_http(addr: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(request.as_bytes()).unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        out
    }

    fn start() -> HttpServer {
        let service = Arc::new(Service::new(Arc::new(IdleBackend)).unwrap());
        HttpServer::bind("127.0.0.1:0", service, 2).unwrap()
    }

    #[test]
    fn post_dispatches_envelope() {
        let server = start();
        let body = r#"{"method":"ping","id":5}"#;
        let resp = raw_http(
            server.addr(),
            &format!(
                "POST / HTTP/1.0\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            ),
        );
        assert!(resp.starts_with("HTTP/1.0 200") || resp.starts_with("HTTP/1.1 200"));
        assert!(resp.contains("\"pong\":true"));
        assert!(resp.contains("\"id\":5"));
        server.shutdown();
    }

    #[test]
    fn get_on_root_is_405() {
        let server = start();
        let resp = raw_http(server.addr(), "GET / HTTP/1.0\r\n\r\n");
        assert!(resp.contains(" 405 "));
        server.shutdown();
    }

    #[test]
    fn health_and_not_found() {
        let server = start();
        let health = raw_http(server.addr(), "GET /health HTTP/1.0\r\n\r\n");
        assert!(health.contains(" 200 "));
        assert!(health.contains("\"state\":\"unstarted\""));
        let missing = raw_http(server.addr(), "GET /nope HTTP/1.0\r\n\r\n");
        assert!(missing.contains(" 404 "));
        server.shutdown();
    }
}
