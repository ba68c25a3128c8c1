use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum FetchError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("HTTP status {status} for {url}{detail}")]
    Status {
        status: u16,
        url: String,
        detail: String,
    },
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },
    #[error("failed to read {target}: {message}")]
    Read { target: String, message: String },
}

impl FetchError {
    pub(crate) fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Single GET with no retry. Callers decide how to degrade on failure.
pub(crate) fn get_text(
    url: &str,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<String, FetchError> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(connect_timeout)
        .timeout_read(read_timeout)
        .timeout_write(read_timeout)
        .build();

    match agent.get(url).call() {
        Ok(response) => response.into_string().map_err(|err| FetchError::Read {
            target: url.to_string(),
            message: format!("response decode failed: {err}"),
        }),
        Err(ureq::Error::Status(404, _)) => Err(FetchError::NotFound(url.to_string())),
        Err(ureq::Error::Status(status, response)) => {
            let response_body = response.into_string().ok().unwrap_or_default();
            let body = response_body.trim();
            let detail = if body.is_empty() {
                String::new()
            } else {
                let truncated = body.chars().take(240).collect::<String>();
                format!(" ({truncated})")
            };
            Err(FetchError::Status {
                status,
                url: url.to_string(),
                detail,
            })
        }
        Err(ureq::Error::Transport(err)) => Err(FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    pub(crate) enum Behavior {
        Respond(u16, String),
        DelayRespond(Duration, u16, String),
    }

    #[derive(Debug)]
    pub(crate) struct TestServer {
        pub(crate) base_url: String,
        requests: Arc<AtomicUsize>,
        paths: Arc<Mutex<Vec<String>>>,
        shutdown_tx: mpsc::Sender<()>,
        join_handle: Option<std::thread::JoinHandle<()>>,
    }

    impl TestServer {
        pub(crate) fn spawn(behaviors: Vec<Behavior>) -> Self {
            let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind test server");
            listener.set_nonblocking(true).expect("set nonblocking");
            let addr = listener.local_addr().expect("local addr");

            let requests = Arc::new(AtomicUsize::new(0));
            let requests_clone = Arc::clone(&requests);
            let paths = Arc::new(Mutex::new(Vec::new()));
            let paths_clone = Arc::clone(&paths);
            let shared_behaviors = Arc::new(Mutex::new(VecDeque::from(behaviors)));
            let behaviors_clone = Arc::clone(&shared_behaviors);
            let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

            let join_handle = std::thread::spawn(move || {
                loop {
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }

                    match listener.accept() {
                        Ok((mut stream, _)) => {
                            requests_clone.fetch_add(1, Ordering::SeqCst);
                            let behavior = {
                                let mut queue = behaviors_clone.lock().expect("lock behaviors");
                                queue.pop_front().unwrap_or_else(|| {
                                    Behavior::Respond(404, String::new())
                                })
                            };
                            let paths = Arc::clone(&paths_clone);
                            std::thread::spawn(move || {
                                if let Ok(Some(path)) = consume_request(&mut stream) {
                                    paths.lock().expect("lock paths").push(path);
                                }
                                serve_behavior(&mut stream, behavior);
                            });
                        }
                        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                            std::thread::sleep(Duration::from_millis(5));
                        }
                        Err(_) => break,
                    }
                }
            });

            Self {
                base_url: format!("http://{addr}"),
                requests,
                paths,
                shutdown_tx,
                join_handle: Some(join_handle),
            }
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }

        pub(crate) fn requested_paths(&self) -> Vec<String> {
            self.paths.lock().expect("lock paths").clone()
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            let _ = self.shutdown_tx.send(());
            if let Some(handle) = self.join_handle.take() {
                let _ = handle.join();
            }
        }
    }

    fn consume_request(stream: &mut TcpStream) -> std::io::Result<Option<String>> {
        stream.set_read_timeout(Some(Duration::from_millis(200)))?;
        let mut buf = [0_u8; 1024];
        let mut data = Vec::new();
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(read) => {
                    data.extend_from_slice(&buf[..read]);
                    if data.windows(4).any(|window| window == b"\r\n\r\n") {
                        break;
                    }
                }
                Err(err)
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        let head = String::from_utf8_lossy(&data);
        Ok(head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .map(str::to_string))
    }

    fn reason_phrase(status: u16) -> &'static str {
        match status {
            200 => "OK",
            404 => "Not Found",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "Status",
        }
    }

    fn serve_behavior(stream: &mut TcpStream, behavior: Behavior) {
        match behavior {
            Behavior::Respond(status, body) => {
                let _ = write_response(stream, status, &body);
            }
            Behavior::DelayRespond(delay, status, body) => {
                std::thread::sleep(delay);
                let _ = write_response(stream, status, &body);
            }
        }
    }

    fn write_response(stream: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
        let reason = reason_phrase(status);
        let payload = body.as_bytes();
        write!(
            stream,
            "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            payload.len()
        )?;
        stream.write_all(payload)?;
        stream.flush()
    }

    #[test]
    fn returns_body_on_success() {
        let server = TestServer::spawn(vec![Behavior::Respond(200, "ok".to_string())]);

        let result = get_text(
            &format!("{}/data/episodes.json", server.base_url),
            Duration::from_millis(200),
            Duration::from_millis(200),
        );

        assert_eq!(result.expect("should succeed"), "ok");
        assert_eq!(server.requested_paths(), vec!["/data/episodes.json"]);
    }

    #[test]
    fn maps_404_to_not_found() {
        let server = TestServer::spawn(vec![Behavior::Respond(404, "missing".to_string())]);

        let err = get_text(
            &server.base_url,
            Duration::from_millis(200),
            Duration::from_millis(200),
        )
        .expect_err("404 should fail");

        assert!(err.is_not_found(), "unexpected error: {err}");
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn server_errors_are_not_retried() {
        let server = TestServer::spawn(vec![
            Behavior::Respond(503, "down".to_string()),
            Behavior::Respond(200, "ok".to_string()),
        ]);

        let err = get_text(
            &server.base_url,
            Duration::from_millis(200),
            Duration::from_millis(200),
        )
        .expect_err("503 should fail");

        let message = err.to_string();
        assert!(
            message.contains("HTTP status 503") && message.contains("(down)"),
            "unexpected error message: {message}"
        );
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn read_timeout_is_a_transport_error() {
        let server = TestServer::spawn(vec![Behavior::DelayRespond(
            Duration::from_millis(150),
            200,
            "slow".to_string(),
        )]);

        let err = get_text(
            &server.base_url,
            Duration::from_millis(200),
            Duration::from_millis(20),
        )
        .expect_err("slow response should time out");

        assert!(
            matches!(err, FetchError::Transport { .. }),
            "unexpected error: {err}"
        );
        assert!(!err.is_not_found());
    }
}
