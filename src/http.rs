use std::thread;
use std::time::Duration;

/// Retry schedule for catalog fetches. Only transient statuses and transport
/// errors are retried; hard client errors fail on first sight.
#[derive(Debug, Clone)]
pub(crate) struct RetryPolicy {
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) attempts: usize,
    pub(crate) retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(5),
            attempts: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

pub(crate) fn fetch_text(url: &str, policy: &RetryPolicy) -> Result<String, String> {
    let attempts = policy.attempts.max(1);

    for attempt in 1..=attempts {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(policy.connect_timeout)
            .timeout_read(policy.read_timeout)
            .timeout_write(policy.read_timeout)
            .build();

        let request = agent.get(url).set("Accept", "application/json");

        match request.call() {
            Ok(response) => match response.into_string() {
                Ok(body) => return Ok(body),
                Err(err) => {
                    return Err(format!("catalog fetch failed: response decode failed: {err}"));
                }
            },
            Err(ureq::Error::Status(status, response)) => {
                let response_body = response.into_string().ok().unwrap_or_default();
                let body = response_body.trim();
                let status_error = if body.is_empty() {
                    format!("HTTP status {status}")
                } else {
                    let truncated = body.chars().take(240).collect::<String>();
                    format!("HTTP status {status} ({truncated})")
                };

                if is_transient_status(status) && attempt < attempts {
                    thread::sleep(policy.retry_delay);
                    continue;
                }

                if is_transient_status(status) {
                    return Err(format!(
                        "catalog fetch failed after {attempts} attempt(s): {status_error}"
                    ));
                }

                return Err(format!("catalog fetch failed: {status_error}"));
            }
            Err(ureq::Error::Transport(err)) => {
                let transport_error = format!("transport error: {err}");
                if attempt < attempts {
                    thread::sleep(policy.retry_delay);
                    continue;
                }
                return Err(format!(
                    "catalog fetch failed after {attempts} attempt(s): {transport_error}"
                ));
            }
        }
    }

    Err("catalog fetch failed: exhausted attempts without a concrete error".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};

    /// One canned HTTP response, optionally delayed to trip read timeouts.
    #[derive(Debug, Clone, Copy)]
    struct Reply {
        delay: Duration,
        status: u16,
        body: &'static str,
    }

    fn reply(status: u16, body: &'static str) -> Reply {
        Reply {
            delay: Duration::ZERO,
            status,
            body,
        }
    }

    fn slow_reply(delay: Duration, status: u16, body: &'static str) -> Reply {
        Reply { delay, status, body }
    }

    /// Loopback server that serves a scripted queue of replies, one per
    /// request, counting how many requests arrived.
    struct TestServer {
        base_url: String,
        requests: Arc<AtomicUsize>,
        shutdown_tx: mpsc::Sender<()>,
        join_handle: Option<std::thread::JoinHandle<()>>,
    }

    impl TestServer {
        fn spawn(replies: Vec<Reply>) -> Self {
            let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind test server");
            listener.set_nonblocking(true).expect("set nonblocking");
            let addr = listener.local_addr().expect("local addr");

            let requests = Arc::new(AtomicUsize::new(0));
            let requests_clone = Arc::clone(&requests);
            let queue = Arc::new(Mutex::new(VecDeque::from(replies)));
            let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

            let join_handle = std::thread::spawn(move || {
                loop {
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }
                    match listener.accept() {
                        Ok((mut stream, _)) => {
                            requests_clone.fetch_add(1, Ordering::SeqCst);
                            let next = queue
                                .lock()
                                .expect("lock reply queue")
                                .pop_front()
                                .unwrap_or(reply(200, "default-ok"));
                            std::thread::spawn(move || {
                                let _ = drain_request_head(&mut stream);
                                if !next.delay.is_zero() {
                                    std::thread::sleep(next.delay);
                                }
                                let _ = write_reply(&mut stream, next);
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
                shutdown_tx,
                join_handle: Some(join_handle),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
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

    /// Read until the header terminator so the client sees a well-formed
    /// exchange; the request content itself is irrelevant.
    fn drain_request_head(stream: &mut TcpStream) -> std::io::Result<()> {
        stream.set_read_timeout(Some(Duration::from_millis(200)))?;
        let mut buf = [0_u8; 1024];
        let mut seen = Vec::new();
        loop {
            match stream.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(read) => {
                    seen.extend_from_slice(&buf[..read]);
                    if seen.windows(4).any(|window| window == b"\r\n\r\n") {
                        return Ok(());
                    }
                }
                Err(err)
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut =>
                {
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn write_reply(stream: &mut TcpStream, reply: Reply) -> std::io::Result<()> {
        // The client only inspects the status code; the reason phrase is
        // cosmetic.
        let reason = if reply.status == 200 { "OK" } else { "Nope" };
        write!(
            stream,
            "HTTP/1.1 {} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            reply.status,
            reply.body.len()
        )?;
        stream.write_all(reply.body.as_bytes())?;
        stream.flush()
    }

    fn fast_policy(attempts: usize) -> RetryPolicy {
        RetryPolicy {
            connect_timeout: Duration::from_millis(200),
            read_timeout: Duration::from_millis(200),
            attempts,
            retry_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn retries_transient_statuses_until_success() {
        let server = TestServer::spawn(vec![
            reply(500, "server-error"),
            reply(429, "throttled"),
            reply(200, "ok"),
        ]);

        let result = fetch_text(&server.base_url, &fast_policy(3));

        assert_eq!(result.expect("should eventually succeed"), "ok");
        assert_eq!(server.request_count(), 3);
    }

    #[test]
    fn does_not_retry_hard_client_errors() {
        let server = TestServer::spawn(vec![reply(404, "not-found")]);

        let result = fetch_text(&server.base_url, &fast_policy(5));

        let err = result.expect_err("404 should not be retried");
        assert!(
            err.contains("HTTP status 404"),
            "unexpected error message: {err}"
        );
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn retries_transport_timeout_and_recovers() {
        let server = TestServer::spawn(vec![
            slow_reply(Duration::from_millis(120), 200, "slow"),
            reply(200, "ok"),
        ]);

        let policy = RetryPolicy {
            connect_timeout: Duration::from_millis(250),
            read_timeout: Duration::from_millis(20),
            attempts: 2,
            retry_delay: Duration::from_millis(1),
        };
        let result = fetch_text(&server.base_url, &policy);

        assert_eq!(result.expect("timeout should be retried"), "ok");
        assert_eq!(server.request_count(), 2);
    }

    #[test]
    fn returns_retry_exhausted_error_for_transient_status() {
        let server = TestServer::spawn(vec![reply(503, "down"), reply(503, "still-down")]);

        let result = fetch_text(&server.base_url, &fast_policy(2));

        let err = result.expect_err("transient failures should eventually error");
        assert!(
            err.contains("after 2 attempt(s)") && err.contains("HTTP status 503"),
            "unexpected error message: {err}"
        );
        assert_eq!(server.request_count(), 2);
    }
}
