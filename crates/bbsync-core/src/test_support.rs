//! Minimal HTTP responder for exercising the client against a real socket

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A request as the responder received it
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Answer one connection per canned `(status, body)` response, in order.
///
/// Returns the endpoint URL and a handle resolving to the captured requests.
pub async fn spawn_responder(
    responses: Vec<(u16, &'static str)>,
) -> (String, JoinHandle<Vec<CapturedRequest>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}/", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let mut captured = Vec::new();
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            captured.push(read_request(&mut socket).await);

            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                if status == 200 { "OK" } else { "Error" },
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
        captured
    });

    (endpoint, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before headers were complete");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split(' ');
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    CapturedRequest {
        method,
        path,
        headers,
        body,
    }
}

/// In-memory watch source that records subscribe/unsubscribe order
#[derive(Debug, Clone, Default)]
pub struct FakeSource {
    state: std::sync::Arc<std::sync::Mutex<FakeState>>,
}

#[derive(Debug, Default)]
struct FakeState {
    log: Vec<String>,
    live: usize,
    max_live: usize,
    fail_next: bool,
    senders: Vec<(u64, tokio::sync::mpsc::UnboundedSender<crate::watch::WatchNotification>)>,
}

struct FakeGuard {
    session: u64,
    state: std::sync::Arc<std::sync::Mutex<FakeState>>,
}

impl Drop for FakeGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("unsubscribe {}", self.session));
        state.live -= 1;
        let session = self.session;
        state.senders.retain(|(id, _)| *id != session);
    }
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    /// Number of subscriptions currently alive
    pub fn live(&self) -> usize {
        self.state.lock().unwrap().live
    }

    /// Highest number of subscriptions ever alive at once
    pub fn max_live(&self) -> usize {
        self.state.lock().unwrap().max_live
    }

    /// Make the next subscribe call fail
    pub fn fail_next(&self) {
        self.state.lock().unwrap().fail_next = true;
    }

    /// Emit a notification from `session`. Returns false if that session
    /// is no longer subscribed.
    pub fn emit(
        &self,
        session: u64,
        kind: crate::watch::WatchEventKind,
        path: impl Into<std::path::PathBuf>,
    ) -> bool {
        let state = self.state.lock().unwrap();
        let Some((_, tx)) = state.senders.iter().find(|(id, _)| *id == session) else {
            return false;
        };
        tx.send(crate::watch::WatchNotification {
            session,
            kind,
            path: path.into(),
        })
        .is_ok()
    }
}

impl crate::watch::WatchSource for FakeSource {
    fn subscribe(
        &mut self,
        spec: &crate::watch::WatchSpec,
        tx: tokio::sync::mpsc::UnboundedSender<crate::watch::WatchNotification>,
    ) -> crate::error::SyncResult<crate::watch::Subscription> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next) {
            return Err(crate::error::SyncError::Watch {
                path: spec.directories.first().cloned().unwrap_or_default(),
                message: "refused".to_string(),
            });
        }

        state.log.push(format!("subscribe {}", spec.session));
        state.live += 1;
        state.max_live = state.max_live.max(state.live);
        state.senders.push((spec.session, tx));

        Ok(crate::watch::Subscription::new(
            spec.session,
            FakeGuard {
                session: spec.session,
                state: self.state.clone(),
            },
        ))
    }
}
