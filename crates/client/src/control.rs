//! Directory control-plane operations: LIST/CREATE/JOIN/MERGE, each with a
//! bounded retry since the directory talks plain UDP with no delivery
//! guarantee (see SPEC_FULL §4.3 and scenario 6: "proceed optimistically").

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use chatfab_wire::directory::{parse_reply, ReplyLine};
use tokio::net::UdpSocket;
use tracing::warn;

const DEFAULT_RETRIES: usize = 3;
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Talks to the directory over a single UDP socket, retrying a bounded
/// number of times before giving up on a request.
pub struct ControlClient {
    socket: UdpSocket,
    directory_addr: SocketAddr,
    retries: usize,
    per_attempt_timeout: Duration,
}

impl ControlClient {
    pub fn new(socket: UdpSocket, directory_addr: SocketAddr) -> Self {
        Self { socket, directory_addr, retries: DEFAULT_RETRIES, per_attempt_timeout: DEFAULT_TIMEOUT }
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_attempt_timeout = timeout;
        self
    }

    async fn send_once(&self, text: &str) -> Option<String> {
        if let Err(error) = self.socket.send_to(text.as_bytes(), self.directory_addr).await {
            warn!(%error, "failed to send directory request");
            return None;
        }
        let mut buf = [0u8; 1500];
        match tokio::time::timeout(self.per_attempt_timeout, self.socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => Some(String::from_utf8_lossy(&buf[..len]).into_owned()),
            Ok(Err(error)) => {
                warn!(%error, "directory socket read failed");
                None
            }
            Err(_) => None,
        }
    }

    /// Send `text`, retrying up to `self.retries` times. Returns `None` if
    /// every attempt was inconclusive (no reply, or a transport error) — the
    /// caller decides whether to proceed optimistically or surface an error.
    pub async fn request(&self, text: &str) -> Option<ReplyLine> {
        for attempt in 0..self.retries {
            if let Some(reply) = self.send_once(text).await {
                return Some(parse_reply(&reply));
            }
            warn!(attempt, request = text, "directory request attempt failed");
        }
        None
    }

    /// List known groups. An inconclusive result after all retries is
    /// reported as an empty list rather than an error, matching scenario 6's
    /// "proceed optimistically" guidance for a read-only query.
    pub async fn list(&self) -> Vec<(String, u16)> {
        match self.request("LIST").await {
            Some(ReplyLine::List(groups)) => groups,
            _ => Vec::new(),
        }
    }

    pub async fn create(&self, name: &str) -> Option<ReplyLine> {
        self.request(&format!("CREATE {name}")).await
    }

    pub async fn create_with_user(&self, name: &str, user: &str) -> Option<ReplyLine> {
        self.request(&format!("CREATE {name} {user}")).await
    }

    pub async fn join(&self, name: &str, user: &str, ip: IpAddr, port: u16) -> Option<ReplyLine> {
        self.request(&format!("JOIN {name} {user} {ip} {port}")).await
    }

    pub async fn merge(
        &self,
        user: &str,
        token_a: &str,
        group_a: &str,
        token_b: &str,
        group_b: &str,
    ) -> Option<ReplyLine> {
        self.request(&format!("MERGE {user} {token_a} {group_a} {token_b} {group_b}")).await
    }
}

#[cfg(test)]
// OK to panic in test-only code -- assertion failures should fail loudly.
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::net::UdpSocket;

    /// A directory stand-in that drops the first `drop_count` datagrams it
    /// receives before replying, to exercise the retry path.
    async fn flaky_responder(reply: &'static str, drop_count: usize) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            loop {
                let Ok((_, from)) = socket.recv_from(&mut buf).await else { break };
                let count = seen.fetch_add(1, Ordering::SeqCst);
                if count < drop_count {
                    continue;
                }
                let _ = socket.send_to(reply.as_bytes(), from).await;
            }
        });
        addr
    }

    async fn client_to(addr: SocketAddr) -> ControlClient {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        ControlClient::new(socket, addr).with_timeout(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn list_succeeds_on_first_try() {
        let addr = flaky_responder("chat 8010", 0).await;
        let client = client_to(addr).await;
        assert_eq!(client.list().await, vec![("chat".to_owned(), 8010)]);
    }

    #[tokio::test]
    async fn list_recovers_after_dropped_replies() {
        let addr = flaky_responder("chat 8010", 2).await;
        let client = client_to(addr).await.with_retries(5);
        assert_eq!(client.list().await, vec![("chat".to_owned(), 8010)]);
    }

    #[tokio::test]
    async fn list_gives_up_after_exhausting_retries() {
        let addr = flaky_responder("chat 8010", 10).await;
        let client = client_to(addr).await.with_retries(2);
        assert_eq!(client.list().await, Vec::new());
    }

    #[tokio::test]
    async fn create_parses_ok_reply() {
        let addr = flaky_responder("OK chat 8010 deadbeef", 0).await;
        let client = client_to(addr).await;
        let reply = client.create("chat").await.unwrap();
        assert_eq!(
            reply,
            ReplyLine::Ok(vec!["chat".to_owned(), "8010".to_owned(), "deadbeef".to_owned()])
        );
    }

    #[tokio::test]
    async fn request_returns_none_when_unreachable() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let unreachable: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let client =
            ControlClient::new(socket, unreachable).with_retries(1).with_timeout(Duration::from_millis(50));
        assert!(client.request("LIST").await.is_none());
    }
}
