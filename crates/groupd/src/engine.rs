//! The group daemon's UDP loop: receive datagrams, dispatch them against
//! the group's state, and apply the resulting effects (unicasts,
//! broadcasts, termination). Concurrency model grounded on the teacher's
//! `tokio::select!`-over-cancellation-token shape (§5).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chatfab_wire::group::parse_message;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::idle;
use crate::moderation;
use crate::state::{Effect, GroupState};

const MAX_DATAGRAM: usize = 1500;
const IDLE_TICK: Duration = Duration::from_secs(1);
const REDIRECT_SETTLE: Duration = Duration::from_millis(500);

pub struct Engine {
    name: String,
    idle_timeout_sec: u64,
    socket: UdpSocket,
    state: Mutex<GroupState>,
    clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn new(name: String, idle_timeout_sec: u64, socket: UdpSocket, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_secs();
        let state = Mutex::new(GroupState::new(name.clone(), now));
        Self { name, idle_timeout_sec, socket, state, clock }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut ticker = tokio::time::interval(IDLE_TICK);

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    let (len, peer) = match result {
                        Ok(pair) => pair,
                        Err(error) => {
                            warn!(group = %self.name, %error, "recv error");
                            continue;
                        }
                    };
                    if self.handle_datagram(&buf[..len], peer).await {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if self.tick_idle().await {
                        break;
                    }
                }
                () = shutdown.cancelled() => {
                    info!(group = %self.name, "group daemon shutting down");
                    break;
                }
            }
        }
    }

    /// Returns true if the group should terminate.
    async fn handle_datagram(&self, bytes: &[u8], peer: SocketAddr) -> bool {
        let Ok(text) = std::str::from_utf8(bytes) else {
            return false;
        };
        let msg = match parse_message(text) {
            Ok(msg) => msg,
            Err(reason) => {
                self.send_to(peer, &format!("ERR {reason}")).await;
                return false;
            }
        };

        let now = self.clock.now_secs();
        let redirecting = matches!(msg, chatfab_wire::group::GroupMessage::CtrlRedirect { .. });
        let effects = {
            let mut state = self.state.lock().await;
            moderation::dispatch(&mut state, msg, peer, now, &self.name)
        };

        let terminate = self.apply_effects(effects).await;
        if redirecting && terminate {
            tokio::time::sleep(REDIRECT_SETTLE).await;
        }
        terminate
    }

    async fn tick_idle(&self) -> bool {
        let now = self.clock.now_secs();
        let effects = {
            let mut state = self.state.lock().await;
            idle::check(&mut state, self.idle_timeout_sec, now, &self.name)
        };
        self.apply_effects(effects).await
    }

    async fn apply_effects(&self, effects: Vec<Effect>) -> bool {
        let mut terminate = false;
        for effect in effects {
            match effect {
                Effect::UnicastTo(addr, text) => self.send_to(addr, &text).await,
                Effect::BroadcastAll(text) => self.broadcast(&text).await,
                Effect::RemoveMember(user) => {
                    self.state.lock().await.members.remove(&user);
                }
                Effect::Terminate => terminate = true,
            }
        }
        terminate
    }

    async fn broadcast(&self, text: &str) {
        let members: Vec<SocketAddr> = {
            let state = self.state.lock().await;
            state.members.values().copied().collect()
        };
        for addr in members {
            self.send_to(addr, text).await;
        }
    }

    async fn send_to(&self, addr: SocketAddr, text: &str) {
        if let Err(error) = self.socket.send_to(text.as_bytes(), addr).await {
            warn!(group = %self.name, %addr, %error, "send failed");
        }
    }
}
