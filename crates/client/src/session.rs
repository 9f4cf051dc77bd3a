//! Attach/detach handshake and redirect reaction (see SPEC_FULL §4.3,
//! scenarios 2 and 5).
//!
//! A client announces itself to a freshly joined group with
//! `MSG <user> (joined)` and announces its departure with
//! `MSG <user> (left)` before leaving or following a redirect. This module
//! only builds those wire messages and tracks which group the session is
//! currently attached to; sending them is the caller's job.

use std::net::SocketAddr;

use chatfab_wire::group::{GroupMessage, JOINED_SENTINEL, LEFT_SENTINEL};

#[derive(Debug)]
pub struct Session {
    user: String,
    current_group: Option<String>,
    peer_addr: Option<SocketAddr>,
    pending_redirect: Option<(String, SocketAddr, String)>,
}

impl Session {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into(), current_group: None, peer_addr: None, pending_redirect: None }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn current_group(&self) -> Option<&str> {
        self.current_group.as_deref()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Record a successful attach and build the `(joined)` datagram to send.
    pub fn attach(&mut self, group: impl Into<String>, addr: SocketAddr) -> String {
        self.current_group = Some(group.into());
        self.peer_addr = Some(addr);
        GroupMessage::Msg { user: self.user.clone(), text: JOINED_SENTINEL.to_owned() }.to_string()
    }

    /// Build the `(left)` datagram, if currently attached, and clear the
    /// session's notion of where it's attached.
    pub fn detach(&mut self) -> Option<String> {
        self.peer_addr = None;
        self.current_group.take().map(|_| {
            GroupMessage::Msg { user: self.user.clone(), text: LEFT_SENTINEL.to_owned() }.to_string()
        })
    }

    /// Record a `CTRL REDIRECT` observed on the receive side, to be acted on
    /// by the next call to [`Session::apply_pending_redirect`].
    pub fn note_redirect(&mut self, group: String, addr: SocketAddr, reason: String) {
        self.pending_redirect = Some((group, addr, reason));
    }

    pub fn has_pending_redirect(&self) -> bool {
        self.pending_redirect.is_some()
    }

    /// Detach from the old group and attach to the redirect target,
    /// returning `(detach_msg, new_group, new_addr, attach_msg)`.
    pub fn apply_pending_redirect(&mut self) -> Option<(String, String, SocketAddr, String)> {
        let (group, addr, _reason) = self.pending_redirect.take()?;
        let detach = self.detach();
        let attach = self.attach(group.clone(), addr);
        Some((detach.unwrap_or_default(), group, addr, attach))
    }
}
