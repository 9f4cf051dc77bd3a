//! Per-group state: membership, bans, sticky banners, and the activity
//! clock. Grounded on `GroupeISY.c`'s `Member`/banner globals, translated
//! from fixed-size C arrays under a single mutex to a `HashMap`/`HashSet`
//! under the same single-mutex discipline (§5).

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use chatfab_wire::group::{format_broadcast, GroupMessage, JOINED_SENTINEL, LEFT_SENTINEL};
use chatfab_wire::limits::MAX_MEMBERS_PER_GROUP;

/// A sticky banner slot: either the admin banner or the idle banner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Banner {
    pub active: bool,
    pub text: String,
}

impl Banner {
    pub fn set(&mut self, text: String) {
        self.active = true;
        self.text = text;
    }

    pub fn clear(&mut self) {
        self.active = false;
        self.text.clear();
    }
}

/// A side effect the engine must perform in response to a state
/// transition. Keeping these as data (rather than calling the socket
/// directly from state methods) keeps the state machine synchronous and
/// trivially testable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    UnicastTo(SocketAddr, String),
    BroadcastAll(String),
    /// Remove a member from the roster. Sequenced as its own effect (rather
    /// than mutating `members` directly) so a preceding `BroadcastAll` still
    /// sees the departing member when the engine snapshots the roster to
    /// actually send it.
    RemoveMember(String),
    Terminate,
}

fn format_audit(group: &str, text: &str) -> String {
    format!("GROUPE[{group}]: {text}")
}

pub struct GroupState {
    pub name: String,
    pub members: HashMap<String, SocketAddr>,
    pub banned: HashSet<String>,
    pub admin_banner: Banner,
    pub idle_banner: Banner,
    pub token: Option<String>,
    pub last_activity_secs: u64,
}

impl GroupState {
    pub fn new(name: impl Into<String>, now: u64) -> Self {
        Self {
            name: name.into(),
            members: HashMap::new(),
            banned: HashSet::new(),
            admin_banner: Banner::default(),
            idle_banner: Banner::default(),
            token: None,
            last_activity_secs: now,
        }
    }

    /// Reset the idle clock. If the idle banner was active, clear it and
    /// surface the `CTRL IBANNER_CLR` broadcast.
    pub fn touch_activity(&mut self, now: u64) -> Option<Effect> {
        self.last_activity_secs = now;
        if self.idle_banner.active {
            self.idle_banner.clear();
            Some(Effect::BroadcastAll(GroupMessage::CtrlIBannerClr.to_string()))
        } else {
            None
        }
    }

    fn replay_banners(&self, addr: SocketAddr) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.admin_banner.active {
            effects.push(Effect::UnicastTo(
                addr,
                GroupMessage::CtrlBannerSet { text: self.admin_banner.text.clone() }.to_string(),
            ));
        }
        if self.idle_banner.active {
            effects.push(Effect::UnicastTo(
                addr,
                GroupMessage::CtrlIBannerSet { text: self.idle_banner.text.clone() }.to_string(),
            ));
        }
        effects
    }

    /// Handle an inbound `MSG <user> <text>` datagram (§4.2 membership
    /// algorithm).
    pub fn handle_msg(&mut self, user: &str, text: &str, addr: SocketAddr, now: u64) -> Vec<Effect> {
        let mut effects: Vec<Effect> = self.touch_activity(now).into_iter().collect();

        if self.banned.contains(user) {
            effects.push(Effect::UnicastTo(addr, "SYS Vous etes banni de ce groupe.".to_owned()));
            return effects;
        }

        let is_new = !self.members.contains_key(user);
        if is_new && self.members.len() >= MAX_MEMBERS_PER_GROUP {
            effects.push(Effect::UnicastTo(addr, "SYS Groupe plein.".to_owned()));
            return effects;
        }

        self.members.insert(user.to_owned(), addr);

        if text == LEFT_SENTINEL {
            effects.push(Effect::BroadcastAll(format_broadcast(&self.name, Some(user), text)));
            effects.push(Effect::RemoveMember(user.to_owned()));
            return effects;
        }

        if is_new || text == JOINED_SENTINEL {
            effects.extend(self.replay_banners(addr));
        }

        effects.push(Effect::BroadcastAll(format_broadcast(&self.name, Some(user), text)));
        effects
    }

    /// Trust-on-first-use token binding: the first non-empty token
    /// presented by a moderation command is adopted if none is stored yet.
    /// Returns whether `token` is now (or already was) the authoritative
    /// token.
    pub fn bind_or_check_token(&mut self, token: &str) -> bool {
        match &self.token {
            Some(stored) => stored == token,
            None => {
                if token.is_empty() {
                    return false;
                }
                self.token = Some(token.to_owned());
                true
            }
        }
    }

    /// `CTRL SETTOKEN` always overwrites the stored token.
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn ban(&mut self, user: &str, actor: Option<&str>) -> Vec<Effect> {
        self.banned.insert(user.to_owned());
        self.members.remove(user);
        let audit = match actor {
            Some(a) => format!("[Action] ({a}) a banni ({user})"),
            None => format!("[Action] a banni ({user})"),
        };
        vec![Effect::BroadcastAll(format_audit(&self.name, &audit))]
    }

    /// Returns whether the user was actually banned (false means
    /// already-unbanned, which the caller reports as `OK not_banned`).
    pub fn unban(&mut self, user: &str) -> bool {
        self.banned.remove(user)
    }

    pub fn list_members(&self) -> Vec<String> {
        let mut names: Vec<String> = self.members.keys().cloned().collect();
        names.sort();
        names
    }
}
