//! Group daemon message grammar (see SPEC_FULL §4.2).

use std::fmt;

use crate::limits::{MAX_TEXT_LEN, MAX_USER_LEN};

/// The attach sentinel a client sends immediately after joining.
pub const JOINED_SENTINEL: &str = "(joined)";

/// The detach sentinel a client sends before leaving.
pub const LEFT_SENTINEL: &str = "(left)";

/// A message received by a group daemon, from either a client or the
/// directory's administrative channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupMessage {
    Msg { user: String, text: String },
    CmdBan { token: String, user: String },
    CmdUnban { token: String, user: String },
    CmdBan2 { token: String, admin_user: String, user: String },
    CmdUnban2 { token: String, admin_user: String, user: String },
    CmdList,
    CmdDelete { user: String },
    CtrlBannerSet { text: String },
    CtrlBannerClr,
    CtrlIBannerSet { text: String },
    CtrlIBannerClr,
    CtrlSetToken { token: String },
    CtrlRedirect { group: String, port: u16, reason: String },
    Sys { text: String },
}

/// Why a group-level command was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupErrorReason {
    NotAdmin,
    BadArgs,
    UnknownCmd,
}

impl GroupErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAdmin => "not_admin",
            Self::BadArgs => "bad_args",
            Self::UnknownCmd => "unknown_cmd",
        }
    }
}

impl fmt::Display for GroupErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn valid_user(s: &str) -> bool {
    !s.is_empty() && s.len() <= MAX_USER_LEN && !s.chars().any(char::is_whitespace)
}

/// Whether `s` is a well-formed user name (non-empty, no whitespace, within
/// the length limit). Exposed so callers outside this crate can validate a
/// locally-configured user name before sending it over the wire.
pub fn is_valid_user(s: &str) -> bool {
    valid_user(s)
}

/// Split `line` into `(first_n_words, remainder)`, where remainder is the
/// untouched rest of the line (preserving internal whitespace) after the
/// `n`-th whitespace-separated word.
fn split_after_words(line: &str, n: usize) -> Option<(Vec<&str>, &str)> {
    let mut rest = line;
    let mut words = Vec::with_capacity(n);
    for _ in 0..n {
        let trimmed = rest.trim_start();
        let word_end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        if word_end == 0 {
            return None;
        }
        words.push(&trimmed[..word_end]);
        rest = &trimmed[word_end..];
    }
    Some((words, rest.trim_start()))
}

/// Parse a single group-daemon message datagram.
pub fn parse_message(line: &str) -> Result<GroupMessage, GroupErrorReason> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut head = line.splitn(2, char::is_whitespace);
    let cmd = head.next().unwrap_or("");

    match cmd {
        "MSG" => {
            let (words, text) =
                split_after_words(line, 2).ok_or(GroupErrorReason::BadArgs)?;
            let user = words[1];
            if !valid_user(user) || text.is_empty() || text.len() > MAX_TEXT_LEN {
                return Err(GroupErrorReason::BadArgs);
            }
            Ok(GroupMessage::Msg { user: user.to_owned(), text: text.to_owned() })
        }
        "CMD" => parse_cmd(line),
        "CTRL" => parse_ctrl(line),
        "SYS" => {
            let (_, text) = split_after_words(line, 1).ok_or(GroupErrorReason::BadArgs)?;
            if text.is_empty() {
                return Err(GroupErrorReason::BadArgs);
            }
            Ok(GroupMessage::Sys { text: text.to_owned() })
        }
        _ => Err(GroupErrorReason::UnknownCmd),
    }
}

fn parse_cmd(line: &str) -> Result<GroupMessage, GroupErrorReason> {
    let mut parts = line.split_whitespace();
    parts.next(); // "CMD"
    let sub = parts.next().ok_or(GroupErrorReason::BadArgs)?;
    match sub {
        "BAN" => {
            let token = parts.next().ok_or(GroupErrorReason::BadArgs)?;
            let user = parts.next().ok_or(GroupErrorReason::BadArgs)?;
            if !valid_user(user) {
                return Err(GroupErrorReason::BadArgs);
            }
            Ok(GroupMessage::CmdBan { token: token.to_owned(), user: user.to_owned() })
        }
        "UNBAN" => {
            let token = parts.next().ok_or(GroupErrorReason::BadArgs)?;
            let user = parts.next().ok_or(GroupErrorReason::BadArgs)?;
            if !valid_user(user) {
                return Err(GroupErrorReason::BadArgs);
            }
            Ok(GroupMessage::CmdUnban { token: token.to_owned(), user: user.to_owned() })
        }
        "BAN2" => {
            let token = parts.next().ok_or(GroupErrorReason::BadArgs)?;
            let admin_user = parts.next().ok_or(GroupErrorReason::BadArgs)?;
            let user = parts.next().ok_or(GroupErrorReason::BadArgs)?;
            if !valid_user(admin_user) || !valid_user(user) {
                return Err(GroupErrorReason::BadArgs);
            }
            Ok(GroupMessage::CmdBan2 {
                token: token.to_owned(),
                admin_user: admin_user.to_owned(),
                user: user.to_owned(),
            })
        }
        "UNBAN2" => {
            let token = parts.next().ok_or(GroupErrorReason::BadArgs)?;
            let admin_user = parts.next().ok_or(GroupErrorReason::BadArgs)?;
            let user = parts.next().ok_or(GroupErrorReason::BadArgs)?;
            if !valid_user(admin_user) || !valid_user(user) {
                return Err(GroupErrorReason::BadArgs);
            }
            Ok(GroupMessage::CmdUnban2 {
                token: token.to_owned(),
                admin_user: admin_user.to_owned(),
                user: user.to_owned(),
            })
        }
        "LIST" => Ok(GroupMessage::CmdList),
        "DELETE" => {
            let user = parts.next().ok_or(GroupErrorReason::BadArgs)?;
            if !valid_user(user) {
                return Err(GroupErrorReason::BadArgs);
            }
            Ok(GroupMessage::CmdDelete { user: user.to_owned() })
        }
        _ => Err(GroupErrorReason::UnknownCmd),
    }
}

fn parse_ctrl(line: &str) -> Result<GroupMessage, GroupErrorReason> {
    let mut parts = line.split_whitespace();
    parts.next(); // "CTRL"
    let sub = parts.next().ok_or(GroupErrorReason::BadArgs)?;
    match sub {
        "BANNER_SET" => {
            let (_, text) = split_after_words(line, 2).ok_or(GroupErrorReason::BadArgs)?;
            if text.is_empty() {
                return Err(GroupErrorReason::BadArgs);
            }
            Ok(GroupMessage::CtrlBannerSet { text: text.to_owned() })
        }
        "BANNER_CLR" => Ok(GroupMessage::CtrlBannerClr),
        "IBANNER_SET" => {
            let (_, text) = split_after_words(line, 2).ok_or(GroupErrorReason::BadArgs)?;
            if text.is_empty() {
                return Err(GroupErrorReason::BadArgs);
            }
            Ok(GroupMessage::CtrlIBannerSet { text: text.to_owned() })
        }
        "IBANNER_CLR" => Ok(GroupMessage::CtrlIBannerClr),
        "SETTOKEN" => {
            let token = parts.next().ok_or(GroupErrorReason::BadArgs)?;
            Ok(GroupMessage::CtrlSetToken { token: token.to_owned() })
        }
        "REDIRECT" => {
            let group = parts.next().ok_or(GroupErrorReason::BadArgs)?;
            let port = parts.next().ok_or(GroupErrorReason::BadArgs)?;
            let port: u16 = port.parse().map_err(|_| GroupErrorReason::BadArgs)?;
            let (_, reason) = split_after_words(line, 4).ok_or(GroupErrorReason::BadArgs)?;
            Ok(GroupMessage::CtrlRedirect {
                group: group.to_owned(),
                port,
                reason: reason.to_owned(),
            })
        }
        _ => Err(GroupErrorReason::UnknownCmd),
    }
}

impl fmt::Display for GroupMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupMessage::Msg { user, text } => write!(f, "MSG {user} {text}"),
            GroupMessage::CmdBan { token, user } => write!(f, "CMD BAN {token} {user}"),
            GroupMessage::CmdUnban { token, user } => write!(f, "CMD UNBAN {token} {user}"),
            GroupMessage::CmdBan2 { token, admin_user, user } => {
                write!(f, "CMD BAN2 {token} {admin_user} {user}")
            }
            GroupMessage::CmdUnban2 { token, admin_user, user } => {
                write!(f, "CMD UNBAN2 {token} {admin_user} {user}")
            }
            GroupMessage::CmdList => write!(f, "CMD LIST"),
            GroupMessage::CmdDelete { user } => write!(f, "CMD DELETE {user}"),
            GroupMessage::CtrlBannerSet { text } => write!(f, "CTRL BANNER_SET {text}"),
            GroupMessage::CtrlBannerClr => write!(f, "CTRL BANNER_CLR"),
            GroupMessage::CtrlIBannerSet { text } => write!(f, "CTRL IBANNER_SET {text}"),
            GroupMessage::CtrlIBannerClr => write!(f, "CTRL IBANNER_CLR"),
            GroupMessage::CtrlSetToken { token } => write!(f, "CTRL SETTOKEN {token}"),
            GroupMessage::CtrlRedirect { group, port, reason } => {
                write!(f, "CTRL REDIRECT {group} {port} {reason}")
            }
            GroupMessage::Sys { text } => write!(f, "SYS {text}"),
        }
    }
}

/// Format a chat broadcast line, the way a group daemon fans MSG out to
/// its members. `None` sender means the server itself (SYS).
pub fn format_broadcast(group: &str, sender: Option<&str>, text: &str) -> String {
    match sender {
        Some(user) => format!("GROUPE[{group}]: Message de {user} : {text}"),
        None => format!("GROUPE[{group}]: Message de [SERVER] : {text}"),
    }
}
