//! Directory control-plane request/reply grammar (see SPEC_FULL §4.1).

use std::fmt;
use std::net::IpAddr;

use crate::limits::{MAX_NAME_LEN, MAX_USER_LEN};

/// A request sent by a client (or another component) to the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirRequest {
    List,
    CreateAnon {
        name: String,
    },
    CreateWithUser {
        name: String,
        user: String,
    },
    Join {
        name: String,
        user: String,
        ip: IpAddr,
        port: u16,
    },
    Merge {
        user: String,
        token_a: String,
        group_a: String,
        token_b: String,
        group_b: String,
    },
}

/// Why a directory request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirErrorReason {
    NoSlot,
    Spawn,
    NotFound,
    MergeSyntax,
    NoToken,
    BadToken,
    UnknownCmd,
}

impl DirErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoSlot => "no_slot",
            Self::Spawn => "spawn",
            Self::NotFound => "notfound",
            Self::MergeSyntax => "merge_syntax",
            Self::NoToken => "no_token",
            Self::BadToken => "bad_token",
            Self::UnknownCmd => "unknown_cmd",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "no_slot" => Self::NoSlot,
            "spawn" => Self::Spawn,
            "notfound" => Self::NotFound,
            "merge_syntax" => Self::MergeSyntax,
            "no_token" => Self::NoToken,
            "bad_token" => Self::BadToken,
            _ => Self::UnknownCmd,
        }
    }
}

impl fmt::Display for DirErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reply sent by the directory back to the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirReply {
    List(Vec<(String, u16)>),
    Created { name: String, port: u16, token: Option<String> },
    Joined { name: String, port: u16 },
    Merged { group_a: String, group_b: String },
    Err(DirErrorReason),
}

impl fmt::Display for DirReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirReply::List(groups) => {
                if groups.is_empty() {
                    write!(f, "(aucun)")
                } else {
                    let lines: Vec<String> =
                        groups.iter().map(|(name, port)| format!("{name} {port}")).collect();
                    write!(f, "{}", lines.join("\n"))
                }
            }
            DirReply::Created { name, port, token: None } => write!(f, "OK {name} {port}"),
            DirReply::Created { name, port, token: Some(token) } => {
                write!(f, "OK {name} {port} {token}")
            }
            DirReply::Joined { name, port } => write!(f, "OK {name} {port}"),
            DirReply::Merged { group_a, group_b } => write!(f, "OK MERGE {group_a} {group_b}"),
            DirReply::Err(reason) => write!(f, "ERR {reason}"),
        }
    }
}

fn valid_name(s: &str) -> bool {
    !s.is_empty() && s.len() <= MAX_NAME_LEN && !s.chars().any(char::is_whitespace)
}

fn valid_user(s: &str) -> bool {
    !s.is_empty() && s.len() <= MAX_USER_LEN && !s.chars().any(char::is_whitespace)
}

/// Parse a single directory request datagram.
pub fn parse_request(line: &str) -> Result<DirRequest, DirErrorReason> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut parts = line.split_whitespace();
    let cmd = parts.next().ok_or(DirErrorReason::UnknownCmd)?;

    match cmd {
        "LIST" => Ok(DirRequest::List),
        "CREATE" => {
            let name = parts.next().ok_or(DirErrorReason::MergeSyntax)?;
            if !valid_name(name) {
                return Err(DirErrorReason::MergeSyntax);
            }
            match parts.next() {
                None => Ok(DirRequest::CreateAnon { name: name.to_owned() }),
                Some(user) => {
                    if !valid_user(user) {
                        return Err(DirErrorReason::MergeSyntax);
                    }
                    Ok(DirRequest::CreateWithUser { name: name.to_owned(), user: user.to_owned() })
                }
            }
        }
        "JOIN" => {
            let name = parts.next().ok_or(DirErrorReason::MergeSyntax)?;
            let user = parts.next().ok_or(DirErrorReason::MergeSyntax)?;
            let ip = parts.next().ok_or(DirErrorReason::MergeSyntax)?;
            let port = parts.next().ok_or(DirErrorReason::MergeSyntax)?;
            if !valid_name(name) || !valid_user(user) {
                return Err(DirErrorReason::MergeSyntax);
            }
            let ip: IpAddr = ip.parse().map_err(|_| DirErrorReason::MergeSyntax)?;
            let port: u16 = port.parse().map_err(|_| DirErrorReason::MergeSyntax)?;
            Ok(DirRequest::Join { name: name.to_owned(), user: user.to_owned(), ip, port })
        }
        "MERGE" => {
            let user = parts.next().ok_or(DirErrorReason::MergeSyntax)?;
            let token_a = parts.next().ok_or(DirErrorReason::MergeSyntax)?;
            let group_a = parts.next().ok_or(DirErrorReason::MergeSyntax)?;
            let token_b = parts.next().ok_or(DirErrorReason::MergeSyntax)?;
            let group_b = parts.next().ok_or(DirErrorReason::MergeSyntax)?;
            if !valid_user(user) || !valid_name(group_a) || !valid_name(group_b) {
                return Err(DirErrorReason::MergeSyntax);
            }
            Ok(DirRequest::Merge {
                user: user.to_owned(),
                token_a: token_a.to_owned(),
                group_a: group_a.to_owned(),
                token_b: token_b.to_owned(),
                group_b: group_b.to_owned(),
            })
        }
        _ => Err(DirErrorReason::UnknownCmd),
    }
}

/// A directory reply, as seen by the client: loosely structured since the
/// client already knows which request it sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyLine {
    /// An `OK ...` reply, split into its whitespace-separated fields.
    Ok(Vec<String>),
    Err(DirErrorReason),
    List(Vec<(String, u16)>),
}

/// Parse a reply datagram the directory sent back. Best-effort inverse of
/// [`DirReply`]'s `Display` impl, used client-side.
pub fn parse_reply(text: &str) -> ReplyLine {
    let text = text.trim();
    if text == "(aucun)" {
        return ReplyLine::List(Vec::new());
    }
    if let Some(rest) = text.strip_prefix("ERR ") {
        return ReplyLine::Err(DirErrorReason::from_str(rest.trim()));
    }
    if let Some(rest) = text.strip_prefix("OK ") {
        return ReplyLine::Ok(rest.split_whitespace().map(str::to_owned).collect());
    }

    let groups: Vec<(String, u16)> = text
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?;
            let port: u16 = parts.next()?.parse().ok()?;
            Some((name.to_owned(), port))
        })
        .collect();
    if !groups.is_empty() {
        return ReplyLine::List(groups);
    }
    ReplyLine::Err(DirErrorReason::UnknownCmd)
}
