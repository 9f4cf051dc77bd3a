//! Sorts datagrams arriving from a group daemon into the categories the
//! receive task needs to react to (see SPEC_FULL §4.3/§5): banner updates,
//! redirects, group deletion, and ordinary chat lines.

use chatfab_wire::group::{parse_message, GroupMessage};

const DELETION_MARKER: &str = "supprime";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    BannerSet(String),
    BannerClr,
    IdentityBannerSet(String),
    IdentityBannerClr,
    Redirect { group: String, port: u16, reason: String },
    Deletion(String),
    Chat(String),
}

/// Categorize one raw datagram received on the client's group socket.
///
/// Control lines (`CTRL ...`) arrive verbatim, forwarded by the group
/// daemon to every member. Ordinary chat traffic arrives pre-formatted
/// (`GROUPE[...]: ...`) and never parses as a [`GroupMessage`], so it falls
/// through to [`Category::Chat`] unchanged. The one exception is a group's
/// own idle-expiry announcement, which is sent as a raw `SYS` line rather
/// than being wrapped like other server broadcasts.
pub fn categorize(raw: &str) -> Category {
    match parse_message(raw) {
        Ok(GroupMessage::CtrlBannerSet { text }) => Category::BannerSet(text),
        Ok(GroupMessage::CtrlBannerClr) => Category::BannerClr,
        Ok(GroupMessage::CtrlIBannerSet { text }) => Category::IdentityBannerSet(text),
        Ok(GroupMessage::CtrlIBannerClr) => Category::IdentityBannerClr,
        Ok(GroupMessage::CtrlRedirect { group, port, reason }) => {
            Category::Redirect { group, port, reason }
        }
        Ok(GroupMessage::Sys { text }) if text.contains(DELETION_MARKER) => Category::Deletion(text),
        Ok(GroupMessage::Sys { text }) => Category::Chat(text),
        _ => Category::Chat(raw.to_owned()),
    }
}
