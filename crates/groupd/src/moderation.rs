//! Dispatch of every group-daemon message (§4.2) onto [`GroupState`]
//! transitions, including ban/unban token enforcement.

use std::net::SocketAddr;

use chatfab_wire::group::{format_broadcast, GroupMessage};

use crate::state::{Effect, GroupState};

/// Route a parsed [`GroupMessage`] to the right state transition and
/// collect the resulting effects.
pub fn dispatch(
    state: &mut GroupState,
    msg: GroupMessage,
    peer: SocketAddr,
    now: u64,
    group_name: &str,
) -> Vec<Effect> {
    match msg {
        GroupMessage::Msg { user, text } => state.handle_msg(&user, &text, peer, now),
        GroupMessage::CmdBan { token, user } => {
            let mut effects: Vec<Effect> = state.touch_activity(now).into_iter().collect();
            effects.extend(ban(state, &token, None, &user, peer));
            effects
        }
        GroupMessage::CmdBan2 { token, admin_user, user } => {
            let mut effects: Vec<Effect> = state.touch_activity(now).into_iter().collect();
            effects.extend(ban(state, &token, Some(&admin_user), &user, peer));
            effects
        }
        GroupMessage::CmdUnban { token, user } => {
            let mut effects: Vec<Effect> = state.touch_activity(now).into_iter().collect();
            effects.extend(unban(state, &token, &user, peer));
            effects
        }
        GroupMessage::CmdUnban2 { token, user, .. } => {
            let mut effects: Vec<Effect> = state.touch_activity(now).into_iter().collect();
            effects.extend(unban(state, &token, &user, peer));
            effects
        }
        GroupMessage::CmdList => {
            let mut effects: Vec<Effect> = state.touch_activity(now).into_iter().collect();
            let members = state.list_members();
            let body = if members.is_empty() { "(aucun)".to_owned() } else { members.join(" ") };
            effects.push(Effect::UnicastTo(peer, format!("OK {body}")));
            effects
        }
        GroupMessage::CmdDelete { user } => {
            let mut effects: Vec<Effect> = state.touch_activity(now).into_iter().collect();
            state.members.remove(&user);
            effects.push(Effect::UnicastTo(peer, "OK deleted".to_owned()));
            effects
        }
        GroupMessage::CtrlBannerSet { text } => {
            state.admin_banner.set(text.clone());
            vec![Effect::BroadcastAll(GroupMessage::CtrlBannerSet { text }.to_string())]
        }
        GroupMessage::CtrlBannerClr => {
            state.admin_banner.clear();
            vec![Effect::BroadcastAll(GroupMessage::CtrlBannerClr.to_string())]
        }
        GroupMessage::CtrlIBannerSet { text } => {
            state.idle_banner.set(text.clone());
            vec![Effect::BroadcastAll(GroupMessage::CtrlIBannerSet { text }.to_string())]
        }
        GroupMessage::CtrlIBannerClr => {
            state.idle_banner.clear();
            vec![Effect::BroadcastAll(GroupMessage::CtrlIBannerClr.to_string())]
        }
        GroupMessage::CtrlSetToken { token } => {
            state.set_token(token);
            Vec::new()
        }
        GroupMessage::CtrlRedirect { group, port, reason } => {
            let text = GroupMessage::CtrlRedirect { group, port, reason }.to_string();
            vec![Effect::BroadcastAll(text), Effect::Terminate]
        }
        GroupMessage::Sys { text } => {
            vec![Effect::BroadcastAll(format_broadcast(group_name, None, &text))]
        }
    }
}

fn ban(
    state: &mut GroupState,
    token: &str,
    admin_user: Option<&str>,
    user: &str,
    peer: SocketAddr,
) -> Vec<Effect> {
    if !state.bind_or_check_token(token) {
        return vec![Effect::UnicastTo(peer, "ERR not_admin".to_owned())];
    }
    let mut effects = vec![Effect::UnicastTo(peer, "OK banned".to_owned())];
    effects.extend(state.ban(user, admin_user));
    effects
}

fn unban(state: &mut GroupState, token: &str, user: &str, peer: SocketAddr) -> Vec<Effect> {
    if !state.bind_or_check_token(token) {
        return vec![Effect::UnicastTo(peer, "ERR not_admin".to_owned())];
    }
    if state.unban(user) {
        vec![Effect::UnicastTo(peer, "OK unbanned".to_owned())]
    } else {
        vec![Effect::UnicastTo(peer, "OK not_banned".to_owned())]
    }
}

#[cfg(test)]
// OK to panic in test-only code -- assertion failures should fail loudly.
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:9999".parse().unwrap()
    }

    #[test]
    fn ban_binds_token_on_first_use_and_broadcasts_audit() {
        let mut state = GroupState::new("chat", 0);
        let effects = dispatch(
            &mut state,
            GroupMessage::CmdBan2 {
                token: "deadbeef".to_owned(),
                admin_user: "alice".to_owned(),
                user: "carol".to_owned(),
            },
            addr(),
            0,
            "chat",
        );
        assert!(effects.contains(&Effect::UnicastTo(addr(), "OK banned".to_owned())));
        assert!(effects.iter().any(
            |e| matches!(e, Effect::BroadcastAll(s) if s == "GROUPE[chat]: [Action] (alice) a banni (carol)")
        ));
        assert!(state.banned.contains("carol"));
    }

    #[test]
    fn ban_rejects_wrong_token_once_bound() {
        let mut state = GroupState::new("chat", 0);
        state.set_token("real-token".to_owned());
        let effects = dispatch(
            &mut state,
            GroupMessage::CmdBan { token: "wrong".to_owned(), user: "carol".to_owned() },
            addr(),
            0,
            "chat",
        );
        assert_eq!(effects, vec![Effect::UnicastTo(addr(), "ERR not_admin".to_owned())]);
        assert!(!state.banned.contains("carol"));
    }

    #[test]
    fn unban_of_banned_user_reports_ok() {
        let mut state = GroupState::new("chat", 0);
        state.ban("carol", None);
        let effects = dispatch(
            &mut state,
            GroupMessage::CmdUnban { token: "t".to_owned(), user: "carol".to_owned() },
            addr(),
            0,
            "chat",
        );
        assert_eq!(effects, vec![Effect::UnicastTo(addr(), "OK unbanned".to_owned())]);
    }

    #[test]
    fn unban_of_not_banned_user_reports_not_banned() {
        let mut state = GroupState::new("chat", 0);
        let effects = dispatch(
            &mut state,
            GroupMessage::CmdUnban { token: "t".to_owned(), user: "nobody".to_owned() },
            addr(),
            0,
            "chat",
        );
        assert_eq!(effects, vec![Effect::UnicastTo(addr(), "OK not_banned".to_owned())]);
    }

    #[test]
    fn cmd_list_reports_members() {
        let mut state = GroupState::new("chat", 0);
        state.members.insert("alice".to_owned(), addr());
        let effects = dispatch(&mut state, GroupMessage::CmdList, addr(), 0, "chat");
        assert_eq!(effects, vec![Effect::UnicastTo(addr(), "OK alice".to_owned())]);
    }

    #[test]
    fn cmd_list_empty_reports_aucun() {
        let mut state = GroupState::new("chat", 0);
        let effects = dispatch(&mut state, GroupMessage::CmdList, addr(), 0, "chat");
        assert_eq!(effects, vec![Effect::UnicastTo(addr(), "OK (aucun)".to_owned())]);
    }

    #[test]
    fn ctrl_banner_set_updates_state_and_broadcasts() {
        let mut state = GroupState::new("chat", 0);
        let effects = dispatch(
            &mut state,
            GroupMessage::CtrlBannerSet { text: "hi".to_owned() },
            addr(),
            0,
            "chat",
        );
        assert!(state.admin_banner.active);
        assert_eq!(effects, vec![Effect::BroadcastAll("CTRL BANNER_SET hi".to_owned())]);
    }

    #[test]
    fn ctrl_redirect_broadcasts_and_terminates() {
        let mut state = GroupState::new("chat", 0);
        let effects = dispatch(
            &mut state,
            GroupMessage::CtrlRedirect { group: "A".to_owned(), port: 8010, reason: "merge".to_owned() },
            addr(),
            0,
            "chat",
        );
        assert_eq!(
            effects,
            vec![
                Effect::BroadcastAll("CTRL REDIRECT A 8010 merge".to_owned()),
                Effect::Terminate,
            ]
        );
    }

    #[test]
    fn sys_uses_server_broadcast_format() {
        let mut state = GroupState::new("chat", 0);
        let effects =
            dispatch(&mut state, GroupMessage::Sys { text: "hi all".to_owned() }, addr(), 0, "chat");
        assert_eq!(
            effects,
            vec![Effect::BroadcastAll("GROUPE[chat]: Message de [SERVER] : hi all".to_owned())]
        );
    }

    #[test]
    fn cmd_ban_resets_idle_clock() {
        let mut state = GroupState::new("chat", 0);
        dispatch(
            &mut state,
            GroupMessage::CmdBan2 {
                token: "deadbeef".to_owned(),
                admin_user: "alice".to_owned(),
                user: "carol".to_owned(),
            },
            addr(),
            77,
            "chat",
        );
        assert_eq!(state.last_activity_secs, 77);
    }

    #[test]
    fn cmd_list_resets_idle_clock_and_clears_warned_banner() {
        let mut state = GroupState::new("chat", 0);
        state.idle_banner.set("idle warning".to_owned());
        let effects = dispatch(&mut state, GroupMessage::CmdList, addr(), 10, "chat");
        assert_eq!(state.last_activity_secs, 10);
        assert!(!state.idle_banner.active);
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::BroadcastAll(s) if s == "CTRL IBANNER_CLR")));
    }

    #[test]
    fn cmd_delete_resets_idle_clock() {
        let mut state = GroupState::new("chat", 0);
        dispatch(&mut state, GroupMessage::CmdDelete { user: "carol".to_owned() }, addr(), 42, "chat");
        assert_eq!(state.last_activity_secs, 42);
    }

    #[test]
    fn unban_of_not_banned_user_still_resets_idle_clock() {
        let mut state = GroupState::new("chat", 0);
        dispatch(
            &mut state,
            GroupMessage::CmdUnban { token: "t".to_owned(), user: "nobody".to_owned() },
            addr(),
            15,
            "chat",
        );
        assert_eq!(state.last_activity_secs, 15);
    }

    #[test]
    fn settoken_preempts_trust_on_first_use() {
        let mut state = GroupState::new("chat", 0);
        dispatch(
            &mut state,
            GroupMessage::CtrlSetToken { token: "pushed".to_owned() },
            addr(),
            0,
            "chat",
        );
        let effects = dispatch(
            &mut state,
            GroupMessage::CmdBan { token: "guessed".to_owned(), user: "carol".to_owned() },
            addr(),
            0,
            "chat",
        );
        assert_eq!(effects, vec![Effect::UnicastTo(addr(), "ERR not_admin".to_owned())]);
    }
}
