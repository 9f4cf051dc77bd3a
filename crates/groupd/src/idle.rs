//! The Active -> Warned -> Expired idle state machine (§4.2), grounded on
//! `GroupeISY.c`'s `idle_timer_thread`.

use chatfab_wire::group::GroupMessage;

use crate::state::{Effect, GroupState};

/// Format an absolute epoch-seconds deadline as a wall-clock `HH:MM:SS`.
fn fmt_hhmmss(epoch_secs: u64) -> String {
    let secs_of_day = epoch_secs % 86_400;
    format!("{:02}:{:02}:{:02}", secs_of_day / 3600, (secs_of_day % 3600) / 60, secs_of_day % 60)
}

fn warn_threshold(idle_timeout_sec: u64) -> u64 {
    if idle_timeout_sec <= 1 {
        idle_timeout_sec
    } else {
        idle_timeout_sec / 2
    }
}

/// Evaluate the idle state machine against the current time. `idle_timeout_sec
/// == 0` disables the machine entirely. Returns the effects the engine
/// should perform (possibly empty).
pub fn check(state: &mut GroupState, idle_timeout_sec: u64, now: u64, group_name: &str) -> Vec<Effect> {
    if idle_timeout_sec == 0 {
        return Vec::new();
    }

    let elapsed = now.saturating_sub(state.last_activity_secs);

    if elapsed >= idle_timeout_sec {
        return vec![
            Effect::BroadcastAll(
                GroupMessage::Sys {
                    text: "Le groupe est supprime pour cause d'inactivite. Tappez \"quit\" pour quitter."
                        .to_owned(),
                }
                .to_string(),
            ),
            Effect::Terminate,
        ];
    }

    if elapsed >= warn_threshold(idle_timeout_sec) && !state.idle_banner.active {
        let deadline = now + (idle_timeout_sec - elapsed);
        let text = format!(
            "Inactivite detectee: le groupe '{group_name}' sera supprime a {} sans activite.",
            fmt_hhmmss(deadline)
        );
        state.idle_banner.set(text.clone());
        return vec![Effect::BroadcastAll(GroupMessage::CtrlIBannerSet { text }.to_string())];
    }

    Vec::new()
}
