//! Operator console: a concurrent stdin reader that broadcasts admin
//! commands to every live group. Grounded on `ServeurISY.c`'s
//! `admin_input_thread` (`/banner`, `/banner_clr`, `/sys`, `/list`, `/help`,
//! `/quit`), adapted to an async stdin reader and `tokio::select!`
//! cancellation in the teacher's idiom.

use std::sync::Arc;

use chatfab_wire::group::GroupMessage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::registry::GroupRegistry;

const HELP_TEXT: &str = "\
commands:
  /banner <text>   set a sticky banner on every group
  /banner_clr      clear the sticky banner on every group
  /sys <text>      broadcast a one-off announcement to every group
  /list            list live groups
  /help            show this text
  /quit            shut down the directory";

/// Broadcast `msg` to every live group's administrative endpoint.
async fn broadcast_to_all(socket: &UdpSocket, registry: &GroupRegistry, msg: &GroupMessage) {
    for (name, _) in registry.list().await {
        if let Some(record) = registry.find(&name).await {
            if let Err(error) = socket.send_to(msg.to_string().as_bytes(), record.admin_addr()).await
            {
                warn!(group = %name, %error, "failed to deliver admin broadcast");
            }
        }
    }
}

/// Run the operator console until EOF, `/quit`, or cancellation.
pub async fn run(
    socket: Arc<UdpSocket>,
    registry: Arc<GroupRegistry>,
    shutdown: CancellationToken,
) {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    println!("directory console ready — type /help for commands");

    loop {
        let line = tokio::select! {
            result = lines.next_line() => result,
            () = shutdown.cancelled() => break,
        };

        let Ok(Some(line)) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(text) = line.strip_prefix("/banner ") {
            broadcast_to_all(
                &socket,
                &registry,
                &GroupMessage::CtrlBannerSet { text: text.to_owned() },
            )
            .await;
        } else if line == "/banner_clr" {
            broadcast_to_all(&socket, &registry, &GroupMessage::CtrlBannerClr).await;
        } else if let Some(text) = line.strip_prefix("/sys ") {
            broadcast_to_all(&socket, &registry, &GroupMessage::Sys { text: text.to_owned() })
                .await;
        } else if line == "/list" {
            let groups = registry.list().await;
            if groups.is_empty() {
                println!("(aucun)");
            } else {
                for (name, port) in groups {
                    println!("{name} {port}");
                }
            }
        } else if line == "/help" {
            println!("{HELP_TEXT}");
        } else if line == "/quit" {
            info!("operator requested shutdown");
            shutdown.cancel();
            break;
        } else {
            println!("unknown command, try /help");
        }
    }
}
