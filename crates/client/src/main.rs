use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chatfab_client::categorize::{categorize, Category};
use chatfab_client::config::{Cli, Command, Settings};
use chatfab_client::control::ControlClient;
use chatfab_client::logging::init_tracing;
use chatfab_client::session::Session;
use chatfab_client::tokenstore::TokenStore;
use chatfab_wire::directory::ReplyLine;
use clap::Parser;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let settings = Settings::load(&cli.config_path)?;
    info!(user = %settings.user, "client starting");

    let directory_addr: SocketAddr = (settings.server_ip, settings.server_port).into();
    let control_socket = UdpSocket::bind("0.0.0.0:0").await?;
    let control = ControlClient::new(control_socket, directory_addr);

    match cli.command {
        Command::List => run_list(&control).await,
        Command::Create { name } => run_create(&control, &settings, &name).await?,
        Command::Join { name, text } => run_join(&control, &settings, &name, &text).await?,
        Command::Merge { token_a, group_a, token_b, group_b } => {
            run_merge(&control, &settings, &token_a, &group_a, &token_b, &group_b).await?
        }
    }

    Ok(())
}

async fn run_list(control: &ControlClient) {
    let groups = control.list().await;
    if groups.is_empty() {
        println!("(aucun)");
        return;
    }
    for (name, port) in groups {
        println!("{name} {port}");
    }
}

async fn run_create(control: &ControlClient, settings: &Settings, name: &str) -> anyhow::Result<()> {
    let mut tokens = TokenStore::new();
    match control.create_with_user(name, &settings.user).await {
        Some(ReplyLine::Ok(fields)) if fields.len() >= 3 => {
            tokens.insert(name, fields[2].clone());
            println!("OK {name} {} {}", fields[1], fields[2]);
        }
        Some(ReplyLine::Ok(fields)) => println!("OK {name} {}", fields.get(1).cloned().unwrap_or_default()),
        Some(ReplyLine::Err(reason)) => anyhow::bail!("directory refused CREATE: {reason}"),
        _ => anyhow::bail!("directory did not respond to CREATE"),
    }
    Ok(())
}

async fn run_merge(
    control: &ControlClient,
    settings: &Settings,
    token_a: &str,
    group_a: &str,
    token_b: &str,
    group_b: &str,
) -> anyhow::Result<()> {
    match control.merge(&settings.user, token_a, group_a, token_b, group_b).await {
        Some(ReplyLine::Ok(fields)) => println!("OK MERGE {}", fields.join(" ")),
        Some(ReplyLine::Err(reason)) => anyhow::bail!("directory refused MERGE: {reason}"),
        _ => anyhow::bail!("directory did not respond to MERGE"),
    }
    Ok(())
}

/// Join a group, attach, send one message, and print whatever the group
/// broadcasts back for a short window before detaching. This is a
/// demonstration of the protocol-facing core, not the interactive UI
/// (explicitly out of scope), but it keeps the same shape the real thing
/// would need: a receive task that only categorizes datagrams, and a
/// driver loop that reacts to them, sharing session state through a
/// single `tokio::sync::Mutex`.
async fn run_join(
    control: &ControlClient,
    settings: &Settings,
    name: &str,
    text: &str,
) -> anyhow::Result<()> {
    let group_socket = UdpSocket::bind(("0.0.0.0", settings.local_recv_port)).await?;
    let local_addr = group_socket.local_addr()?;

    let port = match control.join(name, &settings.user, settings.server_ip, local_addr.port()).await {
        Some(ReplyLine::Ok(fields)) if fields.len() >= 2 => {
            fields[1].parse::<u16>().map_err(|_| anyhow::anyhow!("malformed JOIN reply port"))?
        }
        Some(ReplyLine::Err(reason)) => anyhow::bail!("directory refused JOIN: {reason}"),
        _ => anyhow::bail!("directory did not respond to JOIN"),
    };
    let group_addr: SocketAddr = (settings.server_ip, port).into();
    group_socket.connect(group_addr).await?;
    let socket = Arc::new(group_socket);

    let session = Arc::new(Mutex::new(Session::new(&settings.user)));
    {
        let mut guard = session.lock().await;
        let attach_msg = guard.attach(name, group_addr);
        socket.send(attach_msg.as_bytes()).await?;
    }
    socket.send(format!("MSG {} {text}", settings.user).as_bytes()).await?;

    let (tx, mut rx) = mpsc::channel(32);
    let recv_socket = socket.clone();
    let recv_task = tokio::spawn(async move {
        let mut buf = [0u8; 1500];
        loop {
            match recv_socket.recv(&mut buf).await {
                Ok(len) => {
                    let raw = String::from_utf8_lossy(&buf[..len]).into_owned();
                    if tx.send(categorize(&raw)).await.is_err() {
                        break;
                    }
                }
                Err(error) => {
                    warn!(%error, "group socket read failed");
                    break;
                }
            }
        }
    });

    let window = Duration::from_millis(500);
    loop {
        match tokio::time::timeout(window, rx.recv()).await {
            Ok(Some(Category::Chat(line))) => println!("{line}"),
            Ok(Some(Category::BannerSet(text))) => println!("[banner] {text}"),
            Ok(Some(Category::BannerClr)) => println!("[banner cleared]"),
            Ok(Some(Category::IdentityBannerSet(text))) => println!("[notice] {text}"),
            Ok(Some(Category::IdentityBannerClr)) => println!("[notice cleared]"),
            Ok(Some(Category::Deletion(text))) => {
                println!("[group deleted] {text}");
                break;
            }
            Ok(Some(Category::Redirect { group, port, reason })) => {
                info!(%group, port, %reason, "following redirect");
                let new_addr: SocketAddr = (settings.server_ip, port).into();
                let mut guard = session.lock().await;
                guard.note_redirect(group, new_addr, reason);
                if let Some((detach, _, _, attach)) = guard.apply_pending_redirect() {
                    socket.send(detach.as_bytes()).await?;
                    socket.connect(new_addr).await?;
                    socket.send(attach.as_bytes()).await?;
                }
            }
            Ok(None) | Err(_) => break,
        }
    }
    recv_task.abort();

    let mut guard = session.lock().await;
    if let Some(detach) = guard.detach() {
        socket.send(detach.as_bytes()).await?;
    }

    Ok(())
}
