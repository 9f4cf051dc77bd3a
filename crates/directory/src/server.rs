//! The directory's UDP control-plane loop: LIST/CREATE/JOIN/MERGE.

use std::sync::Arc;

use chatfab_wire::directory::{parse_request, DirErrorReason, DirReply, DirRequest};
use chatfab_wire::group::GroupMessage;
use chatfab_wire::token::generate_token;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Settings;
use crate::registry::GroupRegistry;
use crate::spawn::Supervisor;

const MAX_DATAGRAM: usize = 1500;

/// Run the directory's UDP request/reply loop until cancelled.
pub async fn run(
    socket: Arc<UdpSocket>,
    settings: Settings,
    registry: Arc<GroupRegistry>,
    supervisor: Arc<Supervisor>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let mut buf = [0u8; MAX_DATAGRAM];

    loop {
        let (len, peer) = tokio::select! {
            result = socket.recv_from(&mut buf) => result?,
            () = shutdown.cancelled() => {
                info!("directory UDP loop shutting down");
                return Ok(());
            }
        };

        let Ok(text) = std::str::from_utf8(&buf[..len]) else {
            continue;
        };

        let reply = handle_request(text, &settings, &registry, &supervisor, shutdown.clone()).await;
        if let Some(reply) = reply {
            if let Err(error) = socket.send_to(reply.to_string().as_bytes(), peer).await {
                warn!(%peer, %error, "failed to send directory reply");
            }
        }
    }
}

async fn handle_request(
    text: &str,
    settings: &Settings,
    registry: &Arc<GroupRegistry>,
    supervisor: &Arc<Supervisor>,
    shutdown: CancellationToken,
) -> Option<DirReply> {
    let request = match parse_request(text) {
        Ok(request) => request,
        Err(reason) => return Some(DirReply::Err(reason)),
    };

    match request {
        DirRequest::List => Some(DirReply::List(registry.list().await)),
        DirRequest::CreateAnon { name } => {
            Some(create_group(&name, None, settings, registry, supervisor, shutdown).await)
        }
        DirRequest::CreateWithUser { name, user } => {
            Some(create_group(&name, Some(user), settings, registry, supervisor, shutdown).await)
        }
        DirRequest::Join { name, user, .. } => {
            info!(group = %name, %user, "join request");
            match registry.find(&name).await {
                Some(record) => Some(DirReply::Joined { name: record.name, port: record.port }),
                None => Some(DirReply::Err(DirErrorReason::NotFound)),
            }
        }
        DirRequest::Merge { user, token_a, group_a, token_b, group_b } => {
            Some(handle_merge(&user, &token_a, &group_a, &token_b, &group_b, registry).await)
        }
    }
}

async fn create_group(
    name: &str,
    user: Option<String>,
    settings: &Settings,
    registry: &Arc<GroupRegistry>,
    supervisor: &Arc<Supervisor>,
    shutdown: CancellationToken,
) -> DirReply {
    let (is_new, mut record) = match registry.get_or_create(name).await {
        Ok(pair) => pair,
        Err(error) => return DirReply::Err(error.as_reason()),
    };

    if is_new {
        let spawn_result = supervisor.spawn(
            name.to_owned(),
            record.port,
            settings.idle_timeout_sec,
            registry.clone(),
            shutdown,
        );
        if let Err(error) = spawn_result {
            warn!(group = %name, %error, "failed to spawn group daemon");
            registry.remove(name).await;
            return DirReply::Err(DirErrorReason::Spawn);
        }
        info!(group = %name, port = record.port, "spawned group daemon");

        if user.is_some() {
            let token = generate_token();
            registry.set_token(name, token.clone()).await;
            record.token = Some(token);
        }
    }

    DirReply::Created { name: record.name, port: record.port, token: record.token }
}

async fn handle_merge(
    user: &str,
    token_a: &str,
    group_a: &str,
    token_b: &str,
    group_b: &str,
    registry: &Arc<GroupRegistry>,
) -> DirReply {
    let Some(rec_a) = registry.find(group_a).await else {
        return DirReply::Err(DirErrorReason::NotFound);
    };
    let Some(rec_b) = registry.find(group_b).await else {
        return DirReply::Err(DirErrorReason::NotFound);
    };

    for rec in [&rec_a, &rec_b] {
        if rec.token.is_none() {
            return DirReply::Err(DirErrorReason::NoToken);
        }
    }
    if rec_a.token.as_deref() != Some(token_a) || rec_b.token.as_deref() != Some(token_b) {
        return DirReply::Err(DirErrorReason::BadToken);
    }

    info!(%user, a = %group_a, b = %group_b, "merging groups");

    // Best-effort: tell B's members to redirect to A, then announce.
    if let Ok(socket) = UdpSocket::bind("0.0.0.0:0").await {
        let redirect = GroupMessage::CtrlRedirect {
            group: rec_a.name.clone(),
            port: rec_a.port,
            reason: "merge".to_owned(),
        };
        let _ = socket.send_to(redirect.to_string().as_bytes(), rec_b.admin_addr()).await;

        let announce = GroupMessage::Sys {
            text: format!("[Fusion] {user} a fusionne {group_b} -> {group_a}"),
        };
        for (name, _) in registry.list().await {
            if let Some(record) = registry.find(&name).await {
                let _ = socket.send_to(announce.to_string().as_bytes(), record.admin_addr()).await;
            }
        }
    }

    DirReply::Merged { group_a: group_a.to_owned(), group_b: group_b.to_owned() }
}

#[cfg(test)]
// OK to panic in test-only code -- assertion failures should fail loudly.
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn settings() -> Settings {
        Settings { idle_timeout_sec: 0, ..Settings::default() }
    }

    #[tokio::test]
    async fn create_anon_then_lookup_via_join() {
        let registry = Arc::new(GroupRegistry::new(4, 8010));
        let supervisor = Arc::new(Supervisor::new(PathBuf::from("true")));
        let shutdown = CancellationToken::new();

        let reply = handle_request(
            "CREATE chat",
            &settings(),
            &registry,
            &supervisor,
            shutdown.clone(),
        )
        .await
        .unwrap();
        assert_eq!(reply, DirReply::Created { name: "chat".to_owned(), port: 8010, token: None });

        let reply =
            handle_request("JOIN chat alice 127.0.0.1 0", &settings(), &registry, &supervisor, shutdown)
                .await
                .unwrap();
        assert_eq!(reply, DirReply::Joined { name: "chat".to_owned(), port: 8010 });
    }

    #[tokio::test]
    async fn create_with_user_issues_token() {
        let registry = Arc::new(GroupRegistry::new(4, 8010));
        let supervisor = Arc::new(Supervisor::new(PathBuf::from("true")));

        let reply = handle_request(
            "CREATE chat alice",
            &settings(),
            &registry,
            &supervisor,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        match reply {
            DirReply::Created { token: Some(token), .. } => {
                assert_eq!(token.len(), chatfab_wire::limits::TOKEN_HEX_LEN)
            }
            other => panic!("expected token, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_twice_replays_same_port_and_token() {
        let registry = Arc::new(GroupRegistry::new(4, 8010));
        let supervisor = Arc::new(Supervisor::new(PathBuf::from("true")));

        let first = handle_request(
            "CREATE chat alice",
            &settings(),
            &registry,
            &supervisor,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        let second = handle_request(
            "CREATE chat alice",
            &settings(),
            &registry,
            &supervisor,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn join_unknown_group_errors() {
        let registry = Arc::new(GroupRegistry::new(4, 8010));
        let supervisor = Arc::new(Supervisor::new(PathBuf::from("true")));
        let reply = handle_request(
            "JOIN nope alice 127.0.0.1 0",
            &settings(),
            &registry,
            &supervisor,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(reply, DirReply::Err(DirErrorReason::NotFound));
    }

    #[tokio::test]
    async fn merge_requires_valid_tokens() {
        let registry = Arc::new(GroupRegistry::new(4, 8010));
        let supervisor = Arc::new(Supervisor::new(PathBuf::from("true")));
        handle_request("CREATE a alice", &settings(), &registry, &supervisor, CancellationToken::new())
            .await;
        handle_request("CREATE b alice", &settings(), &registry, &supervisor, CancellationToken::new())
            .await;

        let reply = handle_request(
            "MERGE alice wrong a wrong b",
            &settings(),
            &registry,
            &supervisor,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(reply, DirReply::Err(DirErrorReason::BadToken));
    }

    #[tokio::test]
    async fn merge_with_valid_tokens_succeeds() {
        let registry = Arc::new(GroupRegistry::new(4, 8010));
        let supervisor = Arc::new(Supervisor::new(PathBuf::from("true")));
        let created_a = handle_request(
            "CREATE a alice",
            &settings(),
            &registry,
            &supervisor,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        let created_b = handle_request(
            "CREATE b alice",
            &settings(),
            &registry,
            &supervisor,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        let (token_a, token_b) = match (created_a, created_b) {
            (
                DirReply::Created { token: Some(ta), .. },
                DirReply::Created { token: Some(tb), .. },
            ) => (ta, tb),
            other => panic!("expected tokens, got {other:?}"),
        };

        let reply = handle_request(
            &format!("MERGE alice {token_a} a {token_b} b"),
            &settings(),
            &registry,
            &supervisor,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(reply, DirReply::Merged { group_a: "a".to_owned(), group_b: "b".to_owned() });
    }

    #[tokio::test]
    async fn merge_without_token_on_anon_group_errors() {
        let registry = Arc::new(GroupRegistry::new(4, 8010));
        let supervisor = Arc::new(Supervisor::new(PathBuf::from("true")));
        handle_request("CREATE a", &settings(), &registry, &supervisor, CancellationToken::new())
            .await;
        handle_request("CREATE b alice", &settings(), &registry, &supervisor, CancellationToken::new())
            .await;

        let reply = handle_request(
            "MERGE alice t a t b",
            &settings(),
            &registry,
            &supervisor,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(reply, DirReply::Err(DirErrorReason::NoToken));
    }

    #[tokio::test]
    async fn unknown_command_errors() {
        let registry = Arc::new(GroupRegistry::new(4, 8010));
        let supervisor = Arc::new(Supervisor::new(PathBuf::from("true")));
        let reply = handle_request(
            "NOPE",
            &settings(),
            &registry,
            &supervisor,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(reply, DirReply::Err(DirErrorReason::UnknownCmd));
    }
}
