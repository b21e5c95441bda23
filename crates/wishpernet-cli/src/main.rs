//! WishperNet terminal client.
//!
//! # Usage
//!
//! ```bash
//! # Create a room on a local server
//! wishpernet --username alice
//!
//! # Join through an invite link (or a bare token)
//! wishpernet --username bob --invite 'http://localhost:8080/index.html?token=...'
//! ```

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;
use wishpernet_cli::{Command, command::HELP, render};
use wishpernet_client::{
    ClientAction, SessionStore, entry,
    transport::{self, DEFAULT_HTTP_BASE, DEFAULT_SOCKET_URL, HttpDirectory, TransportConfig},
};

/// WishperNet end-to-end encrypted room chat
#[derive(Parser, Debug)]
#[command(name = "wishpernet")]
#[command(about = "Terminal client for end-to-end encrypted WishperNet rooms")]
#[command(version)]
struct Args {
    /// Display name in the room
    #[arg(short, long)]
    username: String,

    /// Invite link or token to join; creates a new room when omitted
    #[arg(short, long)]
    invite: Option<String>,

    /// Token issuer base URL (also the origin of printed invite links)
    #[arg(long, default_value = DEFAULT_HTTP_BASE)]
    server: Url,

    /// Socket.IO WebSocket URL
    #[arg(long, default_value = DEFAULT_SOCKET_URL)]
    socket: Url,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // stdout carries the conversation
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let directory = HttpDirectory::new(args.server.clone());
    let mut store = SessionStore::new();
    let mut out = tokio::io::stdout();

    match &args.invite {
        Some(invite) => {
            let token = entry::token_from_invite(invite)?;
            entry::join_room(&directory, &mut store, &args.username, token.as_str()).await?;
            emit(&mut out, "-- joining room").await?;
        },
        None => {
            entry::create_room(&directory, &mut store, &args.username).await?;
            emit(&mut out, "-- room created, /share prints an invite link").await?;
        },
    }

    let config = TransportConfig::new(args.server.clone(), args.socket.clone());
    let mut handle = transport::connect(config, store);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            update = handle.next_update() => {
                let Some(action) = update else { break };
                if let Some(line) = render(&action) {
                    emit(&mut out, &line).await?;
                }
                if matches!(action, ClientAction::ReturnToEntry { .. }) {
                    break;
                }
            },
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    // EOF: leave, then drain until the session ends.
                    stdin_open = false;
                    if handle.leave().await.is_err() {
                        break;
                    }
                    continue;
                };

                match Command::parse(&line) {
                    Ok(Command::Message { text }) => {
                        if handle.send_message(text).await.is_err() {
                            break;
                        }
                    },
                    Ok(Command::Share) => {
                        let reply = match handle.request_share_token().await {
                            Ok(share) => format!("invite: {}", entry::invite_link(&args.server, &share)),
                            Err(e) => format!("! could not create invite: {e}"),
                        };
                        emit(&mut out, &reply).await?;
                    },
                    Ok(Command::Leave) => {
                        if handle.leave().await.is_err() {
                            break;
                        }
                    },
                    Ok(Command::Help) => emit(&mut out, HELP).await?,
                    Err(e) => emit(&mut out, &format!("! {e}")).await?,
                }
            },
        }
    }

    tracing::debug!("chat session ended");
    Ok(())
}

async fn emit(out: &mut Stdout, line: &str) -> std::io::Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}
