//! Interactive chat client: stdin lines are sent as chat turns, streamed replies go to stdout.

use std::io::Write;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use chat_ws::chat::{ChatEvent, ChatStream};
use chat_ws::config::{ENV_HOST, ENV_SECURE};
use chat_ws::{ChatSession, SendOutcome, SessionConfig};

#[derive(Parser)]
#[command(name = "chat-ws")]
#[command(about = "Stream chat replies over a persistent websocket session")]
struct Cli {
    /// Backend host, with optional port
    #[arg(long, env = ENV_HOST)]
    host: Option<String>,

    /// Connect over wss://
    #[arg(long, env = ENV_SECURE)]
    secure: bool,

    /// Skip TLS certificate validation (development servers only)
    #[arg(long, env = "CHAT_WS_INSECURE")]
    insecure: bool,

    /// Fixed client id instead of a generated one
    #[arg(long, env = "CHAT_WS_CLIENT_ID")]
    client_id: Option<String>,

    /// Model requested for every turn
    #[arg(long, env = "CHAT_WS_MODEL")]
    model: Option<String>,

    /// Conversation to continue
    #[arg(long, env = "CHAT_WS_CONVERSATION_ID")]
    conversation_id: Option<i64>,

    /// Keepalive ping interval; 0 disables keepalive. Defaults to CHAT_WS_PING_INTERVAL_MS or 30s
    #[arg(long, env = "CHAT_WS_PING_INTERVAL_SECS")]
    ping_interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_ws=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = SessionConfig::default().apply_env();
    if let Some(host) = cli.host {
        config = config.with_host(host);
    }
    if cli.secure {
        config = config.with_secure(true);
    }
    if cli.insecure {
        config.tls.validate_certs = false;
    }
    if let Some(client_id) = cli.client_id {
        config = config.with_client_id(client_id);
    }
    let keepalive = match cli.ping_interval_secs {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => Some(config.keepalive_interval),
    };

    let session = ChatSession::new(config);
    info!(client_id = %session.client_id(), address = %session.address(), "starting chat session");

    session
        .on_connection(|connected: bool| {
            eprintln!("[{}]", if connected { "connected" } else { "disconnected" });
        })
        .await?;
    let mut events = ChatStream::attach(&session).await?;

    if let Err(err) = session.connect().await {
        // The session keeps retrying on its own.
        error!(error = %err, "initial connect failed");
    }
    if let Some(interval) = keepalive {
        session.start_periodic_ping(interval).await?;
    }

    let mut conversation_id = cli.conversation_id;
    let model = cli.model;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                let outcome = session
                    .send_chat_message(text, conversation_id, model.as_deref())
                    .await;
                if outcome != SendOutcome::Sent {
                    eprintln!("message not sent ({outcome:?})");
                }
            }
            event = events.next() => match event {
                Some(ChatEvent::Chunk(content)) => {
                    write!(stdout, "{content}")?;
                    stdout.flush()?;
                }
                Some(ChatEvent::Completed { conversation_id: id, .. }) => {
                    writeln!(stdout)?;
                    conversation_id = id.or(conversation_id);
                }
                Some(ChatEvent::Failed(message)) => eprintln!("error: {message}"),
                Some(ChatEvent::Processing(message)) => {
                    eprintln!("processing{}", message.map(|m| format!(": {m}")).unwrap_or_default());
                }
                Some(_) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    ChatStream::detach(&session).await?;
    session.shutdown().await?;
    Ok(())
}
