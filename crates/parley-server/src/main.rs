//! Parley server binary.
//!
//! # Usage
//!
//! ```bash
//! # Register a user, then start the server against a local Redis
//! parley-server user add alice s3cret
//! parley-server serve --bind 0.0.0.0:5000
//!
//! # Throwaway in-memory store; accounts must be seeded at startup
//! parley-server --store memory serve --user alice:s3cret --user bob:hunter2
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use parley::{
    BoundedSpawner, DEFAULT_BIND_ADDR, ParleyServer, ParleyServerBuilder, WorkerSpawner,
};
use parley_presence::PresenceRegistry;
use parley_session::{SessionAuthenticator, SessionConfig, SessionError, TokenEntropy};
use parley_store::{KeyValueStore, MemoryStore, RedisStore};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parley chat server
#[derive(Parser, Debug)]
#[command(name = "parley-server")]
#[command(about = "Session and direct-messaging chat server")]
#[command(version)]
struct Cli {
    /// Key-value store backend. `memory` keeps nothing between runs, so
    /// `user add` has no lasting effect; seed accounts with `serve --user`
    #[arg(long, global = true, env = "PARLEY_STORE", value_enum, default_value_t = StoreKind::Redis)]
    store: StoreKind,

    /// Redis connection URL
    #[arg(long, global = true, env = "PARLEY_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Session lifetime in seconds
    #[arg(long, global = true, env = "PARLEY_SESSION_TTL", default_value_t = 1800)]
    session_ttl: u64,

    /// Random bytes per session token
    #[arg(long, global = true, env = "PARLEY_TOKEN_BYTES", default_value_t = 16)]
    token_bytes: usize,

    /// Read token randomness from the OS for every token
    #[arg(long, global = true, env = "PARLEY_OS_RNG")]
    os_rng: bool,

    /// Prefix for session keys in the store
    #[arg(long, global = true, env = "PARLEY_SESSION_KEY_PREFIX", default_value = "")]
    session_key_prefix: String,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, env = "PARLEY_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    Redis,
    Memory,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Accept client connections
    Serve(ServeArgs),
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to bind to
    #[arg(short, long, env = "PARLEY_BIND", default_value = DEFAULT_BIND_ADDR)]
    bind: String,

    /// Longest accepted frame in bytes
    #[arg(long, env = "PARLEY_MAX_FRAME_LEN", default_value_t = 8 * 1024)]
    max_frame_len: usize,

    /// Frames queued per connection before senders wait
    #[arg(long, env = "PARLEY_OUTBOUND_CAPACITY", default_value_t = 64)]
    outbound_capacity: usize,

    /// Milliseconds a direct message may wait on a full recipient queue
    #[arg(long, env = "PARLEY_DELIVERY_TIMEOUT_MS", default_value_t = 2000)]
    delivery_timeout_ms: u64,

    /// Seconds between sweeps for expired sessions
    #[arg(long, env = "PARLEY_SWEEP_INTERVAL", default_value_t = 30)]
    sweep_interval: u64,

    /// Cap on concurrent connections (unbounded if unset)
    #[arg(long, env = "PARLEY_MAX_CONNECTIONS")]
    max_connections: Option<usize>,

    /// Keep the active-user set left by a previous run
    #[arg(long, env = "PARLEY_KEEP_ACTIVE_USERS")]
    keep_active_users: bool,

    /// Register an account before accepting connections (repeatable)
    #[arg(long = "user", value_name = "NAME:PASSWORD", value_parser = parse_account)]
    users: Vec<(String, String)>,
}

fn parse_account(raw: &str) -> Result<(String, String), String> {
    match raw.split_once(':') {
        Some((name, password)) if !name.is_empty() => Ok((name.to_string(), password.to_string())),
        _ => Err(format!("expected NAME:PASSWORD, got {raw:?}")),
    }
}

#[derive(Subcommand, Debug)]
enum UserAction {
    /// Register a new user
    Add { username: String, password: String },
    /// Delete a user and end their session
    Remove { username: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let session = SessionConfig {
        ttl: Duration::from_secs(cli.session_ttl),
        token_bytes: cli.token_bytes,
        entropy: if cli.os_rng {
            TokenEntropy::OsRng
        } else {
            TokenEntropy::ThreadRng
        },
        key_prefix: cli.session_key_prefix.clone(),
    };

    match cli.store {
        StoreKind::Redis => {
            let store = RedisStore::connect(&cli.redis_url)
                .await
                .with_context(|| format!("connecting to {}", cli.redis_url))?;
            dispatch(cli.command, store, session).await
        }
        StoreKind::Memory => {
            tracing::warn!("using in-memory store, nothing will persist");
            dispatch(cli.command, MemoryStore::new(), session).await
        }
    }
}

async fn dispatch<S: KeyValueStore>(
    command: Command,
    store: S,
    session: SessionConfig,
) -> anyhow::Result<()> {
    match command {
        Command::Serve(args) => serve(args, store, session).await,
        Command::User { action } => manage_user(action, store, session).await,
    }
}

async fn serve<S: KeyValueStore>(
    args: ServeArgs,
    store: S,
    session: SessionConfig,
) -> anyhow::Result<()> {
    let builder = ParleyServerBuilder::new()
        .bind(&args.bind)
        .max_frame_len(args.max_frame_len)
        .outbound_capacity(args.outbound_capacity)
        .delivery_timeout(Duration::from_millis(args.delivery_timeout_ms))
        .sweep_interval(Duration::from_secs(args.sweep_interval))
        .clear_stale_on_start(!args.keep_active_users)
        .session_config(session);

    match args.max_connections {
        Some(max) => {
            let server = builder.build_with_spawner(store, BoundedSpawner::new(max)).await?;
            run(server, &args.users).await
        }
        None => run(builder.build(store).await?, &args.users).await,
    }
}

async fn run<S: KeyValueStore, W: WorkerSpawner>(
    server: ParleyServer<S, W>,
    accounts: &[(String, String)],
) -> anyhow::Result<()> {
    for (username, password) in accounts {
        match server.authenticator().register_user(username, password).await {
            Ok(()) => {}
            Err(SessionError::UserExists(_)) => {
                tracing::info!(%username, "seed account already exists");
            }
            Err(e) => return Err(e).with_context(|| format!("seeding account {username}")),
        }
    }

    tracing::info!(addr = %server.local_addr()?, "Parley server listening");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to install ctrl-c handler");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}

async fn manage_user<S: KeyValueStore>(
    action: UserAction,
    store: S,
    session: SessionConfig,
) -> anyhow::Result<()> {
    let auth = SessionAuthenticator::new(store, Arc::new(PresenceRegistry::new()), session);

    match action {
        UserAction::Add { username, password } => {
            auth.register_user(&username, &password).await?;
            println!("added user {username}");
        }
        UserAction::Remove { username } => {
            if !auth.remove_user(&username).await? {
                anyhow::bail!("no such user: {username}");
            }
            println!("removed user {username}");
        }
    }
    Ok(())
}
