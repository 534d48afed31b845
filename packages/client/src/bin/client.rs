//! Yapper chat client.
//!
//! Connects to the realtime server as the given user (or the user the API
//! reports for `--token`), then reads commands and messages from stdin.
//! Reconnects automatically after a drop (10 attempts, 1 second apart by
//! default).
//!
//! Run with:
//! ```not_rust
//! cargo run --bin yapper-client -- --user-id alice
//! cargo run --bin yapper-client -- --token <session token> --api-url http://127.0.0.1:8080/api
//! ```

use std::time::Duration;

use clap::Parser;

use yapper_client::{
    config::{
        ClientConfig, DEFAULT_API_URL, DEFAULT_SERVER_URL, MAX_RECONNECT_ATTEMPTS,
        RECONNECT_INTERVAL_MILLIS, SEARCH_GRACE_SECS, SEARCH_TIMEOUT_SECS,
    },
    domain::{EchoPolicy, UserId},
    infrastructure::auth::{AuthGateway, HttpAuthGateway, StaticAuthGateway},
    ui::run_client,
};
use yapper_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "yapper-client")]
#[command(about = "Real-time chat client with matchmaking", long_about = None)]
struct Args {
    /// Connect as this user id without asking the API
    #[arg(short = 'u', long, conflicts_with = "token")]
    user_id: Option<String>,

    /// Session token used to resolve the user via `GET {api-url}/me`
    #[arg(short = 't', long, env = "YAPPER_TOKEN")]
    token: Option<String>,

    /// Realtime server URL
    #[arg(short = 's', long, default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// HTTP API base URL
    #[arg(short = 'a', long, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Consecutive failed connection attempts before giving up
    #[arg(long, default_value_t = MAX_RECONNECT_ATTEMPTS)]
    reconnect_attempts: u32,

    /// Delay between connection attempts in milliseconds
    #[arg(long, default_value_t = RECONNECT_INTERVAL_MILLIS)]
    reconnect_interval_ms: u64,

    /// Server-side matchmaking timeout in seconds
    #[arg(long, default_value_t = SEARCH_TIMEOUT_SECS)]
    search_timeout_secs: u64,

    /// Show messages this user sent from other devices
    #[arg(long)]
    show_own_echoes: bool,

    /// Do not rejoin rooms after a reconnect
    #[arg(long)]
    no_rejoin: bool,
}

impl Args {
    fn config(&self) -> ClientConfig {
        let echo_policy = if self.show_own_echoes {
            EchoPolicy::MatchPending
        } else {
            EchoPolicy::SuppressSelf
        };
        ClientConfig::new(&self.server_url, &self.api_url)
            .with_reconnect(
                self.reconnect_attempts,
                Duration::from_millis(self.reconnect_interval_ms),
            )
            .with_search_timeout(
                Duration::from_secs(self.search_timeout_secs),
                Some(Duration::from_secs(SEARCH_GRACE_SECS)),
            )
            .with_echo_policy(echo_policy)
            .with_rejoin_on_reconnect(!self.no_rejoin)
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let config = args.config();

    let auth: Box<dyn AuthGateway> = match args.user_id {
        Some(user_id) => match UserId::new(user_id) {
            Ok(user_id) => Box::new(StaticAuthGateway::new(user_id)),
            Err(e) => {
                tracing::error!("{}", e);
                std::process::exit(2);
            }
        },
        None => Box::new(HttpAuthGateway::new(config.api_url.clone(), args.token)),
    };

    // Run the client
    if let Err(e) = run_client(config, auth.as_ref()).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
