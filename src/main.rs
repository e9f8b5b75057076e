use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use whatsapp_manager::{
    api::routes::{self, AppState},
    auth::{AuthService, SignInRequest},
    config::Config,
    models::internal::AuthEvent,
    storage::RestGateway,
    sync::{SyncSettings, SyncViewModel, ViewSnapshot},
};

#[derive(Parser)]
#[command(name = "whatsapp-manager", version, about = "WhatsApp conversation and client dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the health check and the built dashboard (default)
    Serve,
    /// Sign in and follow conversations and clients from the terminal
    Monitor {
        #[arg(long, env = "WAMANAGER_EMAIL")]
        email: String,
        #[arg(long, env = "WAMANAGER_PASSWORD", hide_env_values = true)]
        password: String,
        /// Initial client search term
        #[arg(long)]
        search: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Load config
    let config = Config::load()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Monitor {
            email,
            password,
            search,
        } => monitor(config, email, password, search).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let app = routes::create_router(AppState {
        config: config.clone(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Server listening on {}", addr);
    if config.is_production() {
        tracing::info!("Serving dashboard from {}", config.static_dir);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Server shutting down...");
        })
        .await?;

    Ok(())
}

async fn monitor(
    config: Config,
    email: String,
    password: String,
    search: Option<String>,
) -> anyhow::Result<()> {
    let gateway = Arc::new(RestGateway::new(
        config.gateway_url.clone(),
        config.gateway_anon_key.clone(),
    ));
    let auth = AuthService::new(gateway.clone());
    let mut auth_events = auth.subscribe();

    auth.sign_in(SignInRequest { email, password }).await?;

    let settings = SyncSettings::from(&config);
    let mut report_ticker = tokio::time::interval(settings.refresh_interval);
    let model = SyncViewModel::new(gateway, settings);
    model.start().await;

    if let Some(term) = search {
        if let Err(e) = model.set_search_term(&term).await {
            tracing::warn!("Search for {:?} failed: {}", term, e);
        }
    }

    loop {
        tokio::select! {
            _ = report_ticker.tick() => report(&model.snapshot().await),
            event = auth_events.recv() => {
                if let Ok(AuthEvent::SignedOut) = event {
                    tracing::warn!("Session ended");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    model.stop().await;
    auth.sign_out().await?;
    Ok(())
}

fn report(snapshot: &ViewSnapshot) {
    let stats = &snapshot.stats;
    tracing::info!(
        "{} conversations ({} answered, {} awaiting reply), {} clients",
        stats.total_conversations,
        stats.with_response,
        stats.awaiting_response,
        stats.total_clients
    );

    for conversation in snapshot.conversations.iter().filter(|c| !c.has_response) {
        tracing::info!(
            "  awaiting reply: {} (last message {})",
            conversation.display_name(),
            conversation.last_message_time.format("%Y-%m-%d %H:%M")
        );
    }

    if let Some(error) = &snapshot.last_error {
        tracing::warn!("Last error: {}", error);
    }
}
