use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use vitalvoice_core::alerts::{AlertSender, TwilioAlertSender, TwilioCredentials};
use vitalvoice_core::clock::SystemClock;
use vitalvoice_core::completion::TogetherCompletionClient;
use vitalvoice_core::config::COMPLETION_API_KEY_ENV;
use vitalvoice_core::store::{ContactStore, HistoryStore, MemoryStore, PgStore, ReminderStore};
use vitalvoice_core::VitalConfig;

use vitalvoice_server::http::{start_http_server, HttpState};
use vitalvoice_server::router::ConversationRouter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "vitalvoice.toml")]
    config: String,

    /// Check the database connection and exit.
    #[arg(long)]
    health: bool,

    /// Keep reminders, history and contacts in memory instead of Postgres.
    #[arg(long)]
    memory_store: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience, production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match VitalConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let pool = if args.memory_store && !args.health {
        None
    } else {
        match vitalvoice_core::db::create_pool(&config.database).await {
            Ok(p) => Some(p),
            Err(e) => {
                eprintln!("Failed to connect to database: {}", e);
                std::process::exit(1);
            }
        }
    };

    if args.health {
        if let Some(pool) = &pool {
            match vitalvoice_core::db::health_check(pool).await {
                Ok(v) => println!("✅ PostgreSQL connected: {}", v),
                Err(e) => {
                    println!("❌ PostgreSQL connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        println!("✅ VitalVoice DB health check passed");
        return Ok(());
    }

    // Secrets come from the environment only
    let api_key = std::env::var(COMPLETION_API_KEY_ENV).unwrap_or_default();
    let completion = match TogetherCompletionClient::new(&config.completion, api_key) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("{} ({} must be set)", e, COMPLETION_API_KEY_ENV);
            std::process::exit(1);
        }
    };

    let alerts: Option<Arc<dyn AlertSender>> = if config.alerts.enabled {
        let sender = TwilioCredentials::from_env()
            .and_then(|creds| TwilioAlertSender::new(&config.alerts, creds));
        match sender {
            Ok(s) => Some(Arc::new(s)),
            Err(e) => {
                eprintln!("Failed to configure emergency alerts: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        tracing::warn!("Emergency alerts disabled; /send-emergency will answer 503");
        None
    };

    let (reminders, history, contacts): (
        Arc<dyn ReminderStore>,
        Arc<dyn HistoryStore>,
        Arc<dyn ContactStore>,
    ) = match &pool {
        Some(pool) => {
            if let Err(e) = vitalvoice_core::db::init_schema(pool).await {
                eprintln!("Failed to initialise database schema: {}", e);
                std::process::exit(1);
            }
            let store = Arc::new(PgStore::new(pool.clone()));
            (store.clone(), store.clone(), store)
        }
        None => {
            tracing::warn!("Using the in-memory store; data is lost on exit");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store.clone(), store)
        }
    };

    let router = ConversationRouter::new(
        &config,
        reminders.clone(),
        history.clone(),
        completion,
        Arc::new(SystemClock),
    );

    let state = Arc::new(HttpState {
        config,
        router,
        reminders,
        history,
        contacts,
        alerts,
        pool,
    });

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
