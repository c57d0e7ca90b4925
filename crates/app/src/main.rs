use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{Duration, Utc};
use engine::Engine;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, DatabaseConnection};
use server::ServerState;
use settings::Database;
use telegram_bot::TelegramNotifier;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ayoqsh={level},telegram_bot={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let timezone = settings.timezone()?;
    let server_settings = settings.server;
    let db = parse_database(&server_settings.database).await?;
    let engine = Engine::builder()
        .database(db)
        .timezone(timezone)
        .check_validity(Duration::days(server_settings.check_validity_days))
        .session_ttl(Duration::hours(server_settings.session_ttl_hours))
        .build()
        .await?;
    tracing::info!(%timezone, "engine ready");

    let mut state = ServerState::new(engine);
    if let Some(telegram) = settings.telegram {
        tracing::info!("Found telegram settings...");
        state = state.with_notifier(Arc::new(TelegramNotifier::new(&telegram.token)));
    } else {
        tracing::info!("No telegram settings, broadcasts are only recorded");
    }

    let engine = state.engine.clone();
    let every = StdDuration::from_secs(server_settings.expire_interval_minutes.max(1) * 60);
    tasks.spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match engine.expire_overdue(Utc::now()).await {
                Ok(0) => {}
                Ok(expired) => tracing::info!(expired, "overdue checks expired"),
                Err(err) => tracing::error!("failed to expire overdue checks: {err}"),
            }
        }
    });

    let bind = server_settings
        .bind
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", bind, server_settings.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tasks.spawn(async move {
        if let Err(err) = server::run_with_listener(state, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let options = match config {
        // Every pooled connection would open its own empty in-memory database.
        Database::Memory => {
            let mut options = ConnectOptions::new("sqlite::memory:");
            options.max_connections(1).min_connections(1);
            options
        }
        Database::Sqlite(path) => ConnectOptions::new(format!("sqlite:{}?mode=rwc", path)),
    };

    let database = sea_orm::Database::connect(options).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
