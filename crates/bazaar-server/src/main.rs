mod api;
mod middleware;
mod session;

use tracing_subscriber::EnvFilter;

use crate::api::{build_app, default_rate_limit_state, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = bazaar_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(env = %config.env, bind_addr = %config.bind_addr, "starting bazaar-server");

    let pool_config = bazaar_db::PoolConfig::from_app_config(&config);
    let pool = bazaar_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = bazaar_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    if let Some((email, password)) = config.admin_seed() {
        seed_admin(&pool, &config.admin_username, email, password).await?;
    }

    let state = AppState::from_config(pool, &config)?;
    let app = build_app(state, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Ensure the configured administrator account exists with the configured password.
async fn seed_admin(
    pool: &sqlx::PgPool,
    username: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    let email = bazaar_core::normalize_email(email);
    let password = password.to_owned();
    let hash = tokio::task::spawn_blocking(move || bazaar_core::password::hash_password(&password))
        .await?
        .map_err(|e| anyhow::anyhow!("failed to hash admin password: {e}"))?;

    let admin = bazaar_db::seed_admin_account(pool, username, &email, &hash).await?;
    tracing::info!(user_id = %admin.public_id, email = %admin.email, "admin account seeded");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
