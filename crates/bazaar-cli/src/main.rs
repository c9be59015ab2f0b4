use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "bazaar-cli")]
#[command(about = "Bazaar storefront maintenance commands")]
struct Cli {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance.
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Account administration.
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database answers.
    Ping,
    /// Apply pending migrations.
    Migrate,
    /// Upsert the product catalog from a YAML file.
    Seed {
        #[arg(
            long,
            env = "BAZAAR_CATALOG_PATH",
            default_value = "./config/products.yaml"
        )]
        catalog: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum AdminCommands {
    /// Create an administrator, or promote and reset an existing account with that email.
    Create {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "admin")]
        username: String,
        #[arg(long, env = "BAZAAR_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("bazaar-cli: run with --help to list commands");
        return Ok(());
    };

    let database_url = cli
        .database_url
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set (pass --database-url or set the env var)"))?;
    let pool = bazaar_db::connect_pool(&database_url, bazaar_db::PoolConfig::default()).await?;

    match command {
        Commands::Db { command } => run_db(&pool, command).await,
        Commands::Admin { command } => run_admin(&pool, command).await,
    }
}

async fn run_db(pool: &sqlx::PgPool, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Ping => {
            bazaar_db::health_check(pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = bazaar_db::run_migrations(pool).await?;
            println!("migrations up to date ({applied} applied)");
        }
        DbCommands::Seed { catalog } => {
            let catalog = bazaar_core::load_catalog(&catalog)?;
            let seeded = bazaar_db::seed_catalog(pool, &catalog.products).await?;
            tracing::info!(seeded, "catalog seeded");
            println!("seeded {seeded} products");
        }
    }
    Ok(())
}

async fn run_admin(pool: &sqlx::PgPool, command: AdminCommands) -> anyhow::Result<()> {
    match command {
        AdminCommands::Create {
            email,
            username,
            password,
        } => {
            let email = bazaar_core::normalize_email(&email);
            let username = username.trim().to_string();
            if email.is_empty() || username.is_empty() || password.is_empty() {
                anyhow::bail!("email, username and password must be non-empty");
            }

            let hash = tokio::task::spawn_blocking(move || bazaar_core::password::hash_password(&password))
                .await?
                .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
            let admin = bazaar_db::seed_admin_account(pool, &username, &email, &hash).await?;

            tracing::info!(user_id = %admin.public_id, email = %admin.email, "admin account ready");
            println!("admin {} <{}> ready", admin.username, admin.email);
        }
    }
    Ok(())
}
