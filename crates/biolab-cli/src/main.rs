//! Bio Lab CLI - operator commands
//!
//! Usage:
//!   biolab migrate
//!   biolab create-admin --username <name> --email <email> --first-name <f> --last-name <l>
//!   biolab hash-password <password>
//!   biolab purge-sessions
//!
//! Configuration is read the same way the API server reads it.

use anyhow::{bail, Context};
use biolab_api::auth::{PasswordHasher, RegisterRequest};
use biolab_api::state::AppState;
use biolab_api::{init_tracing, load_config};
use biolab_core::config::{AppConfig, StorageBackend};
use biolab_core::Role;
use biolab_store::{PgStore, Stores};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "biolab")]
#[command(about = "Mobile bio lab backend CLI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create an admin account
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// Falls back to BIOLAB_ADMIN_PASSWORD
        #[arg(long, env = "BIOLAB_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Print the stored form of a password
    HashPassword {
        password: String,
    },
    /// Delete expired sessions
    PurgeSessions,
}

async fn open_state(config: AppConfig) -> anyhow::Result<AppState> {
    if config.database.backend == StorageBackend::Memory {
        tracing::warn!("Memory backend selected; changes are discarded on exit");
    }
    let stores = Stores::connect(&config.database)
        .await
        .context("Failed to open the store")?;
    AppState::new(config, stores).context("Invalid password settings")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Migrate => {
            if config.database.backend != StorageBackend::Postgres {
                bail!("Migrations only apply to the postgres backend");
            }
            let store = PgStore::connect(&config.database)
                .await
                .context("Failed to connect to PostgreSQL")?;
            store.migrate().await.context("Migration failed")?;
            println!("Migrations applied");
        }
        Commands::CreateAdmin {
            username,
            email,
            first_name,
            last_name,
            password,
        } => {
            let state = open_state(config).await?;
            let request = RegisterRequest {
                username,
                password,
                first_name,
                last_name,
                email,
                mobile: None,
                role: Role::Admin,
                city: None,
            };

            let user = state
                .auth
                .service()
                .provision(request, None)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to create admin: {e}"))?;
            println!("Created admin {} (id {})", user.username, user.id);
        }
        Commands::HashPassword { password } => {
            let hasher = PasswordHasher::new(&config.password)?;
            println!("{}", hasher.hash(&password).await?);
        }
        Commands::PurgeSessions => {
            let state = open_state(config).await?;
            let purged = state
                .auth
                .sessions
                .purge_expired()
                .await
                .context("Failed to purge sessions")?;
            println!("Purged {purged} expired sessions");
        }
    }

    Ok(())
}
