//! Bootstrap tool: `nkey-seed apps | admin --username U --password P | invite --count N`.

use clap::{Parser, Subcommand};
use nkey_service::{
    config::ServiceConfig,
    db::{self, seed},
    services::OsRandomSource,
    utils::Password,
};
use service_core::error::AppError;
use service_core::observability::init_tracing;

#[derive(Debug, Parser)]
#[command(name = "nkey-seed", about = "Seed the nkey-service credential store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register the default app catalogue (existing apps are left alone)
    Apps,
    /// Create an Admin identity
    Admin {
        #[arg(long, default_value = "admin")]
        username: String,
        #[arg(long, env = "SEED_ADMIN_PASSWORD")]
        password: String,
    },
    /// Generate single-use invite codes and print them
    Invite {
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = ServiceConfig::from_env()?;
    init_tracing("nkey-seed", &config.log_level, None)?;

    if config.database.url.is_none() {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "DATABASE_URL must be set to seed a persistent store"
        )));
    }

    let store = db::connect_store(&config).await?;
    let random = OsRandomSource;

    match cli.command {
        Command::Apps => {
            let created = seed::seed_default_apps(store.as_ref(), &random).await?;
            println!("Created {} app(s): {}", created.len(), created.join(", "));
        }
        Command::Admin { username, password } => {
            match seed::seed_admin(store.as_ref(), &username, &Password::new(password)).await? {
                Some(admin) => println!("Created admin '{}' ({})", admin.username, admin.user_id),
                None => println!("User '{}' already exists", username),
            }
        }
        Command::Invite { count } => {
            let codes = seed::seed_invite_codes(store.as_ref(), &random, count).await?;
            for invite in codes {
                println!("{}", invite.code);
            }
        }
    }

    Ok(())
}
