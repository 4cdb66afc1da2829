use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config;
use crate::database::models::{User, UserInput};
use crate::database::transaction::Actor;
use crate::database::DatabaseManager;
use crate::routes;
use crate::services::EntityService;

#[derive(Parser)]
#[command(name = "luxe-api")]
#[command(about = "Master-data CRUD backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Port to listen on; overrides PORT")]
        port: Option<u16>,
        #[arg(long, help = "Apply migrations before serving")]
        migrate: bool,
    },

    #[command(about = "Apply database migrations and exit")]
    Migrate,

    #[command(about = "Create a login-capable user")]
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = config::config();
    let pool = DatabaseManager::connect(&config.database).await.context("connecting to database")?;

    match cli.command.unwrap_or(Commands::Serve { port: None, migrate: false }) {
        Commands::Migrate => {
            DatabaseManager::migrate(&pool).await?;
        }
        Commands::CreateUser { name, email, username, password } => {
            let users = EntityService::<User>::new(pool)?;
            let input = UserInput { name, email, username, password: Some(password) };
            let user = users.create(&Actor::new("system", "system"), input).await?;
            info!(id = %user.id, username = %user.username, "user created");
        }
        Commands::Serve { port, migrate } => {
            if migrate {
                DatabaseManager::migrate(&pool).await?;
            }
            if crate::is_production!() && config.security.jwt_secret.is_empty() {
                anyhow::bail!("JWT_SECRET must be set in production");
            }

            let app = routes::app(pool)?;
            let bind_addr = format!("0.0.0.0:{}", port.unwrap_or(config.api.port));
            let listener = tokio::net::TcpListener::bind(&bind_addr)
                .await
                .with_context(|| format!("failed to bind {}", bind_addr))?;

            info!("listening on http://{}", bind_addr);
            axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>()).await?;
        }
    }
    Ok(())
}
