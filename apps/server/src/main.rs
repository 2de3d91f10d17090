use anyhow::Context;
use clap::{Parser, Subcommand};
use feza_auth::{LockoutPolicy, NewAccount, UserAdmin, ADMIN_ROLE};
use feza_config::{load as load_config, AppConfig};
use feza_gateway::{build_router, AppState};
use feza_runtime::{maintenance, telemetry, BackendServices};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "feza-backend")]
#[command(about = "Feza Logistics financial back office")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Create a user holding the admin role
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Clear the failed-login lock on an account
    UnlockUser {
        /// Username or email address
        identifier: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;
    let config = load_config().context("failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config).await,
        Commands::CreateAdmin {
            username,
            email,
            password,
        } => create_admin(config, username, email, password).await,
        Commands::UnlockUser { identifier } => unlock_user(config, identifier).await,
    }
}

async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    info!("starting Feza back office");

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let sweeper = services
        .maintenance(&config)
        .spawn(maintenance::DEFAULT_INTERVAL);

    let state = AppState::new(services.db_pool.clone(), &config, services.mailer.clone())
        .context("failed to build application state")?;
    let app = build_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(feza_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    sweeper.abort();
    services.db_pool.close().await;
    info!("backend shut down");
    Ok(())
}

fn user_admin(services: &BackendServices, config: &AppConfig) -> UserAdmin {
    UserAdmin::new(
        services.db_pool.clone(),
        LockoutPolicy::from_config(&config.auth.lockout),
    )
}

async fn create_admin(
    config: AppConfig,
    username: String,
    email: String,
    password: Option<String>,
) -> anyhow::Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_password().await?,
    };

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let details = user_admin(&services, &config)
        .create(NewAccount {
            username,
            email,
            password,
            first_name: None,
            last_name: None,
            phone: None,
            roles: vec![ADMIN_ROLE.to_string()],
        })
        .await
        .context("failed to create admin account")?;

    println!(
        "created admin {} ({})",
        details.user.username, details.user.public_id
    );
    Ok(())
}

async fn unlock_user(config: AppConfig, identifier: String) -> anyhow::Result<()> {
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let admin = user_admin(&services, &config);
    let user = admin
        .find_by_login(&identifier)
        .await
        .with_context(|| format!("no user matches {identifier}"))?;
    admin
        .unlock(&user.public_id)
        .await
        .context("failed to unlock account")?;

    println!("unlocked {}", user.username);
    Ok(())
}

async fn read_password() -> anyhow::Result<String> {
    println!("password:");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read password from stdin")?;

    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("a password is required");
    }
    Ok(password)
}
