use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use appengine::auth::{TokenGenerator, issue_token};
use appengine::config::ServerConfig;
use appengine::server::{AppState, create_router};
use appengine::store::{SqliteStore, Store};
use appengine::types::{PrivilegeTier, UserMeta};

const ADMIN_TOKEN_FILE: &str = ".admin_token";

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[cfg(not(unix))]
fn set_restrictive_permissions(_path: &Path) {}

#[derive(Parser)]
#[command(name = "appengine")]
#[command(about = "An app-engine server for projects, builds and their resources", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to, overriding appengine.toml
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to, overriding appengine.toml
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database and appengine.toml
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database and super admin token)
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Name of the super admin account
        #[arg(long, default_value = "admin")]
        username: String,
    },

    /// Manage user accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Issue another token for an existing account
    Token {
        username: String,

        /// One of: super, admin, regular
        #[arg(long, default_value = "regular")]
        privilege: String,

        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user with default details and print their token
    Add {
        username: String,

        /// One of: super, admin, regular
        #[arg(long, default_value = "regular")]
        privilege: String,

        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

fn open_store(config: &ServerConfig) -> anyhow::Result<SqliteStore> {
    let store = SqliteStore::new(config.db_path())
        .with_context(|| format!("Failed to open {}", config.db_path().display()))?;
    store.initialize()?;
    Ok(store)
}

fn parse_privilege(raw: &str) -> anyhow::Result<PrivilegeTier> {
    match PrivilegeTier::parse(raw) {
        Some(tier) => Ok(tier),
        None => bail!("Unknown privilege '{raw}'. Use super, admin or regular."),
    }
}

fn validate_username(username: &str) -> anyhow::Result<()> {
    if username.trim().is_empty() {
        bail!("Username cannot be empty");
    }
    if username.contains(char::is_whitespace) {
        bail!("Username cannot contain whitespace");
    }
    Ok(())
}

fn print_token(heading: &str, raw_token: &str) {
    println!();
    println!("========================================");
    println!("{heading}");
    println!();
    println!("  {raw_token}");
    println!();
    println!("========================================");
    println!();
}

fn run_init(data_dir: &Path, username: &str) -> anyhow::Result<()> {
    validate_username(username)?;
    fs::create_dir_all(data_dir)?;

    let config = ServerConfig::load(data_dir)?;
    let store = open_store(&config)?;

    let token_file = data_dir.join(ADMIN_TOKEN_FILE);

    if store.has_admin_token()? {
        bail!(
            "Server already initialized. Admin token exists at: {}",
            token_file.display()
        );
    }

    let generator = TokenGenerator::new();
    let (token, raw_token) = issue_token(&generator, username, PrivilegeTier::SuperAdmin)?;
    store.create_token(&token)?;
    store.create_user_meta(&UserMeta::new(username, config.quota.default_max_projects))?;

    fs::write(&token_file, &raw_token)?;
    set_restrictive_permissions(&token_file);

    print_token(
        &format!("Super admin '{username}' created with token:"),
        &raw_token,
    );
    println!("Token saved to: {}", token_file.display());

    Ok(())
}

fn run_add_user(data_dir: &Path, username: &str, privilege: &str) -> anyhow::Result<()> {
    validate_username(username)?;
    let tier = parse_privilege(privilege)?;

    let config = ServerConfig::load(data_dir)?;
    let store = open_store(&config)?;

    let meta = UserMeta::new(username, config.quota.default_max_projects);
    if !store.create_user_meta(&meta)? {
        bail!("User '{username}' already exists");
    }

    let (token, raw_token) = issue_token(&TokenGenerator::new(), username, tier)?;
    store.create_token(&token)?;

    print_token(&format!("Created user '{username}' with token:"), &raw_token);
    Ok(())
}

fn run_issue_token(data_dir: &Path, username: &str, privilege: &str) -> anyhow::Result<()> {
    let tier = parse_privilege(privilege)?;

    let config = ServerConfig::load(data_dir)?;
    let store = open_store(&config)?;

    if store.get_user_meta(username)?.is_none() {
        bail!("User '{username}' does not exist");
    }

    let (token, raw_token) = issue_token(&TokenGenerator::new(), username, tier)?;
    store.create_token(&token)?;

    print_token(&format!("New token for '{username}':"), &raw_token);
    Ok(())
}

async fn run_serve(
    data_dir: PathBuf,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let mut config = ServerConfig::load(&data_dir)?;
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let token_file = config.data_dir.join(ADMIN_TOKEN_FILE);
    let store = open_store(&config)?;
    if !store.has_admin_token()? {
        bail!(
            "Server not initialized. Run 'appengine admin init' first to create the database and admin token."
        );
    }

    info!("Admin token available at {}", token_file.display());

    let addr = config.socket_addr()?;
    let state = Arc::new(AppState::new(Arc::new(store), config));
    let app = create_router(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("appengine=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init { data_dir, username } => run_init(&data_dir, &username)?,
            AdminCommands::User {
                command:
                    UserCommands::Add {
                        username,
                        privilege,
                        data_dir,
                    },
            } => run_add_user(&data_dir, &username, &privilege)?,
            AdminCommands::Token {
                username,
                privilege,
                data_dir,
            } => run_issue_token(&data_dir, &username, &privilege)?,
        },
        Commands::Serve {
            host,
            port,
            data_dir,
        } => run_serve(data_dir, host, port).await?,
    }

    Ok(())
}
