//! docsgate CLI - Google credential and Drive document management.
//!
//! This tool drives the OAuth consent flow for an account, keeps its tokens
//! in a local SQLite store, and runs Drive/Docs operations with them.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use docsgate_auth::{
    Authorization, GoogleOAuthProvider, OAuthConfig, RedirectTarget, SqliteCredentialStore,
    TokenLifecycleManager,
};
use docsgate_common::AccountId;
use docsgate_drive::{complete_sign_in, DriveClient, DriveConfig};

#[derive(Parser)]
#[command(name = "docsgate")]
#[command(about = "docsgate - Google credential and Drive document management")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Credential database (default: <data dir>/docsgate/credentials.db).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the consent URL for an account.
    AuthUrl {
        /// Account e-mail.
        #[arg(short, long)]
        email: String,

        /// Use the mobile app redirect URI.
        #[arg(long)]
        mobile: bool,

        /// Open the URL in the default browser.
        #[arg(long)]
        open: bool,
    },

    /// Exchange an authorization code and store the tokens.
    Exchange {
        /// Account e-mail.
        #[arg(short, long)]
        email: String,

        /// Authorization code (URL-encoded codes are accepted).
        #[arg(short, long)]
        code: String,

        /// The code came back through the mobile app redirect URI.
        #[arg(long)]
        mobile: bool,
    },

    /// Exchange a sign-in code and record the account's role.
    SignIn {
        /// Account e-mail.
        #[arg(short, long)]
        email: String,

        /// Authorization code (URL-encoded codes are accepted).
        #[arg(short, long)]
        code: String,

        /// The code came back through the mobile app redirect URI.
        #[arg(long)]
        mobile: bool,
    },

    /// Show the credential status of an account, refreshing if expired.
    Token {
        /// Account e-mail.
        #[arg(short, long)]
        email: String,

        /// Print the access token itself.
        #[arg(long)]
        print: bool,
    },

    /// Google Drive operations.
    Drive {
        /// Acting account (default: GOOGLE_ADMIN_EMAIL).
        #[arg(short, long, global = true)]
        email: Option<String>,

        #[command(subcommand)]
        command: DriveCommands,
    },
}

#[derive(Subcommand)]
enum DriveCommands {
    /// List the document folder, its subfolders and their files.
    Contents {
        /// Folder ID (default: GOOGLE_DRIVE_FOLDER_ID).
        #[arg(short, long)]
        folder: Option<String>,
    },

    /// Create a folder.
    Mkdir {
        /// Folder name.
        #[arg(short, long)]
        name: String,

        /// Parent folder ID (default: GOOGLE_DRIVE_FOLDER_ID).
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Upload a local file.
    Upload {
        /// Local file to upload.
        #[arg(short, long)]
        source: PathBuf,

        /// Destination folder ID.
        #[arg(short, long)]
        folder: String,

        /// MIME type of the file.
        #[arg(short, long, default_value = "application/pdf")]
        mime_type: String,
    },

    /// Delete a file.
    Rm {
        /// File ID.
        #[arg(short, long)]
        file_id: String,
    },

    /// Export a Google Doc as PDF.
    Export {
        /// Document ID.
        #[arg(short, long)]
        file_id: String,

        /// Output directory.
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Print the plain text of a Google Doc.
    Text {
        /// Document ID.
        #[arg(short, long)]
        file_id: String,
    },

    /// List who has access to a file or folder.
    Permissions {
        /// File or folder ID (default: GOOGLE_DRIVE_FOLDER_ID).
        #[arg(short, long)]
        file_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load .env if present
    let _ = dotenvy::dotenv();

    let manager = build_manager(cli.db.as_deref())?;

    match cli.command {
        Commands::AuthUrl {
            email,
            mobile,
            open: launch,
        } => cmd_auth_url(&manager, &email, mobile, launch),

        Commands::Exchange {
            email,
            code,
            mobile,
        } => cmd_exchange(&manager, &email, &code, redirect_target(mobile)).await,

        Commands::SignIn {
            email,
            code,
            mobile,
        } => cmd_sign_in(&manager, &email, &code, redirect_target(mobile)).await,

        Commands::Token { email, print } => cmd_token(&manager, &email, print).await,

        Commands::Drive { email, command } => {
            let account = match email {
                Some(email) => email,
                None => manager
                    .config()
                    .admin_account_hint
                    .clone()
                    .context("--email is required when GOOGLE_ADMIN_EMAIL is not set")?,
            };
            let drive = DriveClient::new(Arc::clone(&manager), parse_account(&account)?)?;
            cmd_drive(&drive, command).await
        }
    }
}

fn default_db_path() -> Result<PathBuf> {
    let dir = dirs::data_dir()
        .context("Could not determine the user data directory; pass --db")?
        .join("docsgate");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    Ok(dir.join("credentials.db"))
}

fn build_manager(db: Option<&Path>) -> Result<Arc<TokenLifecycleManager>> {
    let config = OAuthConfig::from_env().context("Failed to load OAuth configuration")?;

    let db_path = match db {
        Some(path) => path.to_path_buf(),
        None => default_db_path()?,
    };
    let store = SqliteCredentialStore::open(&db_path).context("Failed to open credential store")?;
    let provider = GoogleOAuthProvider::new(&config).context("Failed to create OAuth provider")?;

    let manager = TokenLifecycleManager::new(config, Arc::new(store), Arc::new(provider))?;
    Ok(Arc::new(manager))
}

fn parse_account(email: &str) -> Result<AccountId> {
    AccountId::new(email).context("Invalid account e-mail")
}

/// Codes relayed by the mobile app arrive URL-encoded (`4%2F0A...`).
fn decode_code(code: &str) -> Result<String> {
    let decoded = percent_encoding::percent_decode_str(code)
        .decode_utf8()
        .context("Authorization code is not valid UTF-8")?;
    Ok(decoded.into_owned())
}

fn redirect_target(mobile: bool) -> RedirectTarget {
    if mobile {
        RedirectTarget::Mobile
    } else {
        RedirectTarget::Web
    }
}

fn drive_folder(explicit: Option<String>) -> Result<String> {
    match explicit {
        Some(id) => Ok(id),
        None => Ok(DriveConfig::from_env()
            .context("Pass a folder ID or set GOOGLE_DRIVE_FOLDER_ID")?
            .folder_id),
    }
}

/// Print the consent URL.
fn cmd_auth_url(
    manager: &TokenLifecycleManager,
    email: &str,
    mobile: bool,
    launch: bool,
) -> Result<()> {
    let account = parse_account(email)?;
    let url = manager.authorization_url(&account, redirect_target(mobile))?;
    println!("{}", url);

    if launch {
        open::that(&url).context("Failed to open browser")?;
    }

    Ok(())
}

/// Exchange an authorization code.
async fn cmd_exchange(
    manager: &TokenLifecycleManager,
    email: &str,
    code: &str,
    target: RedirectTarget,
) -> Result<()> {
    let account = parse_account(email)?;
    info!("Exchanging authorization code for {}", account);

    let credential = manager
        .exchange_authorization_code_via(&account, &decode_code(code)?, target)
        .await
        .context("Failed to exchange Google code")?;

    println!("Google tokens stored successfully!");
    println!("  Account: {}", credential.account_id);
    println!("  Expires: {}", credential.expires_at);
    println!(
        "  Refresh token: {}",
        if credential.refresh_token.is_some() { "present" } else { "missing" }
    );

    Ok(())
}

/// Exchange a sign-in code and derive the account's role.
async fn cmd_sign_in(
    manager: &Arc<TokenLifecycleManager>,
    email: &str,
    code: &str,
    target: RedirectTarget,
) -> Result<()> {
    let account = parse_account(email)?;
    let folder_id = drive_folder(None)?;
    let admin = manager
        .config()
        .admin_account_hint
        .clone()
        .context("GOOGLE_ADMIN_EMAIL is required for sign-in")?;
    let admin_drive = DriveClient::new(Arc::clone(manager), parse_account(&admin)?)?;

    let code = decode_code(code)?;
    let credential = complete_sign_in(manager, &admin_drive, &folder_id, &account, &code, target)
        .await
        .context("Sign-in failed")?;

    println!("Signed in {}", credential.account_id);
    println!("  Role: {}", credential.role);
    println!("  Admin: {}", credential.role.is_admin());

    Ok(())
}

/// Show credential status.
async fn cmd_token(manager: &TokenLifecycleManager, email: &str, print: bool) -> Result<()> {
    let account = parse_account(email)?;

    match manager.get_authorized_credential(&account).await? {
        Authorization::Authorized(credential) => {
            println!("Authorized: {}", credential.account_id);
            println!("  Role: {}", credential.role);
            println!("  Expires: {}", credential.expires_at);
            if print {
                println!("  Access token: {}", credential.access_token);
            }
        }
        Authorization::AuthorizationRequired { auth_url } => {
            println!("Authorization required for {}. Visit:", account);
            println!("{}", auth_url);
        }
    }

    Ok(())
}

async fn cmd_drive(drive: &DriveClient, command: DriveCommands) -> Result<()> {
    match command {
        DriveCommands::Contents { folder } => {
            let folder_id = drive_folder(folder)?;
            let contents = drive
                .folder_contents(&folder_id)
                .await
                .context("Failed to fetch Drive contents")?;
            println!("{}", serde_json::to_string_pretty(&contents)?);
        }

        DriveCommands::Mkdir { name, parent } => {
            let parent_id = drive_folder(parent)?;
            let folder = drive
                .create_folder(&name, &parent_id)
                .await
                .context("Failed to create folder")?;
            println!("Folder created: {} ({})", folder.name, folder.id);
        }

        DriveCommands::Upload {
            source,
            folder,
            mime_type,
        } => {
            let name = source
                .file_name()
                .and_then(|n| n.to_str())
                .context("Source path has no file name")?
                .to_string();
            let data = tokio::fs::read(&source)
                .await
                .with_context(|| format!("Failed to read {}", source.display()))?;

            let file = drive
                .upload_file(&name, &folder, &mime_type, data)
                .await
                .context("Failed to upload file")?;
            println!("File uploaded: {} ({})", file.name, file.id);
        }

        DriveCommands::Rm { file_id } => {
            drive.delete(&file_id).await.context("Failed to delete file")?;
            println!("File removed: {}", file_id);
        }

        DriveCommands::Export { file_id, out } => {
            let exported = drive
                .export_pdf(&file_id)
                .await
                .context("Failed to export document")?;
            let dest = out.join(&exported.file_name);
            tokio::fs::write(&dest, &exported.data)
                .await
                .with_context(|| format!("Failed to write {}", dest.display()))?;
            println!("Exported: {} ({} bytes)", dest.display(), exported.data.len());
        }

        DriveCommands::Text { file_id } => {
            let text = drive
                .document_text(&file_id)
                .await
                .context("Failed to convert document to text")?;
            print!("{}", text);
        }

        DriveCommands::Permissions { file_id } => {
            let file_id = drive_folder(file_id)?;
            let permissions = drive
                .list_permissions(&file_id)
                .await
                .context("Failed to list permissions")?;
            for permission in permissions {
                println!(
                    "  {:<8} {}",
                    permission.role,
                    permission.email_address.as_deref().unwrap_or("(no e-mail)")
                );
            }
        }
    }

    Ok(())
}
