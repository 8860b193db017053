use clap::{Parser, Subcommand};
use passline::{
    clock::SystemClock,
    config::AppConfig,
    db,
    services::{self, user_service::normalize_email},
    AppState,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "passline-cli")]
#[command(about = "CLI tool for managing Passline users and sign-in links", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Magic link commands
    MagicLink {
        #[command(subcommand)]
        command: MagicLinkCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a new user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Mark email as verified
        #[arg(long)]
        verified: bool,
    },

    /// List all users
    List {
        /// Maximum number of users to display
        #[arg(short, long, default_value_t = 100)]
        limit: i64,

        /// Offset for pagination
        #[arg(short = 'o', long, default_value_t = 0)]
        offset: i64,
    },

    /// Delete a user
    Delete {
        /// Email address of the user to delete
        #[arg(short, long)]
        email: String,
    },

    /// Verify a user's email
    Verify {
        /// Email address of the user to verify
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum MagicLinkCommands {
    /// Issue a sign-in link and print it
    Issue {
        /// Email address to sign in
        #[arg(short, long)]
        email: String,

        /// Also email the link to the address
        #[arg(long)]
        send: bool,
    },

    /// Delete links whose expiry has passed
    PurgeExpired,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "passline=warn".into()),
        )
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    let config = AppConfig::from_env()?;

    // Connect to database
    let pool = db::create_pool(&config.database_url).await?;

    // Run migrations
    db::run_migrations(&pool).await?;

    let state = AppState::new(
        pool,
        config.magic_link.clone(),
        services::create_email_service(),
        Arc::new(SystemClock),
    );
    let user_service = state.user_service.clone();

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Create { email, verified } => {
                match user_service.create_user(&email, verified).await {
                    Ok(user) => {
                        println!("✅ User created successfully!");
                        println!("  ID: {}", user.id);
                        println!("  Email: {}", user.email);
                        println!("  Verified: {}", user.email_verified);
                    }
                    Err(err) => {
                        eprintln!("❌ Failed to create user: {}", err);
                        std::process::exit(1);
                    }
                }
            }

            UserCommands::List { limit, offset } => {
                let users = user_service.list_users(Some(limit), Some(offset)).await?;
                if users.is_empty() {
                    println!("No users found.");
                } else {
                    println!(
                        "{:<5} {:<40} {:<10} {:<20}",
                        "ID", "Email", "Verified", "Created"
                    );
                    println!("{}", "-".repeat(75));
                    for user in users {
                        println!(
                            "{:<5} {:<40} {:<10} {:<20}",
                            user.id,
                            user.email,
                            if user.email_verified { "Yes" } else { "No" },
                            user.created_at.as_deref().unwrap_or("N/A")
                        );
                    }
                }
            }

            UserCommands::Delete { email } => match user_service.find_user_by_email(&email).await? {
                Some(user) => {
                    user_service.delete_user(user.id).await?;
                    println!("✅ User '{}' deleted successfully!", email);
                }
                None => {
                    eprintln!("❌ User '{}' not found", email);
                    std::process::exit(1);
                }
            },

            UserCommands::Verify { email } => match user_service.find_user_by_email(&email).await? {
                Some(user) if user.email_verified => {
                    println!("ℹ️  User '{}' is already verified", email);
                }
                Some(user) => {
                    user_service.verify_user_email(user.id).await?;
                    println!("✅ User '{}' email verified successfully!", email);
                }
                None => {
                    eprintln!("❌ User '{}' not found", email);
                    std::process::exit(1);
                }
            },
        },

        Commands::MagicLink { command } => {
            let magic_link_service = state.magic_link_service.clone();
            match command {
                MagicLinkCommands::Issue { email, send } => {
                    let email = normalize_email(&email)?;
                    let (magic_link, token) = magic_link_service.request(&email).await?;

                    println!("✅ Magic link issued for '{}'", magic_link.user_email);
                    println!("  ID: {}", magic_link.id);
                    println!("  Expires: {}", magic_link.expires_at.to_rfc3339());
                    println!("  URL: {}", magic_link_service.authenticate_url(&token));

                    if send {
                        magic_link_service.send(&magic_link, &token).await?;
                        println!("📧 Sent to {}", magic_link.user_email);
                    }
                }
                MagicLinkCommands::PurgeExpired => {
                    let removed = magic_link_service.purge_expired().await?;
                    println!("🧹 Removed {} expired magic link(s)", removed);
                }
            }
        }
    }

    Ok(())
}
