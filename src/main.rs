//! Firechat - terminal chat client
//!
//! Email/password accounts, direct and group chats, unread counters and live
//! updates over a hosted auth service and document database.

mod auth;
mod chat;
mod cli;
mod config;
mod error;
mod logging;
mod models;
mod profile;
mod session;
mod store;
mod tui;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::cli::users::ProfileEdit;
use crate::session::Session;

#[derive(Parser)]
#[command(name = "firechat")]
#[command(about = "Terminal chat client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the backend project settings
    Init {
        /// Web API key of the project
        #[arg(long)]
        api_key: String,

        /// Project id of the document database
        #[arg(long)]
        project_id: String,
    },

    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: Option<String>,

        /// Password (prompted for when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account
    Signup {
        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(short, long)]
        email: Option<String>,
    },

    /// Sign out and clear the stored session
    Logout,

    /// Show current authentication status
    Status,

    /// Send a password reset email
    ResetPassword {
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Delete the signed-in account and its profile
    DeleteAccount {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// List your chats, most recent first
    Chats {
        /// Maximum number of chats to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Only chats whose name or last message contains this text
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Read messages from a chat and mark it read
    Read {
        /// Chat id (from `chats` output)
        chat_id: String,

        /// Maximum number of messages to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Send a message
    Send {
        /// Chat id (from `chats` output)
        #[arg(short, long)]
        to: String,

        /// Message text
        message: String,
    },

    /// Open (or create) a direct chat with a user
    Dm {
        /// The other user's email
        email: String,
    },

    /// Create a group chat
    Group {
        /// Group name
        #[arg(short, long)]
        name: String,

        /// Members' emails (you are added automatically)
        #[arg(required = true)]
        emails: Vec<String>,
    },

    /// List other users
    Users {
        /// Only users whose name or email contains this text
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Show or edit your profile
    Profile {
        /// New display name
        #[arg(short, long)]
        name: Option<String>,

        /// Image file to use as avatar
        #[arg(short, long, conflicts_with = "remove_image")]
        image: Option<PathBuf>,

        /// Remove the avatar
        #[arg(long)]
        remove_image: bool,
    },

    /// Follow a chat and print new messages until Ctrl+C
    Watch {
        /// Chat id (from `chats` output)
        chat_id: String,
    },

    /// Launch the terminal user interface
    Tui,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // The TUI owns the terminal, so it logs to a file.
    if matches!(args.command, Commands::Tui) {
        let log_path = logging::init_tui(args.verbose)?;
        tracing::info!(path = %log_path.display(), "Starting TUI");
    } else {
        logging::init_cli(args.verbose);
    }

    match args.command {
        Commands::Init {
            api_key,
            project_id,
        } => {
            cli::account::init(&api_key, &project_id)?;
        }
        Commands::Login { email, password } => {
            cli::account::login(email, password).await?;
        }
        Commands::Signup {
            first_name,
            last_name,
            email,
        } => {
            cli::account::signup(first_name, last_name, email).await?;
        }
        Commands::Logout => {
            cli::account::logout().await?;
        }
        Commands::Status => {
            cli::account::status().await?;
        }
        Commands::ResetPassword { email } => {
            cli::account::reset_password(email).await?;
        }
        Commands::DeleteAccount { yes } => {
            cli::account::delete_account(yes).await?;
        }
        Commands::Chats { limit, query } => {
            cli::chats::list_chats(limit, query).await?;
        }
        Commands::Read { chat_id, limit } => {
            cli::chats::read_messages(&chat_id, limit).await?;
        }
        Commands::Send { to, message } => {
            tracing::debug!(chat_id = %to, "Sending message");
            cli::chats::send_message(&to, &message).await?;
        }
        Commands::Dm { email } => {
            cli::chats::direct_chat(&email).await?;
        }
        Commands::Group { name, emails } => {
            cli::chats::group_chat(&name, &emails).await?;
        }
        Commands::Users { query } => {
            cli::users::list_users(query).await?;
        }
        Commands::Profile {
            name,
            image,
            remove_image,
        } => {
            cli::users::profile(ProfileEdit {
                name,
                image,
                remove_image,
            })
            .await?;
        }
        Commands::Watch { chat_id } => {
            cli::chats::watch(&chat_id).await?;
        }
        Commands::Tui => {
            let session = Session::from_disk()?;
            tui::run(session).await?;
        }
    }

    Ok(())
}
