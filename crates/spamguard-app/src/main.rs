#![warn(missing_docs)]
//! # spamguard binary
//!
//! Command-line entry point for spamguard. Owns the session store lifecycle
//! and runs every command on a current-thread runtime.

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use spamguard_analysis::{DEFAULT_PAGE, DEFAULT_PER_PAGE, HistoryQuery};
use spamguard_app::{
    AppConfig, AppController, GuardDecision, app_version, connect, init_logging,
};
use spamguard_auth::RegistrationForm;
use spamguard_dispatch::ReqwestTransport;
use spamguard_session::FileSessionStore;
use tracing::{debug, warn};

#[derive(Debug, Parser)]
#[command(name = "spamguard", version = app_version(), about = "Spam analysis client")]
struct Cli {
    /// Service base URL; overrides API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Probe service liveness.
    Health,
    /// Create an account.
    Register {
        /// Display name.
        #[arg(long)]
        name: String,
        /// Account email.
        #[arg(long)]
        email: String,
        /// Password.
        #[arg(long, env = "SPAMGUARD_PASSWORD", hide_env_values = true)]
        password: String,
        /// Password confirmation; defaults to the password.
        #[arg(long)]
        confirm_password: Option<String>,
    },
    /// Sign in and persist the session.
    Login {
        /// Account email.
        #[arg(long)]
        email: String,
        /// Password.
        #[arg(long, env = "SPAMGUARD_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the local session. The service is not contacted.
    Logout,
    /// Show the signed-in user.
    Whoami {
        /// Ask the service instead of reading the cached profile.
        #[arg(long)]
        remote: bool,
    },
    /// Classify a piece of text.
    Analyze {
        /// Text to classify.
        text: String,
    },
    /// List past analyses.
    History {
        /// 1-based page number.
        #[arg(long, default_value_t = DEFAULT_PAGE)]
        page: u32,
        /// Page size.
        #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
        per_page: u32,
    },
    /// Show one stored analysis.
    Show {
        /// Analysis id.
        id: String,
    },
    /// Delete one stored analysis.
    Delete {
        /// Analysis id.
        id: String,
    },
    /// Delete the whole history.
    Clear,
    /// Show aggregate statistics.
    Stats,
}

/// CLI entry point.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url)?;
    }
    let _log_guard = init_logging(&config)?;

    let store = Arc::new(
        FileSessionStore::init(&config.session_dir, &config.api_url)
            .context("failed to open session store")?,
    );
    let controller = connect(&config, Arc::new(ReqwestTransport::new()), store.clone())?;

    let logged_out = matches!(cli.command, Command::Logout);
    let outcome = run(cli.command, &controller).await;
    controller.wait_for_refreshes().await;
    drop(controller);

    if logged_out {
        match Arc::try_unwrap(store) {
            Ok(store) => store.destroy().context("failed to remove session store")?,
            Err(_) => debug!(stage = "session", action = "destroy_skipped", "store still shared; keys already cleared"),
        }
    }
    outcome
}

async fn run(command: Command, controller: &AppController) -> anyhow::Result<()> {
    match command {
        Command::Health => {
            if !controller.analysis().health().await {
                bail!("service unreachable");
            }
            println!("ok");
        }
        Command::Register {
            name,
            email,
            password,
            confirm_password,
        } => {
            let form = RegistrationForm {
                name,
                email,
                confirm_password: confirm_password.unwrap_or_else(|| password.clone()),
                password,
            };
            let response = controller
                .register(&form)
                .await
                .map_err(|error| anyhow::anyhow!(error.user_message()))?;
            println!("{}", response.message.as_deref().unwrap_or("Registered"));
            if !controller.auth().is_authenticated() {
                println!("Sign in to continue.");
            }
        }
        Command::Login { email, password } => {
            let response = controller
                .login(&email, &password)
                .await
                .map_err(|error| anyhow::anyhow!(error.user_message()))?;
            println!("{}", response.message.as_deref().unwrap_or("Signed in"));
        }
        Command::Logout => {
            controller.logout()?;
            println!("Signed out");
        }
        Command::Whoami { remote } => {
            require_session(controller)?;
            let user = if remote {
                Some(controller.auth().profile().await?)
            } else {
                controller.auth().current_user()
            };
            match user {
                Some(user) => println!("{} <{}>", user.name, user.email),
                None => println!("signed in (profile unknown)"),
            }
        }
        Command::Analyze { text } => {
            require_session(controller)?;
            controller
                .submit(&text)
                .await
                .map_err(|error| anyhow::anyhow!(error.user_message()))?;
            println!("{}", controller.view().verdict_summary());
        }
        Command::History { page, per_page } => {
            require_session(controller)?;
            let page = controller
                .load_history(HistoryQuery { page, per_page })
                .await
                .map_err(|error| anyhow::anyhow!(error.user_message()))?;
            print_json(&serde_json::to_value(&page)?)?;
        }
        Command::Show { id } => {
            require_session(controller)?;
            let entry = controller.analysis().analysis(&id).await?;
            print_json(&serde_json::to_value(&entry)?)?;
        }
        Command::Delete { id } => {
            require_session(controller)?;
            let message = controller
                .delete_analysis(&id)
                .await
                .map_err(|error| anyhow::anyhow!(error.user_message()))?;
            println!("{}", message.as_deref().unwrap_or("Deleted"));
        }
        Command::Clear => {
            require_session(controller)?;
            let message = controller
                .clear_history()
                .await
                .map_err(|error| anyhow::anyhow!(error.user_message()))?;
            println!("{}", message.as_deref().unwrap_or("History cleared"));
        }
        Command::Stats => {
            require_session(controller)?;
            let stats = controller
                .load_stats()
                .await
                .map_err(|error| anyhow::anyhow!(error.user_message()))?;
            print_json(&serde_json::to_value(&stats)?)?;
        }
    }
    Ok(())
}

fn require_session(controller: &AppController) -> anyhow::Result<()> {
    match controller.enter_protected_view() {
        GuardDecision::Proceed(_) => Ok(()),
        GuardDecision::Redirect(to) => {
            warn!(stage = "guard", action = "redirect", ?to, "command needs a session");
            bail!("not signed in; run `spamguard login` first")
        }
    }
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
