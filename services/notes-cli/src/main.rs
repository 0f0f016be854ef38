//! BiliNote command-line client
//!
//! Front end over the session and billing stores:
//! 1. Loads config (file, env, flags) and opens the on-disk token store
//! 2. Builds one `AppContext` with a terminal navigator
//! 3. Runs a single subcommand and prints its result as JSON on stdout
//!
//! Logs and prompts go to stderr.

mod config;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notes_auth::{LoginRequest, ProfileUpdate, TokenStore};
use notes_client::{Navigator, Transport};
use notes_session::{
    AppContext, BillingCycle, BillingSnapshot, PlanType, RegistrationForm, validate_registration,
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "bilinote", version, about = "BiliNote account and subscription client")]
struct Cli {
    /// Config file (defaults to CONFIG_PATH, then ./bilinote.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API origin, overrides config and BILINOTE_API_BASE_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Session file, overrides config and BILINOTE_TOKEN_FILE
    #[arg(long, global = true)]
    token_file: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session. The password is read from stdin unless given.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "BILINOTE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account and sign in. Reads password and confirmation from stdin.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        username: Option<String>,
        /// Agree to the Terms of Service
        #[arg(long, default_value_t = false)]
        accept_terms: bool,
    },

    /// Forget the stored session (local only)
    Logout,

    /// Show the signed-in user, confirmed with the server
    Whoami,

    /// Update profile fields
    Profile {
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
    },

    /// Change password. Reads current and new password from stdin.
    ChangePassword,

    /// List pricing plans
    Plans,

    /// Show the current subscription
    Subscription,

    /// Show usage for the current billing period
    Usage,

    /// List invoices
    Invoices,

    /// Switch to a plan
    Subscribe { plan: PlanType, cycle: BillingCycle },

    /// Cancel the subscription (at period end unless --immediately)
    Cancel {
        #[arg(long, default_value_t = false)]
        immediately: bool,
    },

    /// Start a hosted checkout for a paid plan
    Checkout { plan: PlanType, cycle: BillingCycle },

    /// Open the hosted billing portal
    Portal,
}

/// Navigator for a terminal: there is no page to switch, so tell the user.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn redirect_to_login(&self) {
        info!(entry_point = notes_auth::LOGIN_ENTRY_POINT, "session ended, login required");
        eprintln!("Session expired. Run `bilinote login` to sign in again.");
    }

    fn open_url(&self, url: &str) {
        eprintln!("Open this URL in your browser to continue:\n  {url}");
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let source = Config::resolve_path(cli.config.as_deref());
    debug!(path = %source.path.display(), explicit = source.explicit, "loading configuration");
    let config = Config::load(&source)
        .with_context(|| format!("failed to load config from {}", source.path.display()))?
        .with_overrides(cli.api_url, cli.token_file)
        .context("invalid command-line override")?;

    let token_file = config.token_file();
    info!(
        base_url = %config.api.base_url,
        token_file = %token_file.display(),
        headers = config.api.headers.len(),
        "configuration loaded"
    );

    let store = TokenStore::open_file(token_file.clone())
        .with_context(|| format!("failed to open session file {}", token_file.display()))?;
    let transport = Transport::new(config.transport()).context("failed to build HTTP client")?;
    let app = AppContext::new(transport, store, Arc::new(TerminalNavigator));

    run(&app, cli.cmd).await
}

async fn run(app: &AppContext, cmd: Command) -> Result<()> {
    let session = app.session();
    let billing = app.billing();

    match cmd {
        Command::Login { email, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt("Password: ")?,
            };
            let user = session
                .login(&LoginRequest { email, password })
                .await
                .map_err(|e| displayed(e, session.snapshot().error))?;
            print_json(&user)
        }
        Command::Register {
            email,
            full_name,
            username,
            accept_terms,
        } => {
            let password = prompt("Password: ")?;
            let confirm_password = prompt("Confirm password: ")?;
            let request = validate_registration(&RegistrationForm {
                email,
                password,
                confirm_password,
                full_name,
                username,
                accept_terms,
            })?;
            let user = session
                .register(&request)
                .await
                .map_err(|e| displayed(e, session.snapshot().error))?;
            print_json(&user)
        }
        Command::Logout => {
            session.logout();
            print_json(&json!({"phase": session.snapshot().phase.as_str()}))
        }
        Command::Whoami => {
            if !session.restore() {
                anyhow::bail!("not logged in");
            }
            let user = session
                .confirm()
                .await
                .context("stored session is no longer valid")?;
            print_json(&json!({"phase": session.snapshot().phase.as_str(), "user": user}))
        }
        Command::Profile {
            full_name,
            username,
            avatar_url,
        } => {
            let update = ProfileUpdate {
                full_name,
                username,
                avatar_url,
            };
            if update.is_empty() {
                anyhow::bail!("nothing to update: pass --full-name, --username or --avatar-url");
            }
            let user = session
                .update_profile(&update)
                .await
                .map_err(|e| displayed(e, session.snapshot().error))?;
            print_json(&user)
        }
        Command::ChangePassword => {
            let current = prompt("Current password: ")?;
            let new = prompt("New password: ")?;
            session
                .change_password(&current, &new)
                .await
                .map_err(|e| displayed(e, session.snapshot().error))?;
            print_json(&json!({"changed": true}))
        }
        Command::Plans => {
            billing.fetch_plans().await;
            print_fetched(billing.snapshot(), |s| json!(s.plans))
        }
        Command::Subscription => {
            billing.fetch_subscription().await;
            print_fetched(billing.snapshot(), |s| json!(s.subscription))
        }
        Command::Usage => {
            billing.fetch_usage().await;
            print_fetched(billing.snapshot(), |s| json!(s.usage))
        }
        Command::Invoices => {
            billing.fetch_invoices().await;
            print_fetched(billing.snapshot(), |s| json!(s.invoices))
        }
        Command::Subscribe { plan, cycle } => {
            let sub = billing
                .subscribe(plan, cycle)
                .await
                .map_err(|e| displayed(e, billing.snapshot().error))?;
            print_json(&sub)
        }
        Command::Cancel { immediately } => {
            let sub = billing
                .cancel_subscription(immediately)
                .await
                .map_err(|e| displayed(e, billing.snapshot().error))?;
            print_json(&sub)
        }
        Command::Checkout { plan, cycle } => {
            let url = billing
                .start_checkout(plan, cycle)
                .await
                .map_err(|e| displayed(e, billing.snapshot().error))?;
            print_json(&json!({"url": url}))
        }
        Command::Portal => {
            let url = billing
                .open_customer_portal()
                .await
                .map_err(|e| displayed(e, billing.snapshot().error))?;
            print_json(&json!({"url": url}))
        }
    }
}

/// Wrap a client error with the message the store recorded for display.
fn displayed(e: notes_client::Error, message: Option<String>) -> anyhow::Error {
    match message {
        Some(message) => anyhow::Error::new(e).context(message),
        None => anyhow::Error::new(e),
    }
}

fn print_fetched(
    snapshot: BillingSnapshot,
    select: impl FnOnce(&BillingSnapshot) -> serde_json::Value,
) -> Result<()> {
    if let Some(message) = snapshot.error {
        anyhow::bail!(message);
    }
    print_json(&select(&snapshot))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{out}");
    Ok(())
}

/// Read one line from stdin, prompting on stderr.
fn prompt(label: &str) -> Result<String> {
    eprint!("{label}");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
