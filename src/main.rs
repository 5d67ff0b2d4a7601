//! promptdesk -- command-line front end for the prompt library client core.
//!
//! Each invocation:
//!   - loads configuration
//!   - restores the persisted session and workspace
//!   - runs one command
//!   - prints the notices the command produced

use std::path::PathBuf;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use promptdesk::AppContext;
use promptdesk::api::google::{self, USERINFO_URL};
use promptdesk::api::{ListEnvelope, Resource, ResourceKind};
use promptdesk::config::Config;
use promptdesk::error::Error;
use promptdesk::notice::{Notice, NoticeLevel};
use promptdesk::session::{RefreshOutcome, SignUpForm};
use promptdesk::workspace::{Space, WorkspaceState};

// ---------------------------------------------------------------------------
// CLI argument parsing (minimal, no clap dependency)
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Status,
    SignIn { email: String, password: String },
    SignUp { name: String, email: String, password: String },
    SignInGoogle { access_token: String },
    SignOut,
    Refresh,
    Spaces,
    Switch { space: Space, organization_id: Option<String> },
    List { kind: ResourceKind },
    Search { query: String },
}

#[derive(Debug)]
struct CliArgs {
    config_path: PathBuf,
    command: Command,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<CliArgs, String> {
    let mut args = args.into_iter();
    let mut config_path = None;
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| "--config requires a path argument".to_string())?;
                config_path = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("promptdesk {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            flag if flag.starts_with('-') && flag.len() > 1 => {
                return Err(format!("Unknown argument: {flag}"));
            }
            _ => positional.push(arg),
        }
    }

    // PROMPTDESK_CONFIG is an alternative to --config
    let config_path = config_path
        .or_else(|| std::env::var_os("PROMPTDESK_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("promptdesk.toml"));

    Ok(CliArgs {
        config_path,
        command: parse_command(positional)?,
    })
}

fn parse_command(args: Vec<String>) -> Result<Command, String> {
    let mut args = args.into_iter();
    let name = args.next().unwrap_or_else(|| "status".to_string());
    let rest: Vec<String> = args.collect();

    let arity = |n: usize, usage: &str| -> Result<(), String> {
        if rest.len() == n {
            Ok(())
        } else {
            Err(format!("Usage: promptdesk {usage}"))
        }
    };

    match name.as_str() {
        "status" => arity(0, "status").map(|()| Command::Status),
        "sign-in" => {
            arity(2, "sign-in <email> <password>")?;
            Ok(Command::SignIn {
                email: rest[0].clone(),
                password: rest[1].clone(),
            })
        }
        "sign-up" => {
            arity(3, "sign-up <name> <email> <password>")?;
            Ok(Command::SignUp {
                name: rest[0].clone(),
                email: rest[1].clone(),
                password: rest[2].clone(),
            })
        }
        "sign-in-google" => {
            arity(1, "sign-in-google <access-token>")?;
            Ok(Command::SignInGoogle {
                access_token: rest[0].clone(),
            })
        }
        "sign-out" => arity(0, "sign-out").map(|()| Command::SignOut),
        "refresh" => arity(0, "refresh").map(|()| Command::Refresh),
        "spaces" => arity(0, "spaces").map(|()| Command::Spaces),
        "switch" => {
            if rest.is_empty() || rest.len() > 2 {
                return Err("Usage: promptdesk switch <personal|company|organization> [org-id]".into());
            }
            Ok(Command::Switch {
                space: rest[0].parse()?,
                organization_id: rest.get(1).cloned(),
            })
        }
        "list" => {
            arity(1, "list <templates|blocks|folders>")?;
            Ok(Command::List {
                kind: rest[0].parse()?,
            })
        }
        "search" => {
            if rest.is_empty() {
                return Err("Usage: promptdesk search <query>".into());
            }
            Ok(Command::Search {
                query: rest.join(" "),
            })
        }
        other => Err(format!("Unknown command: {other}")),
    }
}

fn print_usage() {
    println!(
        "\
promptdesk {version} -- prompt library client

USAGE:
    promptdesk [OPTIONS] [COMMAND]

COMMANDS:
    status                                  Show session and workspace [default]
    sign-in <email> <password>              Sign in with email and password
    sign-up <name> <email> <password>       Create an account
    sign-in-google <access-token>           Sign in with a Google OAuth access token
    sign-out                                Sign out and forget the session
    refresh                                 Refresh the session now
    spaces                                  List available workspaces
    switch <space> [org-id]                 Switch to personal, company or organization
    list <templates|blocks|folders>         List resources in the current workspace
    search <query>                          Search templates in the current workspace

OPTIONS:
    -c, --config <PATH>    Path to configuration file [default: promptdesk.toml]
    -h, --help             Print this help message
    -V, --version          Print version information

ENVIRONMENT:
    RUST_LOG               Override log level (e.g. RUST_LOG=debug)
    PROMPTDESK_CONFIG      Alternative to --config flag
    PROMPTDESK_API_URL     Override api.base_url
",
        version = env!("CARGO_PKG_VERSION")
    );
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    let cli = match parse_args(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(message) => {
            eprintln!("Error: {message}");
            eprintln!("Run with --help for usage information.");
            std::process::exit(2);
        }
    };

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: CliArgs) -> anyhow::Result<()> {
    let config = Config::load(&cli.config_path)?;
    init_tracing(&config);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config_path.display(),
        api = %config.api.base_url,
        storage = %config.storage.backend,
        "Starting promptdesk"
    );
    for (setting, var) in config.env_overrides.iter() {
        tracing::debug!(setting, var, "Setting overridden from environment");
    }

    let ctx = AppContext::new(config)?;
    let mut notices = ctx.notifier.subscribe();
    let _background = ctx.start().await;

    let result = run(&ctx, cli.command).await;
    print_notices(&mut notices);

    let known = result.as_ref().err().and_then(|e| e.downcast_ref::<Error>());
    if let Some(err) = known {
        // User-facing failures were already printed as notices.
        if err.is_user_facing() {
            std::process::exit(1);
        }
        if err.requires_reauth() {
            eprintln!("Not signed in. Run `promptdesk sign-in <email> <password>` first.");
            std::process::exit(1);
        }
    }
    result
}

async fn run(ctx: &AppContext, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Status => print_status(ctx),
        Command::SignIn { email, password } => {
            ctx.session.sign_in(&email, &password).await?;
            settle_workspace(ctx).await;
            print_status(ctx);
        }
        Command::SignUp {
            name,
            email,
            password,
        } => {
            let form = SignUpForm {
                name,
                email,
                confirm_password: password.clone(),
                password,
            };
            let outcome = ctx.session.submit_sign_up(&form).await?;
            tracing::debug!(route = ?outcome.route(), "Sign-up finished");
            settle_workspace(ctx).await;
            print_status(ctx);
        }
        Command::SignInGoogle { access_token } => {
            let credential =
                google::credential_from_access_token(ctx.api.http(), USERINFO_URL, &access_token)
                    .await?;
            ctx.session.sign_in_with_google(&credential).await?;
            settle_workspace(ctx).await;
            print_status(ctx);
        }
        Command::SignOut => {
            ctx.session.sign_out().await;
            settle_workspace(ctx).await;
        }
        Command::Refresh => {
            require_session(ctx)?;
            match ctx.session.refresh().await {
                RefreshOutcome::Refreshed => println!("Session refreshed"),
                RefreshOutcome::Stale => println!("Session changed during refresh"),
                RefreshOutcome::SignedOut => {
                    anyhow::bail!("Session could not be refreshed, signed out")
                }
            }
        }
        Command::Spaces => {
            require_session(ctx)?;
            print_spaces(&ctx.workspace.state());
        }
        Command::Switch {
            space,
            organization_id,
        } => {
            require_session(ctx)?;
            let state = ctx
                .workspace
                .switch_space(space, organization_id.as_deref())
                .await?;
            println!("{}", state.welcome_message());
        }
        Command::List { kind } => {
            require_session(ctx)?;
            let scope = ctx.workspace.scope();
            let list = ctx.api.list(kind, scope.as_ref()).await?;
            print_resources(&list);
        }
        Command::Search { query } => {
            require_session(ctx)?;
            let scope = ctx.workspace.scope();
            let list = ctx.api.search(&query, scope.as_ref()).await?;
            print_resources(&list);
        }
    }
    Ok(())
}

fn require_session(ctx: &AppContext) -> anyhow::Result<()> {
    if ctx.session.is_authenticated() {
        Ok(())
    } else {
        Err(Error::NotAuthenticated.into())
    }
}

/// Let the background follower finish reloading the workspace for whoever
/// is signed in now.
async fn settle_workspace(ctx: &AppContext) {
    let snapshot = ctx.session.snapshot();
    let user_id = snapshot
        .user
        .filter(|_| snapshot.is_authenticated)
        .map(|user| user.id);
    let wait = ctx.workspace.wait_for_user(user_id.as_deref());
    if tokio::time::timeout(ctx.config.api.timeout(), wait).await.is_err() {
        tracing::warn!("Timed out waiting for workspace data");
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_status(ctx: &AppContext) {
    let snapshot = ctx.session.snapshot();
    match snapshot.user.as_ref().filter(|_| snapshot.is_authenticated) {
        Some(user) => {
            let workspace = ctx.workspace.state();
            println!("Signed in as {} <{}>", user.display_name(), user.email);
            println!("Workspace: {}", workspace.space_label());
            if let Some(scope) = workspace.scope() {
                println!("Scope:     {scope}");
            }
            println!("{}", workspace.welcome_message());
        }
        None => println!("Not signed in"),
    }
}

fn print_spaces(state: &WorkspaceState) {
    let marker = |active: bool| if active { "*" } else { " " };
    println!("{} personal", marker(state.current_space == Space::Personal));
    if let Some(company_id) = &state.company_id {
        println!(
            "{} company        {company_id}",
            marker(state.current_space == Space::Company)
        );
    }
    for org in &state.available_organizations {
        let active = state
            .current_organization
            .as_ref()
            .is_some_and(|current| current.id == org.id);
        println!("{} organization   {}  {}", marker(active), org.id, org.name);
    }
}

fn print_resources(list: &ListEnvelope<Resource>) {
    for item in &list.data {
        println!("{:<24} {}", item.id_string(), item.title().unwrap_or("-"));
    }
    println!("({} of {})", list.len(), list.total());
}

fn print_notices(rx: &mut broadcast::Receiver<Notice>) {
    while let Ok(notice) = rx.try_recv() {
        match notice.level {
            NoticeLevel::Success => println!("{}", notice.message),
            NoticeLevel::Warning => eprintln!("warning: {}", notice.message),
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
        }
    }
}

// ---------------------------------------------------------------------------
// Tracing initialization
// ---------------------------------------------------------------------------

/// Set up the tracing subscriber based on configuration.
///
/// Logs go to stderr so command output stays clean on stdout.
fn init_tracing(config: &Config) {
    // RUST_LOG env var takes precedence over config file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.logging.level;
        EnvFilter::new(format!("promptdesk={level},warn"))
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_print_usage_does_not_panic() {
        print_usage();
    }

    #[test]
    fn test_default_command_is_status() {
        let cli = parse_args(args(&["-c", "/tmp/pd.toml"])).unwrap();
        assert_eq!(cli.config_path, PathBuf::from("/tmp/pd.toml"));
        assert_eq!(cli.command, Command::Status);
    }

    #[test]
    fn test_parse_sign_in() {
        let cli = parse_args(args(&["sign-in", "ada@example.com", "hunter22"])).unwrap();
        assert_eq!(
            cli.command,
            Command::SignIn {
                email: "ada@example.com".into(),
                password: "hunter22".into()
            }
        );
    }

    #[test]
    fn test_parse_switch() {
        let cli = parse_args(args(&["switch", "organization", "o1"])).unwrap();
        assert_eq!(
            cli.command,
            Command::Switch {
                space: Space::Organization,
                organization_id: Some("o1".into())
            }
        );
        assert!(parse_args(args(&["switch", "team"])).is_err());
        assert!(parse_args(args(&["switch"])).is_err());
    }

    #[test]
    fn test_parse_list_and_search() {
        let cli = parse_args(args(&["list", "folders"])).unwrap();
        assert_eq!(
            cli.command,
            Command::List {
                kind: ResourceKind::Folders
            }
        );
        let cli = parse_args(args(&["search", "weekly", "report"])).unwrap();
        assert_eq!(
            cli.command,
            Command::Search {
                query: "weekly report".into()
            }
        );
    }

    #[test]
    fn test_rejects_unknown() {
        assert!(parse_args(args(&["frobnicate"])).is_err());
        assert!(parse_args(args(&["--verbose"])).is_err());
        assert!(parse_args(args(&["sign-in", "only-email"])).is_err());
    }
}
