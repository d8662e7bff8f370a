use std::io::Read as _;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use codepair::config::{ClientConfig, ConfigError};
use codepair::coordinator::{SessionCoordinator, Update};
use codepair::net::api::{ApiError, Executor, HttpApi, SessionAdmission};
use codepair::net::event::EventKind;
use codepair::net::types::{ExecuteRequest, ExecutionResult};
use codepair::state::roster;
use codepair::state::{LineKind, Notice, SessionError, SessionState};
use frames::{Language, UnsupportedLanguage};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Language(#[from] UnsupportedLanguage),
    #[error("io failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "codepair", about = "Shared code session client")]
struct Cli {
    #[arg(long, env = "CODEPAIR_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "CODEPAIR_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and print a token.
    Login(AuthArgs),
    /// Create an account and print a token.
    Register(AuthArgs),
    /// Create a session and print its id.
    Create {
        #[arg(long, default_value = "javascript")]
        language: String,
    },
    /// Execute code once and print the result.
    Run {
        #[arg(long)]
        language: String,
        /// Source file, or `-` for stdin.
        #[arg(long, default_value = "-")]
        file: String,
    },
    /// Join a session and edit it from stdin.
    Join {
        session_id: String,
        #[arg(long, default_value = "javascript")]
        language: String,
    },
}

#[derive(Args, Debug)]
struct AuthArgs {
    #[arg(long)]
    username: String,
    #[arg(long, env = "CODEPAIR_PASSWORD")]
    password: String,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt::init();
    if let Err(e) = dotenv {
        debug!(error = %e, "no .env loaded");
    }

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let api = HttpApi::new(&config)?;

    match cli.command {
        Command::Login(args) => {
            let auth = api.login(&args.username, &args.password).await?;
            println!("{}", auth.token);
        }
        Command::Register(args) => {
            let auth = api.register(&args.username, &args.password).await?;
            println!("{}", auth.token);
        }
        Command::Create { language } => {
            let session_id = api.create_session(language.parse()?).await?;
            println!("{session_id}");
        }
        Command::Run { language, file } => {
            let code = read_source(&file)?;
            let request = ExecuteRequest { code, language: language.parse()? };
            let result = match api.execute(&request).await {
                Ok(result) => result,
                Err(e) => ExecutionResult::fault(e.to_string()),
            };
            print_result(&result);
        }
        Command::Join { session_id, language } => {
            run_join(&config, &session_id, language.parse()?, Arc::new(api)).await?;
        }
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config.base_url = ClientConfig::new(base_url)?.base_url;
    }
    if let Some(token) = &cli.token {
        config.token = Some(token.clone());
    }
    Ok(config)
}

fn read_source(file: &str) -> Result<String, CliError> {
    if file == "-" {
        let mut code = String::new();
        std::io::stdin().read_to_string(&mut code)?;
        return Ok(code);
    }
    Ok(std::fs::read_to_string(file)?)
}

/// Read a file for `:load`. Errors name the path.
async fn load_source(path: &str) -> Result<String, String> {
    if path.is_empty() {
        return Err("usage: :load <path>".to_owned());
    }
    tokio::fs::read_to_string(path).await.map_err(|e| format!("cannot read {path}: {e}"))
}

// =============================================================================
// JOIN
// =============================================================================

async fn run_join(
    config: &ClientConfig,
    session_id: &str,
    language: Language,
    executor: Arc<dyn Executor>,
) -> Result<(), CliError> {
    let mut coordinator = SessionCoordinator::join(config, session_id, language, executor)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!("joining {session_id}; type :help for commands");

    loop {
        tokio::select! {
            update = coordinator.next() => {
                let Some(update) = update else { break };
                report_update(&update, coordinator.state());
                print_notices(coordinator.take_notices());
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(&mut coordinator, &line).await? {
                    break;
                }
                print_notices(coordinator.take_notices());
            }
        }
    }
    coordinator.teardown();
    Ok(())
}

/// Apply one stdin line. Returns false to quit.
async fn handle_line(coordinator: &mut SessionCoordinator, line: &str) -> Result<bool, CliError> {
    let (command, arg) = line.split_once(' ').map_or((line, ""), |(c, a)| (c, a.trim()));
    let outcome = match command {
        ":quit" => return Ok(false),
        ":help" => {
            eprintln!(":lang <language> | :run | :clear | :users | :show | :load <path> | :quit");
            Ok(())
        }
        ":lang" => coordinator.change_language(arg),
        ":run" => coordinator.run_current().map(|seq| eprintln!("run #{seq} started")),
        ":clear" => {
            coordinator.clear_output();
            Ok(())
        }
        ":users" => {
            print_roster(coordinator.state());
            Ok(())
        }
        ":show" => {
            print_editor(coordinator.state());
            Ok(())
        }
        ":load" => match load_source(arg).await {
            Ok(code) => coordinator.apply_local_edit(&code),
            Err(e) => {
                eprintln!("rejected: {e}");
                Ok(())
            }
        },
        _ => {
            let mut code = coordinator.state().code().to_owned();
            if !code.is_empty() && !code.ends_with('\n') {
                code.push('\n');
            }
            code.push_str(line);
            coordinator.apply_local_edit(&code)
        }
    };
    match outcome {
        Ok(()) => Ok(true),
        Err(SessionError::SessionLeft) => Ok(false),
        Err(e) => {
            eprintln!("rejected: {e}");
            Ok(true)
        }
    }
}

fn report_update(update: &Update, state: &SessionState) {
    match update {
        Update::Event(EventKind::CodeUpdate | EventKind::LanguageChanged) => print_editor(state),
        Update::Event(EventKind::UsersUpdated) => print_roster(state),
        Update::RunFinished { seq, .. } => {
            if let Some(output) = state.output() {
                eprintln!("--- run #{seq} {:?} in {}ms ---", output.status(), output.result.execution_time_ms);
                for line in output.lines() {
                    match line.kind {
                        LineKind::Log => println!("{}", line.text),
                        LineKind::Error => eprintln!("! {}", line.text),
                    }
                }
            }
        }
        Update::RunDiscarded { seq } => eprintln!("run #{seq} result discarded"),
        Update::Event(_) => {}
    }
}

fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        match notice {
            Notice::Joined { session_id } => eprintln!("* joined {session_id}"),
            Notice::PeerJoined { name, .. } => eprintln!("* {name} joined"),
            Notice::PeerLeft { id, name } => eprintln!("* {} left", name.unwrap_or(id)),
            Notice::Disconnected { reason } => {
                eprintln!("* disconnected{}", reason.map(|r| format!(": {r}")).unwrap_or_default());
            }
            Notice::TransportError(message) => eprintln!("* connection error: {message}"),
        }
    }
}

fn print_editor(state: &SessionState) {
    let view = state.editor_view();
    println!("--- {} (rev {}) ---", view.language.label(), view.revision);
    println!("{}", view.text);
    println!("---");
}

fn print_roster(state: &SessionState) {
    for entry in roster::entries(state.roster(), state.self_id()) {
        let badge = if entry.shows_host_badge { " [host]" } else { "" };
        let me = if entry.is_self { " (you)" } else { "" };
        let initial = entry.initial.unwrap_or('?');
        println!("[{initial}] {}{badge}{me}", entry.participant.name);
    }
}

fn print_result(result: &ExecutionResult) {
    let status = if result.success { "ok" } else { "failed" };
    eprintln!("--- {status} in {}ms ---", result.execution_time_ms);
    print!("{}", result.output);
    if let Some(error) = &result.error {
        eprintln!("{error}");
    }
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
