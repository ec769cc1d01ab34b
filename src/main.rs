use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::EnvFilter;

use cv_chat_core::{
    profile, CompletionSettings, Config, Conversation, CredentialStore, FeedItem, NoticeKind,
    OpenAIClient, SendOutcome,
};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;

const LOG_FILTER_ENV: &str = "CV_CHAT_LOG";

#[derive(Parser)]
#[command(name = "cv-chat")]
#[command(about = "Chat with an AI assistant that knows Lars's CV")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// OpenAI model to use
    #[arg(short, long, global = true)]
    model: Option<String>,
    /// File to use as the assistant's context instead of the built-in CV
    #[arg(short, long, global = true)]
    context: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// Your question
        question: String,
    },
    /// Save the OpenAI API key for future sessions
    SetKey {
        /// The API key
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("{}: {}", "Ignoring unreadable config".yellow(), e);
        Config::new()
    });

    match cli.command {
        Some(Commands::Ask { ref question }) => {
            init_stderr_logging();
            ask(&cli, &config, question).await
        }
        Some(Commands::SetKey { ref key }) => {
            init_stderr_logging();
            set_key(key)
        }
        None => {
            init_file_logging()?;
            run_tui(&cli, &config).await
        }
    }
}

fn log_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter("warn"))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// The TUI owns the terminal, so logs go to a file in the config directory
fn init_file_logging() -> Result<()> {
    let log_dir = Config::config_dir()?;
    fs::create_dir_all(&log_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("cv-chat.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(log_filter("info"))
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .init();
    Ok(())
}

/// Environment variable first, then the stored key
fn resolve_credential(store: &CredentialStore) -> Option<String> {
    std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| store.get())
}

fn build_conversation(cli: &Cli, config: &Config, credential: Option<String>) -> Result<Conversation> {
    let context_path = cli.context.as_ref().or(config.context_path.as_ref());
    let system_prompt = match context_path {
        Some(path) => profile::load_context(path)?,
        None => profile::CV_CONTEXT.to_string(),
    };

    let mut settings = CompletionSettings::from_config(config);
    if let Some(model) = &cli.model {
        settings.model = model.clone();
    }

    Ok(Conversation::new(system_prompt, credential, settings))
}

async fn run_tui(cli: &Cli, config: &Config) -> Result<()> {
    let credentials = CredentialStore::open_default()?;
    let credential = resolve_credential(&credentials);
    let conversation = build_conversation(cli, config, credential)?;
    let client = OpenAIClient::with_endpoint(config.endpoint());
    let suggestions = profile::SUGGESTIONS.iter().map(|s| s.to_string()).collect();

    let mut app = App::new(conversation, credentials, client, suggestions);
    tracing::info!(model = %app.conversation.settings().model, "chat session started");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let tx = events.sender();

    let result: Result<()> = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event, &tx)?,
                None => break,
            }
        }
        Ok(())
    }
    .await;

    tui::restore()?;
    tracing::info!(turns = app.conversation.transcript().len(), "chat session ended");
    result
}

async fn ask(cli: &Cli, config: &Config, question: &str) -> Result<()> {
    let credentials = CredentialStore::open_default()?;
    let credential = resolve_credential(&credentials);
    let mut conversation = build_conversation(cli, config, credential)?;
    let client = OpenAIClient::with_endpoint(config.endpoint());

    println!("🤖 Asking {}...\n", conversation.settings().model.bold().magenta());

    let outcome = conversation.send(question, &client).await;
    if let Some(hint) = outcome_hint(&outcome) {
        println!("{}", hint.yellow());
    }
    if let SendOutcome::Ignored = outcome {
        return Ok(());
    }

    for item in conversation.feed() {
        match item {
            FeedItem::Message(msg) if msg.role == cv_chat_core::ChatRole::Assistant => {
                println!("{}", "Response:".bold().green());
                println!("{}", msg.content);
            }
            FeedItem::Message(_) => {}
            FeedItem::Notice(notice) => match notice.kind {
                NoticeKind::Info => println!("{}", notice.text.green()),
                NoticeKind::Warning => println!("{}", notice.text.yellow()),
                NoticeKind::Error => println!("{}", notice.text.red()),
            },
        }
    }

    Ok(())
}

/// Extra guidance for `ask` when the question was not sent
fn outcome_hint(outcome: &SendOutcome) -> Option<&'static str> {
    match outcome {
        SendOutcome::Ignored => Some("Empty question, nothing to ask"),
        SendOutcome::NeedsCredential => Some("Set one with: cv-chat set-key <KEY>"),
        SendOutcome::Dispatched(_) => None,
    }
}

fn set_key(key: &str) -> Result<()> {
    let credentials = CredentialStore::open_default()?;
    match credentials.set(key)? {
        Some(_) => println!(
            "{} {}",
            "API key saved to".green(),
            credentials.path().display()
        ),
        None => println!("{}", "Empty key ignored; the stored key is unchanged".yellow()),
    }
    Ok(())
}
