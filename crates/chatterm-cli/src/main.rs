//! chatterm CLI: Terminal client for OpenAI-compatible chat endpoints

use chatterm_engine::{
    default_config_dir, mask_secret, Conversation, OpenAiClient, Settings, SettingsStore,
};
use clap::{Args, Parser, Subcommand};
use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file written inside the config directory while the TUI owns the screen.
const LOG_FILE: &str = "chatterm.log";

/// Chat with an OpenAI-compatible endpoint from the terminal
#[derive(Parser)]
#[command(name = "chatterm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Args, Debug, Default)]
struct GlobalArgs {
    /// Directory holding the settings file and log
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Model for this session
    #[arg(long, global = true)]
    model: Option<String>,

    /// System prompt for this session
    #[arg(long, global = true)]
    system_prompt: Option<String>,

    /// Sampling temperature for this session (0.0 to 2.0)
    #[arg(long, global = true)]
    temperature: Option<f32>,

    /// API key for this session (not saved)
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the TUI (default when no command specified)
    Tui,

    /// Send a single message and print the reply
    Ask {
        /// Message text (words are joined with spaces)
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },

    /// Inspect or change saved settings
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Save the API key
    SetKey {
        /// The API key
        key: String,
    },

    /// Save the chat-completions endpoint URL
    SetUrl {
        /// Full endpoint URL
        url: String,
    },

    /// Remove the saved API key
    ClearKey,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config_dir = resolve_config_dir(&cli.global)?;
    let tui_mode = matches!(cli.command, None | Some(Commands::Tui));
    init_logging(&cli.global, &config_dir, tui_mode)?;

    let mut store = SettingsStore::open(&config_dir)?;
    debug!(path = %store.path().display(), "settings store opened");

    match cli.command {
        None | Some(Commands::Tui) => {
            let settings = effective_settings(&cli.global, &store)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(chatterm_tui::run_tui(settings, Some(store)))?;
        }
        Some(Commands::Ask { prompt }) => {
            let settings = effective_settings(&cli.global, &store)?;
            cmd_ask(&prompt.join(" "), &settings)?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigCommand::Show { json } => {
                let settings = effective_settings(&cli.global, &store)?;
                cmd_config_show(&settings, &store, json)?;
            }
            ConfigCommand::SetKey { key } => {
                let settings = cmd_set_key(&mut store, &key)?;
                println!("API key saved ({})", settings.masked_api_key());
            }
            ConfigCommand::SetUrl { url } => {
                let settings = cmd_set_url(&mut store, &url)?;
                println!("Endpoint saved: {}", settings.endpoint);
            }
            ConfigCommand::ClearKey => {
                cmd_clear_key(&mut store)?;
                println!("API key removed");
            }
        },
    }

    Ok(())
}

fn resolve_config_dir(global: &GlobalArgs) -> Result<PathBuf, Box<dyn Error>> {
    match &global.config_dir {
        Some(dir) => Ok(dir.clone()),
        None => default_config_dir()
            .ok_or_else(|| "could not determine a config directory; pass --config-dir".into()),
    }
}

/// Install the tracing subscriber.
///
/// The TUI owns the terminal, so its logs go to a file in the config
/// directory. Every other command logs to stderr.
fn init_logging(
    global: &GlobalArgs,
    config_dir: &Path,
    tui_mode: bool,
) -> Result<(), Box<dyn Error>> {
    let default_filter = if global.debug {
        "debug"
    } else if tui_mode {
        "info"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if tui_mode {
        std::fs::create_dir_all(config_dir)?;
        let log_file = File::create(config_dir.join(LOG_FILE))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(log_file)),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(())
}

/// Stored settings with command-line overrides applied.
fn effective_settings(
    global: &GlobalArgs,
    store: &SettingsStore,
) -> Result<Settings, Box<dyn Error>> {
    let mut settings = Settings::load(store);
    apply_overrides(&mut settings, global)?;
    Ok(settings)
}

fn apply_overrides(settings: &mut Settings, global: &GlobalArgs) -> Result<(), Box<dyn Error>> {
    if let Some(model) = global.model.as_deref().map(str::trim) {
        if model.is_empty() {
            return Err("--model cannot be empty".into());
        }
        settings.model = model.to_string();
    }
    if let Some(prompt) = &global.system_prompt {
        settings.system_prompt.clone_from(prompt);
    }
    if let Some(temperature) = global.temperature {
        settings.set_temperature(temperature)?;
    }
    if let Some(key) = global.api_key.as_deref().map(str::trim) {
        if !key.is_empty() {
            settings.api_key = key.to_string();
        }
    }
    Ok(())
}

fn cmd_ask(prompt: &str, settings: &Settings) -> Result<(), Box<dyn Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    let client = OpenAiClient::new();
    let mut conversation = Conversation::new();

    info!(model = %settings.model, "asking");
    let sent = rt.block_on(conversation.submit(prompt, &client, settings));
    if !sent {
        return Err("prompt is empty".into());
    }

    let Some(reply) = conversation.messages().last() else {
        return Err("no reply recorded".into());
    };
    if reply.is_error() {
        let reason = reply.error_text.as_deref().unwrap_or(&reply.content);
        return Err(reason.to_string().into());
    }

    println!("{}", reply.content);
    Ok(())
}

/// Save only the API key; the stored endpoint is untouched.
fn cmd_set_key(store: &mut SettingsStore, key: &str) -> Result<Settings, Box<dyn Error>> {
    let mut settings = Settings::load(store);
    settings.api_key = key.trim().to_string();
    if !settings.has_api_key() {
        return Err("API key cannot be empty (use `config clear-key`)".into());
    }
    settings.persist_api_key(store)?;
    Ok(settings)
}

/// Save only the endpoint; the stored API key is untouched.
fn cmd_set_url(store: &mut SettingsStore, url: &str) -> Result<Settings, Box<dyn Error>> {
    let mut settings = Settings::load(store);
    settings.set_endpoint(url)?;
    settings.persist_endpoint(store)?;
    Ok(settings)
}

fn cmd_clear_key(store: &mut SettingsStore) -> Result<(), Box<dyn Error>> {
    let mut settings = Settings::load(store);
    settings.api_key.clear();
    settings.persist_api_key(store)?;
    Ok(())
}

fn cmd_config_show(
    settings: &Settings,
    store: &SettingsStore,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let api_key = if settings.has_api_key() {
        mask_secret(&settings.api_key)
    } else {
        String::new()
    };

    if json {
        let output = serde_json::json!({
            "settings_file": store.path(),
            "endpoint": settings.endpoint,
            "api_key": api_key,
            "model": settings.model,
            "system_prompt": settings.system_prompt,
            "temperature": settings.temperature,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("chatterm Settings\n");
    println!("  Settings file: {}", store.path().display());
    println!("  Endpoint:      {}", settings.endpoint);
    if api_key.is_empty() {
        println!("  API key:       (not set)");
    } else {
        println!("  API key:       {api_key}");
    }
    println!("  Model:         {}", settings.model);
    println!("  System prompt: {}", settings.system_prompt);
    println!("  Temperature:   {:.1}", settings.temperature);
    Ok(())
}
