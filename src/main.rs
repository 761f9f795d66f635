use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::BufReader;

use hue_chat::bridge::HueBridge;
use hue_chat::chat::Reply;
use hue_chat::error::AppError;
use hue_chat::lights::{ControlOutcome, DeviceController};
use hue_chat::llm::HttpCompletionService;
use hue_chat::model::LightId;
use hue_chat::session::{LoopEnd, Session, TurnOutput, TurnSink};
use hue_chat::settings::{self, AppSettings, SettingsInfo};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "hue-chat", about = "Control Hue lights by chatting with a language model", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config directory override
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Bridge address (IP or URL), overrides settings
    #[arg(long, global = true)]
    bridge: Option<String>,

    /// Bridge username, overrides settings
    #[arg(long, global = true)]
    username: Option<String>,

    /// Completion model, overrides settings
    #[arg(long, global = true)]
    model: Option<String>,

    /// Output raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant (default)
    Chat,
    /// List addressable light and group names
    Lights,
    /// Register with the bridge after pressing its link button
    Pair {
        #[arg(long, default_value = "hue_chat#cli")]
        devicetype: String,
    },
    /// Show the effective settings
    Settings,
    /// Store the completion API key in the credentials file
    SetKey { key: String },
    /// Switch a light or group on or off without the model
    Power { name: String, state: PowerState },
    /// Set a light or group brightness (0-254) without the model
    Brightness { name: String, level: u8 },
}

#[derive(Clone, Copy, ValueEnum)]
enum PowerState {
    On,
    Off,
}

// ── Setup ────────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    let fallback_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_settings(cli: &Cli, config_dir: &std::path::Path) -> Result<AppSettings, AppError> {
    let mut loaded = settings::load_or_default(config_dir)?;
    if let Some(ref bridge) = cli.bridge {
        loaded.bridge.address = Some(bridge.clone());
    }
    if let Some(ref username) = cli.username {
        loaded.bridge.username = Some(username.clone());
    }
    if let Some(ref model) = cli.model {
        loaded.llm.model = Some(model.clone());
    }
    Ok(loaded)
}

fn timeout(settings: &AppSettings) -> Duration {
    Duration::from_secs(settings.request_timeout_secs)
}

fn connect_bridge(settings: &AppSettings) -> Result<HueBridge, AppError> {
    let address = settings.bridge.address.as_deref().ok_or(AppError::NoBridge)?;
    let username = settings.bridge.username.as_deref().ok_or(AppError::NoBridge)?;
    HueBridge::new(address, username, timeout(settings))
}

fn print_json<T: serde::Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// ── Commands ─────────────────────────────────────────────────────

async fn run_lights(settings: &AppSettings, raw_json: bool) -> Result<(), AppError> {
    let controller = DeviceController::discover(connect_bridge(settings)?).await?;
    let registry = controller.registry();
    if raw_json {
        print_json(registry);
        return Ok(());
    }
    for (name, ids) in registry.iter() {
        let ids: Vec<&str> = ids.iter().map(LightId::as_str).collect();
        println!("{name}: [{}]", ids.join(", "));
    }
    Ok(())
}

async fn run_pair(
    settings: &mut AppSettings,
    config_dir: &std::path::Path,
    devicetype: &str,
) -> Result<(), AppError> {
    let address = settings.bridge.address.clone().ok_or(AppError::NoBridge)?;
    let username = HueBridge::pair(&address, devicetype, timeout(settings)).await?;
    settings.bridge.username = Some(username.clone());
    settings::save_settings(config_dir, settings)?;
    println!("Paired with {address}. Username: {username}");
    Ok(())
}

fn run_set_key(config_dir: &std::path::Path, key: &str) -> Result<(), AppError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(AppError::NoApiKey);
    }
    settings::save_api_key(config_dir, key)?;
    println!("API key saved to {}", hue_chat::paths::credentials_path(config_dir).display());
    Ok(())
}

enum DirectControl {
    Power(bool),
    Brightness(u8),
}

async fn run_control(
    settings: &AppSettings,
    name: &str,
    control: DirectControl,
    raw_json: bool,
) -> Result<(), AppError> {
    let controller = DeviceController::discover(connect_bridge(settings)?).await?;
    let outcome = match control {
        DirectControl::Power(on) => controller.set_power(name, on).await?,
        DirectControl::Brightness(level) => controller.set_brightness(name, level).await?,
    };
    let outcome: ControlOutcome = outcome.found()?;
    if raw_json {
        print_json(&outcome);
    } else {
        println!("{outcome}");
    }
    Ok(())
}

struct Console;

impl TurnSink for Console {
    fn prompt(&mut self) {
        print!("User input (or 'quit'): ");
        let _ = std::io::stdout().flush();
    }

    fn turn(&mut self, persona: &str, result: Result<&TurnOutput, &AppError>) {
        let turn = match result {
            Ok(turn) => turn,
            Err(e) => {
                eprintln!("Error: {e}");
                return;
            }
        };
        if let Reply::Text(text) = &turn.reply {
            println!("{persona}: {text}");
        }
        let outcome = turn.dispatch.to_string();
        if !outcome.is_empty() {
            println!("{outcome}");
        }
    }
}

async fn run_chat(settings: &AppSettings) -> Result<(), AppError> {
    let controller = DeviceController::discover(connect_bridge(settings)?).await?;
    let service = HttpCompletionService::new(&settings.llm, timeout(settings))?;
    tracing::info!(model = service.model(), "completion service ready");

    let mut session = Session::start(
        &settings.persona,
        service,
        controller,
        settings.household_notes.as_deref(),
    )?;

    println!("{} mission...", session.conversation().persona());
    if let Some(mission) = session.conversation().history().first() {
        println!("{}", mission.text);
    }
    println!("------------");

    let end = session.run(BufReader::new(tokio::io::stdin()), &mut Console).await;
    if let LoopEnd::ReadFailed(e) = end {
        eprintln!("Error: {e}");
    }

    let summary = session.summary();
    println!("\nTotal tokens used: {}", summary.total_tokens);
    println!("Cost incurred (USD): {}", summary.cost_usd);
    Ok(())
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(hue_chat::paths::default_config_dir);

    let mut loaded = match load_settings(&cli, &config_dir) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command.as_ref().unwrap_or(&Commands::Chat) {
        Commands::Chat => run_chat(&loaded).await,
        Commands::Lights => run_lights(&loaded, cli.json).await,
        Commands::Pair { devicetype } => run_pair(&mut loaded, &config_dir, devicetype).await,
        Commands::Settings => {
            let info = SettingsInfo::from_settings(&loaded);
            if cli.json {
                print_json(&info);
            } else {
                println!("Config dir: {}", config_dir.display());
                println!("Persona: {}", info.persona);
                println!("Bridge: {}", info.bridge.address.as_deref().unwrap_or("(not set)"));
                println!("Paired: {}", if info.bridge.username.is_some() { "yes" } else { "no" });
                println!("Provider: {:?}", info.llm.provider);
                println!("Model: {}", info.llm.model.as_deref().unwrap_or("(provider default)"));
                println!("API key: {}", if info.llm.has_api_key { "set" } else { "missing" });
            }
            Ok(())
        }
        Commands::SetKey { key } => run_set_key(&config_dir, key),
        Commands::Power { name, state } => {
            let on = matches!(state, PowerState::On);
            run_control(&loaded, name, DirectControl::Power(on), cli.json).await
        }
        Commands::Brightness { name, level } => {
            run_control(&loaded, name, DirectControl::Brightness(*level), cli.json).await
        }
    };

    if let Err(e) = result {
        if cli.json {
            print_json(&e);
        } else {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}
