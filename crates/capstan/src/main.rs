mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use capstan_core::kernel::constants::SETTINGS_FILE_NAME;
use capstan_core::kernel::Settings;
use capstan_core::storage::LocalStorageProvider;
use capstan_core::{Application, CapabilityCatalog, Result};
use clap::Parser;
use log::{debug, warn};
use serde_json::Value;
use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;

use cli::{CliArgs, Commands, PluginCommand};

/// Environment variable holding the log filter directive
const LOG_ENV: &str = "CAPSTAN_LOG";

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    // Route `log` records from capstan-core and the plugins into tracing
    if let Err(e) = LogTracer::init() {
        eprintln!("Failed to bridge log records: {}", e);
    }
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {}", e);
    }
}

/// Settings file, then CLI overrides
fn resolve_settings(args: &CliArgs) -> Result<Settings> {
    let provider = LocalStorageProvider::new(PathBuf::new());
    let mut settings = match &args.config {
        Some(path) => Settings::load(&provider, path)?,
        None => Settings::load_or_default(&provider, Path::new(SETTINGS_FILE_NAME))?,
    };
    if let Some(dir) = &args.plugins_dir {
        settings.plugins_dir = dir.clone();
    }
    if let Some(dir) = &args.state_dir {
        settings.state_dir = dir.clone();
    }
    Ok(settings)
}

// --- Statically linked plugins ---
fn plugin_catalog() -> CapabilityCatalog {
    let mut catalog = CapabilityCatalog::new();
    core_docs::register(&mut catalog);
    analytics::register(&mut catalog);
    debug!("Capability catalog: {:?}", catalog);
    catalog
}

fn print_json<T: serde::Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to encode output: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_plugin_command(app: &Application, command: PluginCommand) -> ExitCode {
    let manager = app.plugin_manager();
    match command {
        PluginCommand::List { json } => {
            let manifests = manager.get_manifests();
            if json {
                return print_json(&manifests);
            }
            if manifests.is_empty() {
                println!("No plugins found in {}", app.settings().plugins_dir.display());
            }
            for manifest in manifests {
                let capabilities = manifest.get_capability_names().join(", ");
                println!("{}\t{}\t{}\t[{}]", manifest.name, manifest.version, manifest.state, capabilities);
                if let Some(message) = &manifest.error_message {
                    println!("    error: {}", message);
                }
            }
            ExitCode::SUCCESS
        }
        PluginCommand::Enable { name } => match manager.enable(&name) {
            Ok(()) => {
                println!("Enabled plugin '{}': {}", name, manager.plugin_capabilities(&name).join(", "));
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error enabling plugin '{}': {}", name, e);
                ExitCode::FAILURE
            }
        },
        PluginCommand::Disable { name } => match manager.disable(&name) {
            Ok(()) => {
                println!("Disabled plugin '{}'", name);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error disabling plugin '{}': {}", name, e);
                ExitCode::FAILURE
            }
        },
        PluginCommand::Refresh => print_json(&manager.refresh()),
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    let settings = match resolve_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let app = match Application::new(settings, plugin_catalog()) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to initialize application: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match args.command {
        Commands::Plugin { command } => run_plugin_command(&app, command),
        Commands::Tools { identity, json } => {
            let descriptors = app.registry().get_available(&identity.identity());
            if json {
                return print_json(&descriptors);
            }
            for descriptor in descriptors {
                println!("{}\t{}\t({})", descriptor.name, descriptor.description, descriptor.plugin);
            }
            ExitCode::SUCCESS
        }
        Commands::Call { name, args, identity } => {
            let args = match args.as_deref().map(|raw| serde_json::from_str::<Value>(raw)).transpose() {
                Ok(args) => args.unwrap_or(Value::Null),
                Err(e) => {
                    eprintln!("--args is not valid JSON: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            let result = app.registry().dispatch(&name, args, &identity.identity());
            let printed = print_json(&result);
            if !result.is_success() {
                warn!("Call to '{}' ended with {:?}", name, result.outcome);
                return ExitCode::FAILURE;
            }
            printed
        }
    }
}
