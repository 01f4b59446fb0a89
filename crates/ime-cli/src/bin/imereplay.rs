use std::path::PathBuf;

use clap::{Parser, Subcommand};

use ime_cli::commands::{config_ops, replay_ops};

#[derive(Parser)]
#[command(name = "imereplay", about = "Replay input-connection scripts against the bridge")]
struct Cli {
    /// Settings TOML to use instead of the built-in defaults
    #[arg(long, global = true)]
    settings: Option<String>,
    /// Write a JSON-lines trace into this directory (needs the `trace` feature)
    #[arg(long, global = true)]
    trace_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a JSON replay script
    Run {
        /// Path to the script file
        script_file: String,
        /// Output as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Settings file helpers
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the default settings TOML
    Export,
    /// Check a settings TOML file
    Validate {
        /// Settings file
        file: String,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Some(dir) = &cli.trace_dir {
        ime_bridge::init_tracing(dir);
    }

    match cli.command {
        Command::Run { script_file, json } => {
            replay_ops::load_settings(cli.settings.as_deref());
            replay_ops::run(&script_file, json);
        }
        Command::Settings { action } => match action {
            SettingsAction::Export => config_ops::settings_export(),
            SettingsAction::Validate { file } => config_ops::settings_validate(&file),
        },
    }
}
