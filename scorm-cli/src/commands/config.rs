use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::{ConfigLoader, ScormConfig};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (merged)
    Show,
    /// Show configuration file paths
    Path,
}

pub fn run(args: ConfigArgs, config: &ScormConfig) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(config),
        ConfigCommands::Path => show_paths(),
    }
}

fn show_config(config: &ScormConfig) -> Result<()> {
    // Tokens are credentials; print only who they belong to
    let mut shown = config.clone();
    shown.auth.tokens = std::mem::take(&mut shown.auth.tokens)
        .into_values()
        .enumerate()
        .map(|(i, user)| (format!("hidden-{}", i + 1), user))
        .collect();

    println!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}

fn show_paths() -> Result<()> {
    println!("User config:    {:?}", ConfigLoader::user_config_path());
    println!("Project config: {:?}", ConfigLoader::project_config_path());
    Ok(())
}
