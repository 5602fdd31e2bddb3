use clap::Parser;
use std::path::PathBuf;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Settings file (created with --write-config)
    #[arg(short, long, default_value = AppConfig::DEFAULT_PATH)]
    pub config: PathBuf,

    /// Working directory for the image folders (overrides the settings file)
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,

    /// Print the avatar vectors of a measurements file as JSON and exit
    #[arg(long)]
    pub avatars: Option<PathBuf>,

    /// Write the effective settings to the config path and exit
    #[arg(long, default_value_t = false)]
    pub write_config: bool,
}
