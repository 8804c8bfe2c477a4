use crate::options::OutputStyle;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sassline")]
#[command(about = "Compile Sass/SCSS files with source maps and readable errors")]
pub struct Cli {
    /// Path to config file (sassline.json or sassline.jsonc)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Source files to compile (glob patterns relative to --base) [default: **/*.{scss,sass}]
    #[arg(short, long)]
    pub src: Vec<String>,

    /// Base directory; output mirrors paths relative to it
    #[arg(short, long)]
    pub base: Option<PathBuf>,

    /// Output directory [default: dist]
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// Additional include paths for imports
    #[arg(short = 'I', long = "include-path")]
    pub include_paths: Vec<PathBuf>,

    /// CSS output style
    #[arg(long)]
    pub style: Option<OutputStyle>,

    /// Patterns to ignore
    #[arg(long)]
    pub ignore: Vec<String>,

    /// Write source maps next to the CSS
    #[arg(long)]
    pub source_maps: bool,

    /// Compile files one at a time, in order
    #[arg(long)]
    pub sync: bool,

    /// Compile partials (`_name.scss`) too
    #[arg(long)]
    pub include_partials: bool,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
