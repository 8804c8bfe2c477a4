use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use sassline::cli::{Cli, OutputFormat};
use sassline::reporter::{report_json, report_text};
use sassline::{
    compile_project, FileConfig, GrassCompiler, IncludePaths, SassConfig, SasslineError,
    DEFAULT_SOURCE_PATTERNS,
};

/// Find default config file in directory
fn find_default_config(dir: &Path) -> Option<PathBuf> {
    let json_path = dir.join("sassline.json");
    if json_path.exists() {
        return Some(json_path);
    }

    let jsonc_path = dir.join("sassline.jsonc");
    if jsonc_path.exists() {
        return Some(jsonc_path);
    }

    None
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Merge config: CLI args override file config
fn build_config(cli: &Cli, file_config: Option<FileConfig>) -> SassConfig {
    let file_config = file_config.unwrap_or_default();
    let defaults = SassConfig::default();

    let src = if !cli.src.is_empty() {
        cli.src.clone()
    } else if !file_config.src.is_empty() {
        file_config.src
    } else {
        DEFAULT_SOURCE_PATTERNS.iter().map(|s| (*s).to_string()).collect()
    };

    let ignore = if !cli.ignore.is_empty() { cli.ignore.clone() } else { file_config.ignore };

    let mut options = file_config.options.unwrap_or_default();
    if !cli.include_paths.is_empty() {
        let mut paths =
            options.include_paths.as_ref().map(IncludePaths::to_vec).unwrap_or_default();
        paths.extend(cli.include_paths.iter().cloned());
        options.include_paths = Some(IncludePaths::Many(paths));
    }
    if let Some(style) = cli.style {
        options.output_style = style;
    }

    SassConfig {
        src,
        base: cli.base.clone().or(file_config.base).unwrap_or(defaults.base),
        dest: cli.dest.clone().or(file_config.dest).unwrap_or(defaults.dest),
        ignore,
        options,
        sync: cli.sync || file_config.sync.unwrap_or(defaults.sync),
        source_maps: cli.source_maps || file_config.source_maps.unwrap_or(defaults.source_maps),
        include_partials: cli.include_partials
            || file_config.include_partials.unwrap_or(defaults.include_partials),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Load config file
    let file_config = if let Some(config_path) = &cli.config {
        // Use specified config file (error if not found)
        if !config_path.exists() {
            eprintln!("Error: Config file not found: {}", config_path.display());
            std::process::exit(1);
        }
        Some(FileConfig::load(config_path)?)
    } else {
        // Look for default config file in the current directory
        match find_default_config(Path::new(".")) {
            Some(path) => match FileConfig::load(&path) {
                Ok(cfg) => Some(cfg),
                Err(e) => {
                    tracing::warn!("failed to parse config file '{}': {}", path.display(), e);
                    None
                }
            },
            None => None,
        }
    };

    let config = build_config(&cli, file_config);
    let dest = config.dest.clone();

    match compile_project(config, Arc::new(GrassCompiler::new().with_warnings())).await {
        Ok(report) => {
            match cli.format {
                OutputFormat::Text => report_text(&report, &dest),
                OutputFormat::Json => report_json(&report),
            }

            // Exit with error code if any file failed
            if report.failed_count > 0 {
                std::process::exit(1);
            }
        }
        Err(SasslineError::NoSourceFiles(patterns)) => {
            eprintln!("Error: No source files found matching patterns: {patterns:?}");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sassline::OutputStyle;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("sassline").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults_without_config() {
        let config = build_config(&parse(&[]), None);

        assert_eq!(config.src, vec!["**/*.{scss,sass}".to_string()]);
        assert_eq!(config.dest, PathBuf::from("dist"));
        assert!(!config.sync);
        assert!(!config.source_maps);
    }

    #[test]
    fn test_cli_overrides_file_config() {
        let file_config = FileConfig {
            src: vec!["scss/*.scss".to_string()],
            dest: Some(PathBuf::from("out")),
            source_maps: Some(true),
            ..Default::default()
        };

        let cli = parse(&["--dest", "public", "--style", "compressed", "-I", "vendor"]);
        let config = build_config(&cli, Some(file_config));

        assert_eq!(config.src, vec!["scss/*.scss".to_string()]);
        assert_eq!(config.dest, PathBuf::from("public"));
        assert!(config.source_maps);
        assert_eq!(config.options.output_style, OutputStyle::Compressed);
        assert_eq!(
            config.options.include_paths,
            Some(IncludePaths::Many(vec![PathBuf::from("vendor")]))
        );
    }
}
