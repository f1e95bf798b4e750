pub mod commands;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use playlen_core::mirror::MirrorSet;
use playlen_core::playlist::{PlaylistCalculator, PlaylistError, PlaylistReport};
use playlen_core::{load_playlen_config, PlaylenConfig, ReqwestTransport};
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub use commands::{extract_playlist_id, LengthArgs};

pub const DEFAULT_CONFIG_PATH: &str = "configs/playlen.toml";

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] playlen_core::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("http client error: {0}")]
    Http(String),
    #[error("{0}")]
    Playlist(#[from] PlaylistError),
    #[error("no playlist id found in {0:?}")]
    InvalidInput(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Playlist length calculator backed by public video mirrors", long_about = None)]
pub struct Cli {
    /// Path to playlen.toml (defaults apply when configs/playlen.toml is absent)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Computes the total length of a playlist
    Length(LengthArgs),
    /// Lists the live mirrors, fastest first
    Mirrors,
    /// Prints a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = &cli.command {
        let mut command = Cli::command();
        clap_complete::generate(*shell, &mut command, "playlenctl", &mut std::io::stdout());
        return Ok(());
    }
    init_tracing(&cli.log_level);
    let config = load_config(cli.config.as_deref())?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(execute(&cli, &config))
}

async fn execute(cli: &Cli, config: &PlaylenConfig) -> Result<()> {
    match &cli.command {
        Commands::Length(args) => {
            let playlist_id = extract_playlist_id(&args.link)
                .ok_or_else(|| AppError::InvalidInput(args.link.clone()))?;
            let calculator = bootstrap(config).await?;
            let report = calculator.calculate(&playlist_id, args.workers).await?;
            render(&report, cli.format)
        }
        Commands::Mirrors => {
            let calculator = bootstrap(config).await?;
            let mirrors: &MirrorSet = calculator.mirrors()?;
            render(mirrors, cli.format)
        }
        Commands::Completions { .. } => Ok(()),
    }
}

async fn bootstrap(config: &PlaylenConfig) -> Result<PlaylistCalculator> {
    let transport = ReqwestTransport::from_config(&config.http, &config.probe)
        .map_err(|err| AppError::Http(err.to_string()))?;
    Ok(PlaylistCalculator::bootstrap(Arc::new(transport), config).await)
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Loads the configuration. Without an explicit path, a missing default file
/// means built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<PlaylenConfig> {
    match path {
        Some(path) => Ok(load_playlen_config(path)?),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Ok(load_playlen_config(DEFAULT_CONFIG_PATH)?)
        }
        None => Ok(PlaylenConfig::default()),
    }
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback + ?Sized,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

impl DisplayFallback for PlaylistReport {
    fn display(&self) -> String {
        let counted = self.items.len();
        let mut lines = vec![format!(
            "Total length of playlist {} is {} ({} items, {} unavailable)",
            self.playlist_id,
            self.totals.breakdown(),
            counted,
            self.unavailable
        )];
        lines.push("At higher speeds:".to_string());
        for total in &self.totals.per_speed {
            lines.push(format!("  {:>4}x  {}", total.speed, total.breakdown()));
        }
        if !self.items.is_empty() {
            lines.push("Items:".to_string());
            for item in &self.items {
                let breakdown =
                    playlen_core::DurationBreakdown::from_seconds(item.duration_seconds);
                lines.push(format!("  {} is {}", item.title, breakdown));
            }
        }
        lines.join("\n")
    }
}

impl DisplayFallback for MirrorSet {
    fn display(&self) -> String {
        let mut lines = vec![format!(
            "Mirrors measured at {}",
            self.discovered_at.to_rfc3339()
        )];
        for (label, mirrors) in [("API-capable", &self.api_capable), ("Plain", &self.plain)] {
            lines.push(format!("{label} ({}):", mirrors.len()));
            if mirrors.is_empty() {
                lines.push("  none reachable".to_string());
            }
            for mirror in mirrors {
                lines.push(format!(
                    "  {:>7.1} ms  {}",
                    mirror.latency_ms(),
                    mirror.base_url
                ));
            }
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use playlen_core::mirror::LiveMirror;
    use playlen_core::playlist::aggregate;
    use playlen_core::ItemMetadata;

    use super::*;

    fn sample_report() -> PlaylistReport {
        let fetched = vec![
            Some(ItemMetadata {
                id: "a".into(),
                title: "Lecture 1".into(),
                duration_seconds: 3600,
            }),
            Some(ItemMetadata {
                id: "b".into(),
                title: "Lecture 2".into(),
                duration_seconds: 1800,
            }),
            None,
        ];
        PlaylistReport {
            playlist_id: "PL1".into(),
            totals: aggregate(&fetched),
            items: fetched.into_iter().flatten().collect(),
            unavailable: 1,
        }
    }

    #[test]
    fn report_text_lists_totals_speeds_and_items() {
        let text = sample_report().display();
        assert!(text.starts_with(
            "Total length of playlist PL1 is 1 hour 30 minutes 0 seconds (2 items, 1 unavailable)"
        ));
        assert!(text.contains("   2x  0 hours 45 minutes 0 seconds"));
        assert!(text.contains("  Lecture 1 is 1 hour 0 minutes 0 seconds"));
    }

    #[test]
    fn report_json_carries_unavailable_count() {
        let json = serde_json::to_value(sample_report()).unwrap();
        assert_eq!(json["unavailable"], 1);
        assert_eq!(json["totals"]["base_seconds"], 5400);
        assert_eq!(json["items"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn mirror_listing_marks_empty_subsets() {
        let set = MirrorSet::new(vec![LiveMirror::new("https://a.example", 0.0425)], vec![]);
        let text = set.display();
        assert!(text.contains("API-capable (0):\n  none reachable"));
        assert!(text.contains("42.5 ms  https://a.example"));
    }

    #[test]
    fn explicit_config_path_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[fetch]\nconcurrency = 3").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.fetch.concurrency, 3);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/playlen.toml"))).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn parses_length_command() {
        let cli = Cli::try_parse_from([
            "playlenctl",
            "--format",
            "json",
            "length",
            "https://www.youtube.com/playlist?list=PL1",
            "--workers",
            "4",
        ])
        .unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
        match cli.command {
            Commands::Length(args) => {
                assert_eq!(args.workers, Some(4));
                assert_eq!(extract_playlist_id(&args.link).as_deref(), Some("PL1"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn completions_are_generated_without_network() {
        let cli = Cli::try_parse_from(["playlenctl", "completions", "bash"]).unwrap();
        assert!(run(cli).is_ok());
    }

    #[test]
    fn playlist_errors_render_distinct_messages() {
        let directory = AppError::from(PlaylistError::DirectoryUnavailable("status 503".into()));
        let resolution = AppError::from(PlaylistError::NoUsableMirror {
            playlist_id: "PL1".into(),
            attempts: 3,
        });
        assert_eq!(
            directory.to_string(),
            "mirror directory unavailable: status 503"
        );
        assert_eq!(
            resolution.to_string(),
            "no usable mirror for playlist PL1 (3 mirrors tried)"
        );
    }
}
