use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use spotify_to_sqlite::config::{AppConfig, CliConfig, FileConfig};
use spotify_to_sqlite::enrichment::{enrich_export, enrich_table};
use spotify_to_sqlite::{
    ConvertOptions, ExportArchive, ExportConverter, ExportDatabase, SpotifyClient,
};

mod cli_style;
use cli_style::get_styles;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

/// Save data from a Spotify personal data export to a SQLite database.
#[derive(Parser, Debug)]
#[command(styles = get_styles(), version = VERSION)]
struct CliArgs {
    /// Optional TOML configuration file.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Spotify API client id (falls back to SPOTIPY_CLIENT_ID).
    #[clap(long, global = true)]
    pub client_id: Option<String>,

    /// Spotify API client secret (falls back to SPOTIPY_CLIENT_SECRET).
    #[clap(long, global = true)]
    pub client_secret: Option<String>,

    /// Hide progress bars.
    #[clap(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Converts an export archive into a SQLite database.
    Convert {
        /// Path to the zipped export.
        #[clap(value_parser = parse_path, default_value = "my_spotify_data.zip")]
        export_zip: PathBuf,

        /// Path of the SQLite database to write.
        #[clap(value_parser = parse_path, default_value = "spotify.db")]
        db_path: PathBuf,

        /// Delete the database before converting.
        #[clap(long)]
        recreate: bool,

        /// Fetch track metadata and audio features from the Spotify API afterwards.
        #[clap(long)]
        audio_features: bool,

        /// Re-ingest archive entries that were ingested before. Tables without a
        /// natural or content key receive their rows again.
        #[clap(long)]
        force: bool,
    },

    /// Adds audio features for the track URIs of an existing table.
    Enrich {
        /// Path of an existing SQLite database.
        #[clap(value_parser = parse_path)]
        db_path: PathBuf,

        /// Table holding the track URIs.
        table: String,

        /// Column of `table` holding the track URIs.
        #[clap(long, default_value = "uri")]
        uri_column: String,

        /// Destination table, `<table>_audio_features` by default.
        #[clap(long)]
        dest: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        client_id: cli_args.client_id.clone(),
        client_secret: cli_args.client_secret.clone(),
    };
    let app_config = AppConfig::resolve(&cli_config, file_config)?;
    let show_progress = !cli_args.quiet;

    match cli_args.command {
        Command::Convert {
            export_zip,
            db_path,
            recreate,
            audio_features,
            force,
        } => {
            let mut archive = ExportArchive::open(&export_zip)?;
            let client = if audio_features {
                Some(SpotifyClient::new(&app_config.spotify)?)
            } else {
                None
            };
            let mut db = ExportDatabase::open(&db_path, recreate)?;

            info!("Converting {:?} into {:?}", export_zip, db_path);
            let report = ExportConverter::new(
                &mut db,
                ConvertOptions {
                    force,
                    show_progress,
                },
            )
            .convert(&mut archive)?;
            report.log_summary();

            if let Some(client) = client {
                let enrichment =
                    enrich_export(&mut db, &client, &app_config.enrichment, show_progress)?;
                if enrichment.view_built {
                    info!("Built {}", app_config.enrichment.view_name);
                }
            }
        }
        Command::Enrich {
            db_path,
            table,
            uri_column,
            dest,
        } => {
            if !db_path.exists() {
                bail!("Database {:?} does not exist", db_path);
            }
            let client = SpotifyClient::new(&app_config.spotify)?;
            let mut db = ExportDatabase::open(&db_path, false)?;
            if !db.table_exists(&table)? {
                warn!("Table {} does not exist in {:?}", table, db_path);
            }
            enrich_table(
                &mut db,
                &client,
                &table,
                &uri_column,
                dest.as_deref(),
                show_progress,
            )?;
        }
    }

    Ok(())
}
