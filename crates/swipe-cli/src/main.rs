mod config;
mod engine;
mod media;
mod server;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use swipe_core::{
    Clock, Exclusions, InteractionMetrics, InteractionType, SystemClock, display_name,
    select_batch,
};
use swipe_store::{CatalogFile, CatalogSource, PreferenceStore};

use crate::config::Config;
use crate::engine::{Engine, EngineSettings};
use crate::media::HttpMediaLookup;
use crate::server::{AppState, Limits};

#[derive(Parser)]
#[command(name = "swipe", about = "Character selection server and tools")]
struct Cli {
    /// Config file (default: <data_dir>/swipe.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },

    /// Draw characters from the catalog without resolving media
    Pick {
        /// Personalize with this user's affinities
        #[arg(long)]
        user: Option<String>,

        /// Tags to skip (repeatable or comma-separated)
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,

        #[arg(long, default_value_t = 1)]
        count: usize,

        /// Seed for a reproducible draw
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Record a swipe interaction
    Interact {
        user: String,
        tag: String,
        /// smash, pass, or favorite
        interaction: String,

        /// View time in milliseconds
        #[arg(long)]
        view_time: Option<f64>,

        #[arg(long)]
        device: Option<String>,
    },

    /// Print a user's per-tag affinity scores
    Prefs { user: String },

    /// Show catalog and preference statistics
    Stats,
}

struct Paths {
    data_dir: PathBuf,
    config: Config,
}

impl Paths {
    fn resolve(cli: &Cli) -> Result<Self> {
        let data_dir = config::data_dir();
        let config = Config::load(cli.config.as_deref(), &data_dir)?;
        Ok(Self { data_dir, config })
    }

    fn catalog(&self) -> CatalogFile {
        CatalogFile::new(self.config.catalog_path(&self.data_dir))
    }

    fn open_store(&self) -> Result<PreferenceStore> {
        let path = self.config.db_path(&self.data_dir);
        PreferenceStore::open(&path)
            .with_context(|| format!("failed to open preference store {}", path.display()))
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let paths = Paths::resolve(&cli)?;

    match &cli.command {
        Commands::Serve { bind } => cmd_serve(&paths, bind.as_deref()).await,
        Commands::Pick {
            user,
            exclude,
            count,
            seed,
        } => cmd_pick(&paths, user.as_deref(), exclude, *count, *seed),
        Commands::Interact {
            user,
            tag,
            interaction,
            view_time,
            device,
        } => cmd_interact(&paths, user, tag, interaction, *view_time, device.clone()),
        Commands::Prefs { user } => cmd_prefs(&paths, user),
        Commands::Stats => cmd_stats(&paths),
    }
}

async fn cmd_serve(paths: &Paths, bind: Option<&str>) -> Result<()> {
    let config = &paths.config;
    let catalog = paths.catalog();
    tracing::info!("catalog source: {}", catalog.describe());

    let media = HttpMediaLookup::new(&config.media).context("failed to build media client")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = Arc::new(Engine::new(
        EngineSettings::from(config),
        Arc::new(catalog),
        paths.open_store()?,
        Arc::new(media),
        Arc::clone(&clock),
    ));

    // Warm the cache; requests keep retrying the load while it stays empty.
    if engine.refresh_catalog(clock.now_millis()).await.is_none() {
        tracing::warn!("starting without a character catalog");
    }
    let (rows, users) = engine.preference_counts().await?;
    tracing::info!(rows, users, "preference store ready");

    let state = AppState {
        engine,
        limits: Limits::from(config),
    };
    let app = server::router(state, &config.cors_origins);

    let addr = bind.unwrap_or(&config.bind);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on {}", listener.local_addr()?);
    eprintln!("swipe listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

fn cmd_pick(
    paths: &Paths,
    user: Option<&str>,
    exclude: &[String],
    count: usize,
    seed: Option<u64>,
) -> Result<()> {
    let catalog = paths.catalog();
    let entities = catalog
        .load_catalog()
        .with_context(|| format!("failed to load catalog {}", catalog.describe()))?;
    if entities.is_empty() {
        bail!("catalog {} is empty", catalog.describe());
    }

    let affinity = match user {
        Some(user) => Some(
            paths
                .open_store()?
                .affinity_map(user)
                .context("failed to load affinities")?,
        ),
        None => None,
    };

    let exclusions = Exclusions::new().with_excluded(exclude.iter().cloned());
    let mut rng = match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    };
    let picks = select_batch(&entities, affinity.as_ref(), &exclusions, count, &mut rng);
    if picks.is_empty() {
        bail!("no characters available based on current exclusions");
    }

    for pick in picks {
        println!(
            "{}\t{}\t{}",
            pick.entity.name,
            display_name(&pick.entity.name),
            pick.tier.as_str()
        );
    }
    Ok(())
}

fn cmd_interact(
    paths: &Paths,
    user: &str,
    tag: &str,
    interaction: &str,
    view_time: Option<f64>,
    device: Option<String>,
) -> Result<()> {
    let interaction: InteractionType = interaction.parse()?;
    let metrics = InteractionMetrics {
        view_time_ms: view_time,
        device_type: device,
        ..Default::default()
    };
    metrics.validate()?;

    let mut store = paths.open_store()?;
    let pref = store
        .record_interaction(user, tag, interaction, &metrics, &SystemClock.now_iso8601())
        .context("failed to record interaction")?;

    println!(
        "{} {} {} → affinity {} (smash={}, pass={}, favorite={})",
        user,
        interaction,
        pref.tag,
        pref.affinity_score,
        pref.smash_count,
        pref.pass_count,
        pref.favorite_count
    );
    Ok(())
}

fn cmd_prefs(paths: &Paths, user: &str) -> Result<()> {
    let store = paths.open_store()?;
    let prefs = store
        .preferences_for_user(user)
        .context("failed to load preferences")?;

    if prefs.is_empty() {
        println!("(no preferences for {user})");
        return Ok(());
    }
    for pref in prefs {
        println!(
            "{:>5}  {}  ({} interactions)",
            pref.affinity_score, pref.tag, pref.interaction_count
        );
    }
    Ok(())
}

fn cmd_stats(paths: &Paths) -> Result<()> {
    let catalog = paths.catalog();
    let catalog_size = match catalog.load_catalog() {
        Ok(entities) => entities.len().to_string(),
        Err(e) => {
            tracing::warn!("catalog unavailable: {e}");
            "unavailable".to_string()
        }
    };
    let store = paths.open_store()?;

    println!("catalog:      {}", catalog.describe());
    println!("characters:   {catalog_size}");
    println!("preferences:  {}", store.count_preferences()?);
    println!("users:        {}", store.count_users()?);
    println!("db:           {}", db_display(&paths.config.db_path(&paths.data_dir)));
    Ok(())
}

fn db_display(path: &Path) -> String {
    match std::fs::metadata(path) {
        Ok(meta) => format!("{} ({:.1}KB)", path.display(), meta.len() as f64 / 1024.0),
        Err(_) => path.display().to_string(),
    }
}
