mod run;
mod script;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use steady_core::{Accumulator, PointerButton, Profile};
use steady_store::paths::{profiles_path, settings_path};
use steady_store::{ProfileStore, load_settings, save_settings};

#[derive(Parser)]
#[command(name = "steady", about = "Fractional pointer compensation engine")]
struct Cli {
    /// Override the data directory (default: $STEADY_DATA_DIR or ~/.steadyhand)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage saved compensation profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Show or change the persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Run the accumulator offline and print what would be emitted
    Simulate {
        /// Saved profile to simulate
        #[arg(long, conflicts_with_all = ["x", "y", "z"])]
        profile: Option<String>,

        #[command(flatten)]
        vector: VectorArgs,

        /// Number of ticks to run
        #[arg(long, default_value_t = 10)]
        ticks: u32,

        /// Hold the modifier at this reduction percentage
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        reduction: Option<u8>,
    },

    /// Start the engine and drive it with an event script on stdin
    Run {
        /// Saved profile to start with (default: the vector in settings.toml)
        #[arg(long)]
        profile: Option<String>,

        /// Tick interval in milliseconds (clamped to 1..=100)
        #[arg(long)]
        interval_ms: Option<f64>,

        /// Modifier key that applies the reduction
        #[arg(long)]
        modifier: Option<String>,

        /// Reduction percentage while the modifier is held
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        reduction: Option<u8>,

        /// Pointer button that triggers compensation
        #[arg(long, default_value = "left")]
        button: PointerButton,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// List saved profiles
    List,

    /// Print a profile as JSON
    Show { name: String },

    /// Create or replace a profile
    Save {
        name: String,

        #[command(flatten)]
        vector: VectorArgs,
    },

    /// Delete a profile
    Delete { name: String },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print settings.toml as it would be loaded
    Show,

    /// Update individual settings and write them back
    Set {
        #[command(flatten)]
        vector: VectorArgs,

        /// Tick interval in milliseconds (clamped to 1..=100)
        #[arg(long)]
        interval_ms: Option<f64>,

        /// Modifier key; an empty string disables the reduction
        #[arg(long)]
        modifier: Option<String>,

        /// Reduction percentage while the modifier is held
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        reduction: Option<u8>,

        /// Global enable switch
        #[arg(long)]
        enabled: Option<bool>,
    },
}

#[derive(clap::Args, Clone, Copy, Default)]
struct VectorArgs {
    /// Horizontal pointer units per tick
    #[arg(long, allow_hyphen_values = true)]
    x: Option<f64>,

    /// Vertical pointer units per tick
    #[arg(long, allow_hyphen_values = true)]
    y: Option<f64>,

    /// Scroll notches per tick
    #[arg(long, allow_hyphen_values = true)]
    z: Option<f64>,
}

impl VectorArgs {
    fn is_set(&self) -> bool {
        self.x.is_some() || self.y.is_some() || self.z.is_some()
    }

    fn profile(&self, name: &str) -> Profile {
        Profile::new(
            name,
            self.x.unwrap_or(0.0),
            self.y.unwrap_or(0.0),
            self.z.unwrap_or(0.0),
        )
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

fn data_dir(cli: &Cli) -> PathBuf {
    steady_store::data_dir(cli.data_dir.as_deref())
}

fn open_store(dir: &Path) -> Result<ProfileStore> {
    ProfileStore::open(&profiles_path(dir)).context("failed to open profile store")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let dir = data_dir(&cli);

    match &cli.command {
        Commands::Profile { action } => cmd_profile(&dir, action),
        Commands::Settings { action } => cmd_settings(&dir, action),
        Commands::Simulate {
            profile,
            vector,
            ticks,
            reduction,
        } => cmd_simulate(&dir, profile.as_deref(), vector, *ticks, *reduction),
        Commands::Run {
            profile,
            interval_ms,
            modifier,
            reduction,
            button,
        } => {
            cmd_run(
                &dir,
                profile.as_deref(),
                *interval_ms,
                modifier.as_deref(),
                *reduction,
                *button,
            )
            .await
        }
    }
}

fn cmd_profile(dir: &Path, action: &ProfileAction) -> Result<()> {
    let mut store = open_store(dir)?;
    match action {
        ProfileAction::List => {
            if store.is_empty() {
                println!("no profiles saved");
            }
            for (name, p) in store.iter() {
                println!("{name}: x={} y={} z={}", p.axis_x, p.axis_y, p.axis_z);
            }
        }
        ProfileAction::Show { name } => {
            let profile = store
                .get(name)
                .with_context(|| format!("no profile named '{name}'"))?;
            println!("{}", serde_json::to_string_pretty(profile)?);
        }
        ProfileAction::Save { name, vector } => {
            store
                .save(vector.profile(name))
                .with_context(|| format!("failed to save profile '{name}'"))?;
            println!("saved profile '{}'", name.trim());
        }
        ProfileAction::Delete { name } => {
            if !store.delete(name)? {
                bail!("no profile named '{name}'");
            }
            println!("deleted profile '{name}'");
        }
    }
    Ok(())
}

fn cmd_settings(dir: &Path, action: &SettingsAction) -> Result<()> {
    let path = settings_path(dir);
    let mut settings = load_settings(&path).context("failed to load settings")?;
    if let SettingsAction::Set {
        vector,
        interval_ms,
        modifier,
        reduction,
        enabled,
    } = action
    {
        if let Some(x) = vector.x {
            settings.axis_x = x;
        }
        if let Some(y) = vector.y {
            settings.axis_y = y;
        }
        if let Some(z) = vector.z {
            settings.axis_z = z;
        }
        if let Some(ms) = interval_ms {
            settings.interval_ms = *ms;
        }
        if let Some(key) = modifier {
            settings.modifier_key = key.clone();
        }
        if let Some(pct) = reduction {
            settings.reduction_percent = *pct;
        }
        if let Some(on) = enabled {
            settings.enabled = *on;
        }
        settings = settings.normalized();
        save_settings(&path, &settings)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!("settings saved to {}", path.display());
    }
    print!("{}", toml::to_string_pretty(&settings)?);
    Ok(())
}

fn cmd_simulate(
    dir: &Path,
    profile: Option<&str>,
    vector: &VectorArgs,
    ticks: u32,
    reduction: Option<u8>,
) -> Result<()> {
    let profile = match profile {
        Some(name) => {
            let store = open_store(dir)?;
            store
                .get(name)
                .cloned()
                .with_context(|| format!("no profile named '{name}'"))?
        }
        None if vector.is_set() => vector.profile(steady_core::constants::LIVE_PROFILE_NAME),
        None => load_settings(&settings_path(dir))
            .context("failed to load settings")?
            .profile(),
    };
    if !profile.is_finite() {
        bail!("profile '{}' has a non-finite axis", profile.name);
    }
    let factor = reduction.map_or(1.0, |pct| f64::from(pct) / 100.0);

    let mut acc = Accumulator::new();
    let (mut total_x, mut total_y, mut total_z) = (0i64, 0i64, 0i64);
    for k in 1..=ticks {
        let step = acc.advance(&profile, factor);
        total_x += step.dx;
        total_y += step.dy;
        total_z += step.dz;
        if step.is_empty() {
            println!("tick {k}: idle");
            continue;
        }
        if step.has_pointer() {
            println!("tick {k}: move {} {}", step.dx, step.dy);
        }
        if step.has_scroll() {
            println!("tick {k}: scroll {}", step.dz);
        }
    }
    println!("total: dx={total_x} dy={total_y} scroll={total_z}");
    Ok(())
}

async fn cmd_run(
    dir: &Path,
    profile: Option<&str>,
    interval_ms: Option<f64>,
    modifier: Option<&str>,
    reduction: Option<u8>,
    button: PointerButton,
) -> Result<()> {
    let store = open_store(dir)?;
    let mut settings = load_settings(&settings_path(dir)).context("failed to load settings")?;

    if let Some(name) = profile {
        let p = store
            .get(name)
            .with_context(|| format!("no profile named '{name}'"))?;
        settings.axis_x = p.axis_x;
        settings.axis_y = p.axis_y;
        settings.axis_z = p.axis_z;
    }
    if let Some(ms) = interval_ms {
        settings.interval_ms = ms;
    }
    if let Some(key) = modifier {
        settings.modifier_key = key.to_string();
    }
    if let Some(pct) = reduction {
        settings.reduction_percent = pct;
    }

    let stats = run::run(&store, settings.normalized(), run::RunOptions { button }).await?;
    println!(
        "stats: ticks={} pointer={} scroll={} failures={}",
        stats.ticks, stats.pointer_events, stats.scroll_events, stats.failures
    );
    Ok(())
}
