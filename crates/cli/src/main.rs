//! upnext CLI - walk-in service rotation for the sales floor

mod logging;
mod rep_ref;
mod render;
mod settings;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use upnext_core::application::{shutdown_channel, views, CommandOutcome, RotationService};
use upnext_core::domain::RepId;
use upnext_core::port::{InMemorySnapshotStore, SnapshotStore, SystemTimeProvider, TimeProvider};
use upnext_infra_sqlite::{create_pool, run_migrations, SqliteSnapshotStore};

use settings::{Settings, StoreBackend};

#[derive(Parser)]
#[command(name = "upnext")]
#[command(about = "Walk-in service rotation: who takes the next customer", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.upnext/config.toml)
    #[arg(long, global = true, env = "UPNEXT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the roster and start a fresh day
    Setup {
        /// Rep names, in roster order
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Add a rep to the roster
    AddRep { name: String },

    /// Remove a rep from the roster and every queue
    RemoveRep {
        /// Rep id or name
        rep: String,

        /// Confirm the removal
        #[arg(long)]
        yes: bool,
    },

    /// Join the back of the rotation
    CheckIn { rep: String },

    /// Leave the rotation
    CheckOut { rep: String },

    /// The rep who is up takes the next customer
    Take { rep: String },

    /// Mark a rep as helping a customer out of turn
    WithCustomer { rep: String },

    /// Done with the customer, back to the end of the rotation
    Finished { rep: String },

    /// Toggle stepped away / returned
    StepAway { rep: String },

    /// End the day: empty the rotation and history, keep the roster
    ClearDay {
        #[arg(long)]
        yes: bool,
    },

    /// Erase everything, including the roster
    Reset {
        #[arg(long)]
        yes: bool,
    },

    /// Show every rep with status
    Roster,

    /// Show the active queue
    Queue,

    /// Customer interaction counts, ranked
    Stats,

    /// Recent activity, newest first
    History {
        /// Number of entries (default: history_limit setting)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Follow the queue live until Ctrl+C
    Watch,
}

struct App {
    service: RotationService,
    settings: Settings,
    sqlite: Option<Arc<SqliteSnapshotStore>>,
}

async fn build_app(settings: Settings) -> Result<App> {
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);

    let (store, sqlite): (Arc<dyn SnapshotStore>, _) = match settings.store {
        StoreBackend::Memory => {
            debug!("Using in-memory snapshot store");
            (
                Arc::new(InMemorySnapshotStore::new()) as Arc<dyn SnapshotStore>,
                None,
            )
        }
        StoreBackend::Sqlite => {
            let parent = settings
                .database_file()
                .and_then(|file| file.parent().map(PathBuf::from));
            if let Some(parent) = parent {
                std::fs::create_dir_all(&parent)
                    .with_context(|| format!("Cannot create {}", parent.display()))?;
            }

            let url = settings.resolved_database_url();
            debug!(database_url = %url, "Opening SQLite snapshot store");
            let pool = create_pool(&url).await.context("DB pool creation failed")?;
            run_migrations(&pool).await.context("Migration failed")?;

            let store = Arc::new(
                SqliteSnapshotStore::open(pool, time_provider.clone())
                    .await
                    .context("Cannot read snapshot store")?,
            );
            (store.clone() as Arc<dyn SnapshotStore>, Some(store))
        }
    };

    let service = RotationService::new(store, time_provider, settings.sync_config());
    Ok(App {
        service,
        settings,
        sqlite,
    })
}

impl App {
    async fn rep(&self, input: &str) -> Result<RepId> {
        let snapshot = self.service.current_snapshot().await?;
        rep_ref::resolve_rep(&snapshot, input)
    }

    async fn watch(&self) -> Result<()> {
        let (shutdown_tx, shutdown) = shutdown_channel();
        let poller = self.sqlite.clone().map(|store| {
            store.spawn_change_poller(
                Duration::from_millis(self.settings.poll_interval_ms),
                shutdown,
            )
        });

        let observer = self.service.observe(|snapshot| {
            println!();
            println!(
                "{} {}",
                "Queue".cyan().bold(),
                format!("(v{})", snapshot.version).dimmed()
            );
            render::print_queue(&views::active_queue_view(&snapshot));
        });

        println!("{}", "Watching for changes, Ctrl+C to stop".dimmed());
        tokio::signal::ctrl_c().await?;

        info!("Stopping watch");
        observer.unsubscribe();
        shutdown_tx.shutdown();
        if let Some(poller) = poller {
            let _ = tokio::time::timeout(Duration::from_secs(5), poller).await;
        }
        Ok(())
    }
}

fn require_confirmation(yes: bool, what: &str) -> Result<()> {
    if !yes {
        bail!("{} is destructive; re-run with --yes to confirm", what);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())?;
    logging::init_logging(settings.log_format)?;

    let app = build_app(settings).await?;
    let service = &app.service;

    let (name, outcome): (&str, CommandOutcome) = match cli.command {
        Commands::Setup { names } => ("setup", service.complete_setup(names).await?),
        Commands::AddRep { name } => ("add-rep", service.add_rep(name).await?),
        Commands::RemoveRep { rep, yes } => {
            require_confirmation(yes, "Removing a rep")?;
            ("remove-rep", service.remove_rep(app.rep(&rep).await?).await?)
        }
        Commands::CheckIn { rep } => ("check-in", service.check_in(app.rep(&rep).await?).await?),
        Commands::CheckOut { rep } => {
            ("check-out", service.check_out(app.rep(&rep).await?).await?)
        }
        Commands::Take { rep } => ("take", service.take_customer(app.rep(&rep).await?).await?),
        Commands::WithCustomer { rep } => (
            "with-customer",
            service.mark_with_customer(app.rep(&rep).await?).await?,
        ),
        Commands::Finished { rep } => (
            "finished",
            service.finished_with_customer(app.rep(&rep).await?).await?,
        ),
        Commands::StepAway { rep } => (
            "step-away",
            service.toggle_step_away(app.rep(&rep).await?).await?,
        ),
        Commands::ClearDay { yes } => {
            require_confirmation(yes, "Clearing the day")?;
            ("clear-day", service.clear_day().await?)
        }
        Commands::Reset { yes } => {
            require_confirmation(yes, "A full reset")?;
            ("reset", service.full_reset().await?)
        }
        Commands::Roster => {
            render::print_roster(&service.roster_view().await?);
            return Ok(());
        }
        Commands::Queue => {
            render::print_queue(&service.active_queue_view().await?);
            return Ok(());
        }
        Commands::Stats => {
            render::print_stats(&service.stats_view().await?);
            return Ok(());
        }
        Commands::History { limit } => {
            let history = match limit {
                Some(limit) => {
                    views::history_view(&service.current_snapshot().await?, limit)
                }
                None => service.history_view().await?,
            };
            render::print_history(&history);
            return Ok(());
        }
        Commands::Watch => return app.watch().await,
    };

    render::print_outcome(name, &outcome);
    Ok(())
}
