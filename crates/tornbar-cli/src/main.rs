mod presenter;

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tornbar_core::{
    AppState, Config, PlayerSource, Poller, PollerHandle, SettingsStore, Snapshot, TornProvider,
};
use tornbar_api::{Bar, Travel};
use tornbar_store::SqliteStore;

use crate::presenter::LogPresenter;

#[derive(Parser)]
#[command(name = "tornbar")]
#[command(version, about = "Torn status poller with desktop-style alerts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Poll in the foreground and print alerts
    Run {
        /// Poll interval in seconds (defaults to the saved setting)
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Fetch once and print the player's state
    Status,
    /// Edit saved settings
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Manage the market watchlist
    #[command(subcommand)]
    Watch(WatchCommand),
    /// Manage bar alert rules
    #[command(subcommand)]
    Rules(RulesCommand),
}

#[derive(clap::Subcommand)]
enum ConfigCommand {
    /// Save the API key
    SetKey { key: String },
    /// Save the poll interval in seconds
    SetInterval { seconds: u64 },
    /// Print the saved settings
    Show,
}

#[derive(clap::Subcommand)]
enum WatchCommand {
    /// Watch an item by id
    Add { id: u64, name: String },
    /// Stop watching an item
    Remove { id: u64 },
    /// Print watched items with their last known prices
    List,
    /// Fetch fresh prices for every watched item
    Refresh,
}

#[derive(clap::Subcommand)]
enum RulesCommand {
    /// Print all alert rules
    List,
    /// Enable or disable a rule by id
    Toggle { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { interval }) => run(&config, interval).await,
        Some(Commands::Status) => status(&config).await,
        Some(Commands::Config(command)) => configure(&config, command),
        Some(Commands::Watch(command)) => watch(&config, command).await,
        Some(Commands::Rules(command)) => rules(&config, command),
        None => {
            println!("No command specified. Try --help");
            Ok(())
        }
    }
}

fn open_settings(config: &Config) -> anyhow::Result<SettingsStore> {
    let path = config.db_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let store = SqliteStore::open(&path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    Ok(SettingsStore::new(Box::new(store)))
}

fn spawn_poller(config: &Config) -> anyhow::Result<PollerHandle> {
    let provider = Arc::new(TornProvider::from_config(&config.api)?);
    let poller = Poller::new(
        open_settings(config)?,
        provider.clone(),
        provider,
        Arc::new(LogPresenter),
    );
    Ok(poller.spawn()?)
}

async fn run(config: &Config, interval: Option<u64>) -> anyhow::Result<()> {
    let handle = spawn_poller(config)?;
    let settings = handle.settings().await?;

    if !settings.has_api_key() {
        tracing::warn!("No API key saved. Set one with `tornbar config set-key <KEY>`");
    }

    let interval = interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| settings.refresh_interval());
    handle.start(interval).await?;

    let mut updates = handle.subscribe();
    let mut last_line = String::new();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if state.is_loading {
                    continue;
                }
                let line = state.summary();
                if line != last_line {
                    tracing::info!("{}", line);
                    last_line = line;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    handle.stop().await?;
    handle.shutdown().await?;
    Ok(())
}

async fn status(config: &Config) -> anyhow::Result<()> {
    let settings = open_settings(config)?.load()?;
    let provider = TornProvider::from_config(&config.api)?;

    match provider.fetch_snapshot(&settings.api_key).await {
        Ok(snapshot) => {
            print_snapshot(&snapshot);
            Ok(())
        }
        Err(e) => anyhow::bail!(e.user_message()),
    }
}

fn print_snapshot(snapshot: &Snapshot) {
    let now = chrono::Utc::now();

    println!(
        "{} [{}]",
        snapshot.name.as_deref().unwrap_or("Unknown"),
        snapshot.player_id.unwrap_or(0)
    );

    if let Some(bars) = snapshot.bars() {
        for (label, bar) in [
            ("Energy", &bars.energy),
            ("Nerve", &bars.nerve),
            ("Happy", &bars.happy),
            ("Life", &bars.life),
        ] {
            println!("  {}", bar_line(label, bar));
        }
    }

    if let Some(cooldowns) = &snapshot.cooldowns {
        println!(
            "  Cooldowns: drug {}s, medical {}s, booster {}s",
            cooldowns.drug, cooldowns.medical, cooldowns.booster
        );
    }

    if let Some(status) = &snapshot.status {
        if !status.is_okay() {
            println!(
                "  Status: {} ({}s left)",
                status.description.as_deref().unwrap_or("Unavailable"),
                status.time_remaining(now)
            );
        }
    }

    if let Some(line) = snapshot.travel.as_ref().and_then(|t| travel_line(t, now)) {
        println!("  {}", line);
    }

    if let Some(chain) = &snapshot.chain {
        if chain.is_active() {
            println!(
                "  Chain: {} hits, {}s to timeout",
                chain.current.unwrap_or(0),
                chain.timeout_remaining(now)
            );
        }
    }

    let money = &snapshot.money;
    println!(
        "  Cash ${}  Vault ${}  Points {}",
        money.cash, money.vault, money.points
    );

    let unread = snapshot.unread_messages();
    if unread > 0 {
        println!("  {} unread message(s)", unread);
    }

    for event in snapshot.recent_events().into_iter().take(5) {
        println!("  - {}", event.clean_text());
    }
}

fn bar_line(label: &str, bar: &Bar) -> String {
    let line = format!(
        "{:<8}{:>6}/{:<6} {:>5.1}%",
        label,
        bar.current,
        bar.maximum,
        bar.percentage()
    );
    if bar.is_full() {
        format!("{} full", line)
    } else {
        line
    }
}

fn travel_line(travel: &Travel, now: chrono::DateTime<chrono::Utc>) -> Option<String> {
    let destination = travel.destination.as_deref().unwrap_or("?");

    if travel.is_traveling() {
        let remaining = travel.remaining_seconds(now);
        Some(match travel.arrival() {
            Some(at) => format!(
                "Traveling to {}, lands at {} UTC ({}s)",
                destination,
                at.format("%H:%M:%S"),
                remaining
            ),
            None => format!("Traveling to {}, lands in {}s", destination, remaining),
        })
    } else if travel.is_abroad() {
        Some(format!("Abroad in {}", destination))
    } else {
        None
    }
}

fn configure(config: &Config, command: ConfigCommand) -> anyhow::Result<()> {
    let store = open_settings(config)?;
    let mut settings = store.load()?;

    match command {
        ConfigCommand::SetKey { key } => {
            settings.api_key = key.trim().to_string();
            store.save(&settings)?;
            println!("API key saved");
        }
        ConfigCommand::SetInterval { seconds } => {
            anyhow::ensure!(seconds > 0, "Interval must be at least one second");
            settings.refresh_interval = seconds;
            store.save(&settings)?;
            println!("Refresh interval set to {}s", seconds);
        }
        ConfigCommand::Show => {
            let key = if settings.has_api_key() {
                format!("set ({} chars)", settings.api_key.len())
            } else {
                "not set".to_string()
            };
            println!("API key:          {}", key);
            println!("Refresh interval: {}s", settings.refresh_interval);
            println!("Alerts:           {:?}", settings.alerts);
            println!("Database:         {}", config.db_path()?.display());
        }
    }

    Ok(())
}

async fn watch(config: &Config, command: WatchCommand) -> anyhow::Result<()> {
    match command {
        WatchCommand::Add { id, name } => {
            let handle = spawn_poller(config)?;

            if !handle.add_watch(id, name.clone()).await? {
                println!("{} is already on the watchlist", id);
            } else if handle.settings().await?.has_api_key() {
                // Wait for the first price so the user sees something useful
                let mut updates = handle.subscribe();
                let wait = config.api.timeout() * 2;
                let priced = tokio::time::timeout(wait, updates.wait_for(|s| !is_loading(s, id)))
                    .await
                    .ok()
                    .and_then(|r| r.ok().map(|state| state.clone()));
                match priced {
                    Some(state) => print_items(&state.watchlist),
                    None => println!("Added {} ({}); price not available yet", name, id),
                }
            } else {
                println!("Added {} ({}); prices load once an API key is set", name, id);
            }

            handle.shutdown().await?;
        }
        WatchCommand::Remove { id } => {
            let handle = spawn_poller(config)?;
            if handle.remove_watch(id).await? {
                println!("Removed {}", id);
            } else {
                println!("{} is not on the watchlist", id);
            }
            handle.shutdown().await?;
        }
        WatchCommand::Refresh => {
            let handle = spawn_poller(config)?;
            let settings = handle.settings().await?;
            let ids: Vec<u64> = handle.state().watchlist.iter().map(|item| item.id).collect();

            anyhow::ensure!(settings.has_api_key(), "No API key saved");
            if ids.is_empty() {
                println!("Watchlist is empty");
            } else {
                let mut updates = handle.subscribe();
                // Mark the current prices as seen so only fresh quotes count
                let started = chrono::Utc::now();
                updates.borrow_and_update();
                handle.refresh_prices().await?;

                let wait = config.api.timeout() * 2;
                let refreshed = tokio::time::timeout(
                    wait,
                    updates.wait_for(|s| all_refreshed_since(s, started)),
                )
                .await
                .ok()
                .and_then(|r| r.ok().map(|state| state.clone()));

                match refreshed {
                    Some(state) => print_items(&state.watchlist),
                    None => {
                        println!("Some prices did not refresh in time");
                        print_items(&handle.state().watchlist);
                    }
                }
            }

            handle.shutdown().await?;
        }
        WatchCommand::List => {
            let items = open_settings(config)?.load_watchlist()?;
            if items.is_empty() {
                println!("Watchlist is empty");
            } else {
                print_items(&items);
            }
        }
    }

    Ok(())
}

fn is_loading(state: &AppState, id: u64) -> bool {
    state
        .watchlist
        .iter()
        .find(|item| item.id == id)
        .map(|item| item.is_loading())
        .unwrap_or(false)
}

fn all_refreshed_since(state: &AppState, since: chrono::DateTime<chrono::Utc>) -> bool {
    state
        .watchlist
        .iter()
        .all(|item| item.last_updated.map(|at| at >= since).unwrap_or(false))
}

fn print_items(items: &[tornbar_core::WatchlistItem]) {
    for item in items {
        let price = match (&item.error, item.is_loading()) {
            (Some(error), _) => error.clone(),
            (None, true) => "loading".to_string(),
            (None, false) => format!(
                "${} x{} (next ${}, +${})",
                item.lowest_price,
                item.lowest_price_quantity,
                item.second_lowest_price,
                item.price_difference()
            ),
        };
        println!("{:>8}  {:<30} {}", item.id, item.name, price);
    }
}

fn rules(config: &Config, command: RulesCommand) -> anyhow::Result<()> {
    let store = open_settings(config)?;
    let settings = store.load()?;

    match command {
        RulesCommand::List => {
            for rule in &settings.rules {
                println!(
                    "{:<38} {:<7} {:>3}%  {:<4} {}",
                    rule.id,
                    rule.bar.to_string(),
                    rule.threshold,
                    if rule.enabled { "on" } else { "off" },
                    rule.sound
                );
            }
        }
        RulesCommand::Toggle { id } => {
            let mut rule = settings
                .rules
                .iter()
                .find(|r| r.id == id)
                .cloned()
                .with_context(|| format!("No rule with id {}", id))?;

            rule.enabled = !rule.enabled;
            store.update_rule(&rule)?;
            println!("{} is now {}", id, if rule.enabled { "on" } else { "off" });
        }
    }

    Ok(())
}
