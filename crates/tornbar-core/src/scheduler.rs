// Poll scheduler - a single task owns the app state; fetches report back to it
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use tornbar_api::{MarketQuote, Snapshot, TornError};

use crate::diff::diff;
use crate::notify::{Dispatcher, NotificationPresenter};
use crate::rules::NotificationRule;
use crate::settings::{Settings, SettingsStore};
use crate::source::{MarketSource, PlayerSource, PriceError};
use crate::state::AppState;
use crate::watchlist::Watchlist;
use crate::{Error, Result};

const COMMAND_BUFFER: usize = 32;
const MISSING_KEY_MESSAGE: &str = "API Key required";

enum Command {
    Start(Duration),
    Stop,
    RefreshNow,
    RefreshPrices,
    Settings(oneshot::Sender<Settings>),
    SaveSettings(Settings, oneshot::Sender<Result<()>>),
    UpdateRule(NotificationRule, oneshot::Sender<Result<bool>>),
    AddWatch {
        id: u64,
        name: String,
        reply: oneshot::Sender<bool>,
    },
    RemoveWatch {
        id: u64,
        reply: oneshot::Sender<bool>,
    },
    Shutdown(oneshot::Sender<()>),
}

enum FetchResult {
    Snapshot {
        /// Generation of the schedule that started it; `None` for manual refreshes
        schedule: Option<u64>,
        result: std::result::Result<Snapshot, TornError>,
    },
    Price {
        id: u64,
        result: std::result::Result<MarketQuote, PriceError>,
    },
}

/// Everything the poll loop needs, before it is started
pub struct Poller {
    store: SettingsStore,
    player: Arc<dyn PlayerSource>,
    market: Arc<dyn MarketSource>,
    dispatcher: Dispatcher,
}

impl Poller {
    pub fn new(
        store: SettingsStore,
        player: Arc<dyn PlayerSource>,
        market: Arc<dyn MarketSource>,
        presenter: Arc<dyn NotificationPresenter>,
    ) -> Self {
        Self {
            store,
            player,
            market,
            dispatcher: Dispatcher::new(presenter),
        }
    }

    /// Load persisted settings and spawn the actor task
    ///
    /// Must be called from inside a tokio runtime. Nothing is fetched until
    /// [`PollerHandle::start`] or [`PollerHandle::refresh_now`].
    pub fn spawn(self) -> Result<PollerHandle> {
        let settings = self.store.load()?;
        let watchlist = Watchlist::from_items(self.store.load_watchlist()?);

        let state = AppState {
            watchlist: watchlist.items().to_vec(),
            ..Default::default()
        };
        let (state_tx, state_rx) = watch::channel(state.clone());
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (result_tx, result_rx) = mpsc::unbounded_channel();

        let actor = PollActor {
            store: self.store,
            player: self.player,
            market: self.market,
            dispatcher: self.dispatcher,
            settings,
            watchlist,
            state,
            state_tx,
            cmd_rx,
            result_tx,
            result_rx,
            ticker: None,
            schedule: 0,
            scheduled_in_flight: false,
            in_flight: 0,
        };

        tokio::spawn(actor.run());

        Ok(PollerHandle { cmd_tx, state_rx })
    }
}

/// Cheap, cloneable control surface for a running poller
#[derive(Clone)]
pub struct PollerHandle {
    cmd_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<AppState>,
}

impl PollerHandle {
    /// Fetch now, then every `interval`. Calling again restarts the phase.
    pub async fn start(&self, interval: Duration) -> Result<()> {
        self.send(Command::Start(interval)).await
    }

    /// Stop scheduling. A fetch already running still lands.
    pub async fn stop(&self) -> Result<()> {
        self.send(Command::Stop).await
    }

    /// One extra cycle, outside the schedule
    pub async fn refresh_now(&self) -> Result<()> {
        self.send(Command::RefreshNow).await
    }

    pub async fn refresh_prices(&self) -> Result<()> {
        self.send(Command::RefreshPrices).await
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state_rx.clone()
    }

    /// The latest published state
    pub fn state(&self) -> AppState {
        self.state_rx.borrow().clone()
    }

    pub async fn settings(&self) -> Result<Settings> {
        self.request(Command::Settings).await
    }

    /// Persist settings; with an API key present this also triggers a fetch
    pub async fn save_settings(&self, settings: Settings) -> Result<()> {
        self.request(|reply| Command::SaveSettings(settings, reply)).await?
    }

    /// Replace a rule by id. Returns false if the id is unknown.
    pub async fn update_rule(&self, rule: NotificationRule) -> Result<bool> {
        self.request(|reply| Command::UpdateRule(rule, reply)).await?
    }

    /// Watch an item. Returns false if it is already watched.
    pub async fn add_watch(&self, id: u64, name: impl Into<String>) -> Result<bool> {
        let name = name.into();
        self.request(|reply| Command::AddWatch { id, name, reply }).await
    }

    pub async fn remove_watch(&self, id: u64) -> Result<bool> {
        self.request(|reply| Command::RemoveWatch { id, reply }).await
    }

    /// Stop the actor. In-flight fetches finish but their results are discarded.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.cmd_tx.send(command).await.map_err(|_| Error::PollerClosed)
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.send(command(reply)).await?;
        response.await.map_err(|_| Error::PollerClosed)
    }
}

struct PollActor {
    store: SettingsStore,
    player: Arc<dyn PlayerSource>,
    market: Arc<dyn MarketSource>,
    dispatcher: Dispatcher,
    settings: Settings,
    watchlist: Watchlist,
    state: AppState,
    state_tx: watch::Sender<AppState>,
    cmd_rx: mpsc::Receiver<Command>,
    result_tx: mpsc::UnboundedSender<FetchResult>,
    result_rx: mpsc::UnboundedReceiver<FetchResult>,
    ticker: Option<Interval>,
    /// Bumped on every start and stop
    schedule: u64,
    /// A fetch from the current schedule is running
    scheduled_in_flight: bool,
    in_flight: usize,
}

impl PollActor {
    async fn run(mut self) {
        debug!("Poller started");

        loop {
            tokio::select! {
                command = self.cmd_rx.recv() => match command {
                    Some(Command::Shutdown(reply)) => {
                        self.cmd_rx.close();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    // Every handle is gone
                    None => break,
                },
                Some(result) = self.result_rx.recv() => self.apply(result),
                _ = next_tick(&mut self.ticker) => self.on_tick(),
            }
        }

        debug!("Poller stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start(interval) => self.start(interval),
            Command::Stop => {
                if self.ticker.take().is_some() {
                    info!("Polling stopped");
                }
                self.next_schedule();
                self.state.is_polling = false;
                self.publish();
            }
            Command::RefreshNow => self.begin_cycle(false),
            Command::RefreshPrices => self.refresh_prices(),
            Command::Settings(reply) => {
                let _ = reply.send(self.settings.clone());
            }
            Command::SaveSettings(settings, reply) => {
                let _ = reply.send(self.save_settings(settings));
            }
            Command::UpdateRule(rule, reply) => {
                let _ = reply.send(self.update_rule(rule));
            }
            Command::AddWatch { id, name, reply } => {
                let _ = reply.send(self.add_watch(id, name));
            }
            Command::RemoveWatch { id, reply } => {
                let removed = self.watchlist.remove(id);
                if removed {
                    self.persist_watchlist();
                    self.publish();
                }
                let _ = reply.send(removed);
            }
            // Handled by the run loop
            Command::Shutdown(_) => {}
        }
    }

    fn start(&mut self, interval: Duration) {
        // The first tick of a fresh interval completes at once, which is
        // the immediate cycle
        let interval = interval.max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval_at(Instant::now(), interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        // A fetch left over from an earlier schedule still lands but no
        // longer holds back this one
        self.next_schedule();

        info!("Polling every {}s", interval.as_secs());
        self.state.is_polling = true;
        self.publish();
    }

    fn next_schedule(&mut self) {
        self.schedule = self.schedule.wrapping_add(1);
        self.scheduled_in_flight = false;
    }

    fn on_tick(&mut self) {
        if self.scheduled_in_flight {
            debug!("Previous scheduled fetch still running, skipping tick");
            return;
        }
        self.begin_cycle(true);
        self.refresh_prices();
    }

    fn begin_cycle(&mut self, scheduled: bool) {
        if !self.settings.has_api_key() {
            debug!("No API key, not fetching");
            self.state.error = Some(MISSING_KEY_MESSAGE.to_string());
            self.state.is_loading = false;
            self.publish();
            return;
        }

        let schedule = scheduled.then_some(self.schedule);
        if scheduled {
            self.scheduled_in_flight = true;
        }
        self.in_flight += 1;
        self.state.is_loading = true;
        self.publish();

        let player = Arc::clone(&self.player);
        let results = self.result_tx.clone();
        let api_key = self.settings.api_key.clone();

        tokio::spawn(async move {
            let result = player.fetch_snapshot(&api_key).await;
            // The actor may have shut down meanwhile
            let _ = results.send(FetchResult::Snapshot { schedule, result });
        });
    }

    fn refresh_prices(&mut self) {
        if !self.settings.has_api_key() {
            return;
        }
        for id in self.watchlist.ids() {
            self.fetch_price(id);
        }
    }

    fn fetch_price(&self, id: u64) {
        let market = Arc::clone(&self.market);
        let results = self.result_tx.clone();
        let api_key = self.settings.api_key.clone();

        tokio::spawn(async move {
            let result = market.fetch_quote(&api_key, id).await;
            let _ = results.send(FetchResult::Price { id, result });
        });
    }

    fn apply(&mut self, result: FetchResult) {
        match result {
            FetchResult::Snapshot { schedule, result } => {
                if schedule == Some(self.schedule) {
                    self.scheduled_in_flight = false;
                }
                self.in_flight = self.in_flight.saturating_sub(1);
                self.state.is_loading = self.in_flight > 0;

                match result {
                    Ok(snapshot) => self.apply_snapshot(snapshot),
                    Err(err) => {
                        match &err {
                            TornError::Api { code, message } => {
                                warn!("Fetch rejected by API (code {}): {}", code, message)
                            }
                            TornError::Parse(e) => error!("Could not decode snapshot: {}", e),
                            other => warn!("Fetch failed: {}", other),
                        }
                        // Keep showing the last good snapshot
                        self.state.error = Some(err.user_message());
                    }
                }
            }
            FetchResult::Price { id, result } => {
                if let Err(err) = &result {
                    debug!("Price refresh for item {} failed: {}", id, err);
                }
                if self.watchlist.apply_quote(id, result, Utc::now()) {
                    self.persist_watchlist();
                }
            }
        }

        self.publish();
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot) {
        let now = Utc::now();
        let events = diff(self.state.snapshot.as_ref(), &snapshot, &self.settings.rules, now);

        if !events.is_empty() {
            debug!("{} transition(s) detected", events.len());
            self.dispatcher
                .dispatch(&events, &self.settings.rules, &self.settings);
        }

        self.state.snapshot = Some(snapshot);
        self.state.last_updated = Some(now);
        self.state.error = None;
    }

    fn save_settings(&mut self, settings: Settings) -> Result<()> {
        self.store.save(&settings)?;

        let interval_changed = settings.refresh_interval != self.settings.refresh_interval;
        self.settings = settings;

        if self.ticker.is_some() && interval_changed {
            // Restarting fetches immediately as well
            self.start(self.settings.refresh_interval());
        } else if self.settings.has_api_key() {
            self.begin_cycle(false);
        }
        Ok(())
    }

    fn update_rule(&mut self, rule: NotificationRule) -> Result<bool> {
        match self.store.update_rule(&rule)? {
            Some(rules) => {
                self.settings.rules = rules;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn add_watch(&mut self, id: u64, name: String) -> bool {
        if !self.watchlist.add(id, name) {
            return false;
        }

        self.persist_watchlist();
        if self.settings.has_api_key() {
            self.fetch_price(id);
        }
        self.publish();
        true
    }

    fn persist_watchlist(&self) {
        if let Err(e) = self.store.save_watchlist(self.watchlist.items()) {
            error!("Failed to save watchlist: {}", e);
        }
    }

    fn publish(&mut self) {
        self.state.watchlist = self.watchlist.items().to_vec();
        self.state_tx.send_replace(self.state.clone());
    }
}

async fn next_tick(ticker: &mut Option<Interval>) -> Instant {
    match ticker {
        Some(ticker) => ticker.tick().await,
        None => std::future::pending().await,
    }
}
