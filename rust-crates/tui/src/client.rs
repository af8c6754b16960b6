use crate::ui;
use chaos_casino::animation::{
    Animation,
    AnimationFrame,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::DeploymentEnv;
use ethers::{
    middleware::SignerMiddleware,
    providers::{
        Http,
        Provider,
    },
    signers::LocalWallet,
    types::TxHash,
};
use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::Arc,
    time::{
        Duration,
        Instant,
    },
};
use synchronizer::{
    Account,
    GameAction,
    GameId,
    Phase,
    ReconcileOutcome,
    Stage,
    SyncConfig,
    Synchronizer,
    chain::{
        ChainEvent,
        ChainGateway,
        ContractBook,
        EthersGateway,
        EthersReads,
        SubmitError,
        drive_transaction,
    },
    collection::{
        Collection,
        enumerate_runes,
    },
    notices::Notice,
    pending::{
        PendingItem,
        SledPendingStore,
    },
    reads::{
        BalanceReader,
        ReadValue,
        ReaderCommand,
        ReaderEvent,
        reader_worker,
    },
    receipt::Receipt,
};
use tokio::{
    sync::mpsc,
    time,
};

const ANIMATION_TICK: Duration = Duration::from_millis(100);
const IDLE_REDRAW: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: DeploymentEnv,
    pub rpc_url: String,
    pub book: ContractBook,
    pub accounts: Vec<AccountConfig>,
    pub data_dir: PathBuf,
    pub start: View,
    pub sync: SyncConfig,
    pub imports: Vec<LegacyImport>,
}

/// A pending-item list exported from the browser client.
#[derive(Clone, Debug)]
pub struct LegacyImport {
    pub game: GameId,
    pub source: PathBuf,
    pub json: String,
}

#[derive(Clone, Debug)]
pub enum AccountConfig {
    Wallet { name: String, wallet: LocalWallet },
    Watch(Account),
}

/// What the main panel shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    Game(GameId),
    Collection,
}

impl View {
    pub const ORDER: [View; 10] = [
        View::Game(GameId::Buy),
        View::Game(GameId::Redeem),
        View::Game(GameId::CoinFlip),
        View::Game(GameId::Rift),
        View::Game(GameId::Anvil),
        View::Game(GameId::Altar),
        View::Game(GameId::Plinko),
        View::Game(GameId::Pegs),
        View::Game(GameId::Cascade),
        View::Collection,
    ];

    pub fn title(self) -> &'static str {
        match self {
            View::Game(game) => game.title(),
            View::Collection => "Collection",
        }
    }

    pub fn game(self) -> Option<GameId> {
        match self {
            View::Game(game) => Some(game),
            View::Collection => None,
        }
    }

    fn position(self) -> usize {
        View::ORDER
            .iter()
            .position(|view| *view == self)
            .unwrap_or_default()
    }

    pub fn next(self) -> View {
        View::ORDER[(self.position() + 1) % View::ORDER.len()]
    }

    pub fn prev(self) -> View {
        let len = View::ORDER.len();
        View::ORDER[(self.position() + len - 1) % len]
    }
}

/// Signing side of one account. Watched accounts can read but never submit.
#[derive(Debug)]
pub enum Gateway {
    Signer(EthersGateway),
    ReadOnly,
}

impl ChainGateway for Gateway {
    async fn submit(&self, action: &GameAction) -> std::result::Result<TxHash, SubmitError> {
        match self {
            Gateway::Signer(gateway) => gateway.submit(action).await,
            Gateway::ReadOnly => Err(SubmitError::ReadOnly),
        }
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> synchronizer::Result<Receipt> {
        match self {
            Gateway::Signer(gateway) => gateway.wait_for_receipt(hash).await,
            Gateway::ReadOnly => Err(anyhow::anyhow!("read-only account has no transactions")),
        }
    }
}

struct AccountSlot {
    label: String,
    account: Account,
    gateway: Arc<Gateway>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum CollectionView {
    #[default]
    NotLoaded,
    Loading,
    Loaded(Collection),
    Failed(String),
}

pub struct CollectionUpdate {
    account: Account,
    result: std::result::Result<Collection, String>,
}

pub struct PageChainEvent {
    game: GameId,
    event: ChainEvent,
}

/// Reader worker polling the shown page.
struct ReaderHandle {
    game: GameId,
    cmd_tx: mpsc::UnboundedSender<ReaderCommand>,
    events: mpsc::UnboundedReceiver<ReaderEvent>,
}

impl ReaderHandle {
    fn send(&self, cmd: ReaderCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::debug!(game = %self.game, ?cmd, "reader worker already stopped");
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReadLine {
    pub label: &'static str,
    pub value: String,
    pub degraded: bool,
}

#[derive(Clone, Debug)]
pub struct PageSnapshot {
    pub game: GameId,
    pub reads: Vec<ReadLine>,
    pub phase: String,
    pub busy: bool,
    pub stage: Stage,
    pub pending: Vec<PendingItem>,
    pub notices: Vec<Notice>,
    pub altar_seconds_left: Option<u64>,
}

/// Everything the UI draws in one frame.
#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub network: DeploymentEnv,
    pub view: View,
    pub account_label: Option<String>,
    pub account: Option<Account>,
    pub read_only: bool,
    pub account_count: usize,
    pub page: Option<PageSnapshot>,
    pub collection: CollectionView,
    pub animation: Option<AnimationFrame>,
    pub status: Option<String>,
}

pub struct AppController {
    network: DeploymentEnv,
    reads: EthersReads,
    accounts: Vec<AccountSlot>,
    active_account: usize,
    pages: BTreeMap<GameId, Synchronizer<SledPendingStore>>,
    view: View,
    sync: SyncConfig,
    chain_tx: mpsc::UnboundedSender<PageChainEvent>,
    collection: CollectionView,
    collection_tx: mpsc::UnboundedSender<CollectionUpdate>,
    animation: Option<Animation>,
    status: Option<String>,
    reader_restart: bool,
    last_redraw: Instant,
}

impl AppController {
    pub fn new(
        config: AppConfig,
        chain_tx: mpsc::UnboundedSender<PageChainEvent>,
        collection_tx: mpsc::UnboundedSender<CollectionUpdate>,
    ) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .wrap_err_with(|| format!("Invalid RPC URL {}", config.rpc_url))?
            .interval(Duration::from_millis(1_500));
        let reads = EthersReads::new(Arc::new(provider.clone()), config.book);

        let accounts = config
            .accounts
            .into_iter()
            .map(|account| match account {
                AccountConfig::Wallet { name, wallet } => {
                    let client = Arc::new(SignerMiddleware::new(provider.clone(), wallet));
                    let gateway =
                        EthersGateway::new(client, config.book, config.sync.confirmation_timeout);
                    AccountSlot {
                        label: name,
                        account: Account::from(gateway.signer_address()),
                        gateway: Arc::new(Gateway::Signer(gateway)),
                    }
                }
                AccountConfig::Watch(account) => AccountSlot {
                    label: "watch".to_string(),
                    account,
                    gateway: Arc::new(Gateway::ReadOnly),
                },
            })
            .collect::<Vec<_>>();

        let store_dir = config.data_dir.join("pending");
        let store = SledPendingStore::open(&store_dir).map_err(|err| {
            eyre!(
                "{err:#}. Is another chaos-casino client running with --data-dir {}?",
                config.data_dir.display()
            )
        })?;

        let pages = GameId::ALL
            .into_iter()
            .map(|game| {
                let page = Synchronizer::new(
                    game,
                    config.book.for_game(game),
                    store.clone(),
                    &config.sync,
                );
                (game, page)
            })
            .collect();

        let mut controller = Self {
            network: config.network,
            reads,
            accounts,
            active_account: 0,
            pages,
            view: config.start,
            sync: config.sync,
            chain_tx,
            collection: CollectionView::NotLoaded,
            collection_tx,
            animation: None,
            status: None,
            reader_restart: false,
            last_redraw: Instant::now(),
        };
        controller.apply_account();
        controller.import_legacy(&config.imports)?;
        Ok(controller)
    }

    pub fn account(&self) -> Option<Account> {
        self.accounts
            .get(self.active_account)
            .map(|slot| slot.account)
    }

    fn page(&self) -> Option<&Synchronizer<SledPendingStore>> {
        self.view.game().and_then(|game| self.pages.get(&game))
    }

    fn page_mut(&mut self) -> Option<&mut Synchronizer<SledPendingStore>> {
        let game = self.view.game()?;
        self.pages.get_mut(&game)
    }

    fn apply_account(&mut self) {
        let account = self.account();
        for page in self.pages.values_mut() {
            page.set_account(account);
        }
        self.collection = CollectionView::NotLoaded;
        self.animation = None;
    }

    /// Merges browser exports into the pages of the first account.
    fn import_legacy(&mut self, imports: &[LegacyImport]) -> Result<()> {
        for import in imports {
            let page = self
                .pages
                .get_mut(&import.game)
                .ok_or_else(|| eyre!("No {} page", import.game))?;
            let added = page
                .import_legacy(&import.json)
                .map_err(|err| eyre!("{err:#}"))
                .wrap_err_with(|| format!("Failed to import {}", import.source.display()))?;
            tracing::info!(game = %import.game, source = %import.source.display(), added, "legacy pending items imported");
        }
        Ok(())
    }

    fn spawn_reader(&mut self) -> Option<ReaderHandle> {
        let game = self.view.game()?;
        if let Some(page) = self.pages.get_mut(&game) {
            page.take_read_invalidation();
        }
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();
        let reader = BalanceReader::new(game, self.sync.degraded_after, time::Instant::now());
        tokio::spawn(reader_worker(self.reads.clone(), reader, cmd_rx, event_tx));
        let handle = ReaderHandle {
            game,
            cmd_tx,
            events,
        };
        handle.send(ReaderCommand::SetAccount(self.account()));
        tracing::debug!(%game, "reader started");
        Some(handle)
    }

    fn ingest_reader_event(&mut self, game: GameId, event: ReaderEvent) {
        let ReaderEvent::Snapshot(snapshot) = event;
        if let Some(page) = self.pages.get_mut(&game) {
            page.ingest_snapshot(snapshot);
        }
    }

    /// Feeds a chain task report to the page that dispatched it.
    pub fn handle_chain_event(&mut self, update: PageChainEvent) -> Option<ReconcileOutcome> {
        let PageChainEvent { game, event } = update;
        let page = self.pages.get_mut(&game)?;
        let outcome = page.handle(event);
        if let Some(result) = page.take_animation() {
            if self.view == View::Game(game) {
                self.animation =
                    Animation::for_result(&result, &mut rand::rng(), Instant::now());
            }
        }
        outcome
    }

    pub fn dispatch(&mut self, action: GameAction) {
        let Some(gateway) = self
            .accounts
            .get(self.active_account)
            .map(|slot| slot.gateway.clone())
        else {
            self.status = Some("No account. Start with --wallet or --watch.".to_string());
            return;
        };
        let Some(page) = self.page_mut() else {
            return;
        };
        let game = page.game();
        let ticket = match page.dispatch(action.clone()) {
            Ok(ticket) => ticket,
            Err(err) => {
                tracing::debug!(%game, %action, error = %err.precondition, "dispatch refused");
                return;
            }
        };
        self.animation = None;
        let chain_tx = self.chain_tx.clone();
        tokio::spawn(async move {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let drive = async move {
                drive_transaction(gateway.as_ref(), ticket, action, &tx).await;
            };
            let forward = async move {
                while let Some(event) = rx.recv().await {
                    if chain_tx.send(PageChainEvent { game, event }).is_err() {
                        break;
                    }
                }
            };
            tokio::join!(drive, forward);
        });
    }

    fn switch_view(&mut self, view: View) {
        if view == self.view {
            return;
        }
        if let Some(page) = self.page_mut() {
            if page.cancel() {
                tracing::info!(game = %page.game(), "left page with an action in flight");
            }
            page.acknowledge_result();
        }
        self.view = view;
        self.animation = None;
        self.reader_restart = true;
        if view == View::Collection && self.collection == CollectionView::NotLoaded {
            self.load_collection();
        }
    }

    fn cycle_account(&mut self) {
        if self.accounts.len() < 2 {
            self.status = Some("Only one account configured.".to_string());
            return;
        }
        self.active_account = (self.active_account + 1) % self.accounts.len();
        self.apply_account();
        self.reader_restart = true;
        if self.view == View::Collection {
            self.load_collection();
        }
    }

    fn load_collection(&mut self) {
        let Some(account) = self.account() else {
            self.collection = CollectionView::Failed("No account connected.".to_string());
            return;
        };
        self.collection = CollectionView::Loading;
        let reads = self.reads.clone();
        let tx = self.collection_tx.clone();
        tokio::spawn(async move {
            let result = enumerate_runes(&reads, account.address())
                .await
                .map_err(|err| format!("{err:#}"));
            let _ = tx.send(CollectionUpdate { account, result });
        });
    }

    pub fn ingest_collection(&mut self, update: CollectionUpdate) {
        if Some(update.account) != self.account() {
            tracing::debug!(account = %update.account, "dropping collection of a previous account");
            return;
        }
        self.collection = match update.result {
            Ok(collection) => CollectionView::Loaded(collection),
            Err(err) => {
                tracing::warn!(account = %update.account, error = %err, "collection enumeration failed");
                CollectionView::Failed(err)
            }
        };
    }

    /// Whether the tick should redraw.
    fn tick(&mut self, now: Instant) -> bool {
        if let Some(animation) = &self.animation {
            if animation.is_finished(now) {
                self.animation = None;
            }
            return true;
        }
        now.saturating_duration_since(self.last_redraw) >= IDLE_REDRAW
    }

    /// Returns `false` once the user asked to quit.
    pub fn apply_user_event(&mut self, event: ui::UserEvent) -> Result<bool> {
        self.status = None;
        match event {
            ui::UserEvent::Quit => return Ok(false),
            ui::UserEvent::Redraw => {}
            ui::UserEvent::NextView => self.switch_view(self.view.next()),
            ui::UserEvent::PrevView => self.switch_view(self.view.prev()),
            ui::UserEvent::ToggleCollection => {
                let target = match self.view {
                    View::Collection => View::Game(GameId::Anvil),
                    View::Game(_) => View::Collection,
                };
                self.switch_view(target);
            }
            ui::UserEvent::CycleAccount => self.cycle_account(),
            ui::UserEvent::Refresh => match self.view {
                View::Collection => self.load_collection(),
                View::Game(_) => self.reader_restart = true,
            },
            ui::UserEvent::Cancel => {
                if let Some(page) = self.page_mut() {
                    page.cancel();
                }
            }
            ui::UserEvent::Acknowledge => {
                if let Some(page) = self.page_mut() {
                    page.acknowledge_result();
                }
                self.animation = None;
            }
            ui::UserEvent::Act(action) => self.dispatch(action),
        }
        Ok(true)
    }

    fn take_fetch_request(&mut self, game: GameId) -> bool {
        self.pages
            .get_mut(&game)
            .is_some_and(|page| page.take_read_invalidation())
    }

    pub fn build_snapshot(&mut self) -> AppSnapshot {
        let now = Instant::now();
        self.last_redraw = now;
        let slot = self.accounts.get(self.active_account);
        AppSnapshot {
            network: self.network,
            view: self.view,
            account_label: slot.map(|slot| slot.label.clone()),
            account: slot.map(|slot| slot.account),
            read_only: slot.is_none_or(|slot| matches!(*slot.gateway, Gateway::ReadOnly)),
            account_count: self.accounts.len(),
            page: self.page().map(page_snapshot),
            collection: self.collection.clone(),
            animation: self.animation.as_ref().map(|animation| animation.frame(now)),
            status: self.status.clone(),
        }
    }
}

fn page_snapshot(page: &Synchronizer<SledPendingStore>) -> PageSnapshot {
    let snapshot = page.snapshot();
    let reads = page
        .game()
        .reads()
        .iter()
        .map(|key| ReadLine {
            label: key.label(),
            value: format_read(snapshot.value(*key)),
            degraded: snapshot.is_degraded(*key),
        })
        .collect();
    let altar_seconds_left = if page.game() == GameId::Altar {
        snapshot.altar_seconds_left(time::Instant::now())
    } else {
        None
    };
    PageSnapshot {
        game: page.game(),
        reads,
        phase: describe_phase(page.phase()),
        busy: *page.phase() != Phase::Idle,
        stage: page.stage().clone(),
        pending: page.pending().to_vec(),
        notices: page.notices().iter().cloned().collect(),
        altar_seconds_left,
    }
}

pub fn format_read(value: Option<ReadValue>) -> String {
    match value {
        None => "…".to_string(),
        Some(ReadValue::Amount(amount)) => amount.to_string(),
        Some(ReadValue::Flag(flag)) => if flag { "yes" } else { "no" }.to_string(),
        Some(ReadValue::Address(address)) if address.is_zero() => "none".to_string(),
        Some(ReadValue::Address(address)) => Account::from(address).short(),
    }
}

fn describe_phase(phase: &Phase) -> String {
    match phase {
        Phase::Idle => "Ready".to_string(),
        Phase::AwaitingSubmission { action, .. } => format!("{action}: confirm in wallet"),
        Phase::AwaitingConfirmation { action, hash, .. } => {
            format!("{action}: waiting for {hash:?}")
        }
        Phase::Reconciling { action, .. } => format!("{action}: reading receipt"),
        Phase::Failed { action, reason, .. } => format!("{action} failed: {reason}"),
    }
}

async fn next_reader_event(reader: &mut Option<ReaderHandle>) -> Option<(GameId, ReaderEvent)> {
    match reader {
        Some(handle) => {
            let game = handle.game;
            handle.events.recv().await.map(|event| (game, event))
        }
        None => std::future::pending().await,
    }
}

fn stop_reader(reader: &mut Option<ReaderHandle>) {
    if let Some(handle) = reader.take() {
        handle.send(ReaderCommand::Shutdown);
    }
}

async fn run_loop(
    mut controller: AppController,
    mut chain_rx: mpsc::UnboundedReceiver<PageChainEvent>,
    mut collection_rx: mpsc::UnboundedReceiver<CollectionUpdate>,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEvents,
) -> Result<()> {
    let mut reader = controller.spawn_reader();
    let mut ticker = time::interval(ANIMATION_TICK);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

    ui::draw(ui_state, &controller.build_snapshot()).wrap_err("initial draw failed")?;

    loop {
        tokio::select! {
            event = next_reader_event(&mut reader) => {
                match event {
                    Some((game, event)) => controller.ingest_reader_event(game, event),
                    None => {
                        tracing::warn!("reader worker channel closed");
                        reader = None;
                    }
                }
            }
            Some(update) = chain_rx.recv() => {
                if let Some(outcome) = controller.handle_chain_event(update) {
                    tracing::debug!(?outcome, "receipt reconciled");
                }
            }
            Some(update) = collection_rx.recv() => {
                controller.ingest_collection(update);
            }
            _ = ticker.tick() => {
                if !controller.tick(Instant::now()) {
                    continue;
                }
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                if !controller.apply_user_event(ev)? {
                    break;
                }
            }
        }

        if std::mem::take(&mut controller.reader_restart) {
            stop_reader(&mut reader);
            reader = controller.spawn_reader();
        } else if let Some(handle) = &reader {
            if controller.take_fetch_request(handle.game) {
                handle.send(ReaderCommand::FetchNow);
            }
        }
        ui::draw(ui_state, &controller.build_snapshot()).wrap_err("draw failed")?;
    }

    stop_reader(&mut reader);
    Ok(())
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let (chain_tx, chain_rx) = mpsc::unbounded_channel();
    let (collection_tx, collection_rx) = mpsc::unbounded_channel();
    let controller = AppController::new(config, chain_tx, collection_tx)?;
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    tracing::info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    tracing::info!("UI ready");
    let res = run_loop(
        controller,
        chain_rx,
        collection_rx,
        &mut ui_state,
        &mut input_events,
    )
    .await;
    ui::terminal_exit()?;
    res
}
