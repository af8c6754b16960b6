//! JSON-RPC adapters and the task that drives one transaction.

use std::{
    future::Future,
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use anyhow::{
    Context,
    anyhow,
    bail,
};
use deployments::DeploymentRecord;
use ethers::{
    contract::{
        ContractCall,
        ContractError,
    },
    middleware::SignerMiddleware,
    providers::{
        Http,
        Middleware,
        PendingTransaction,
        Provider,
    },
    signers::LocalWallet,
    types::{
        Address,
        TxHash,
        U256,
    },
};
use generated_abi::{
    altar_types::ChaosAltar,
    anvil_types::AethericAnvil,
    cascade_types::ChaosCascade,
    coinflip_types::CoinFlip,
    coins_cost_wei,
    hub_types::ChaosCoin,
    pegs_types::ChaosPegs,
    plinko_types::ChaosPlinko,
    rift_types::QuantumRift,
    runes_types::ChaosRunes,
};
use thiserror::Error;
use tokio::{
    sync::mpsc,
    time,
};
use tracing::{
    debug,
    warn,
};

use crate::{
    GameId,
    action::GameAction,
    collection::OwnedTokens,
    reads::{
        ContractReads,
        ReadKey,
        ReadValue,
    },
    receipt::Receipt,
    reconciler::Ticket,
};

pub type ReadClient = Provider<Http>;
pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Why a transaction never got a hash.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Transaction rejected.")]
    Rejected,
    #[error("This account is read-only. Start with --wallet to play.")]
    ReadOnly,
    /// Short provider message, shown in place of the generic text.
    #[error("{0}")]
    Provider(String),
}

const SHORT_MESSAGE_LEN: usize = 160;

impl SubmitError {
    pub fn from_contract<M: Middleware>(err: ContractError<M>) -> Self {
        Self::from_message(&err.to_string())
    }

    pub fn from_message(message: &str) -> Self {
        let first_line = message.lines().next().unwrap_or_default().trim();
        if first_line.is_empty() {
            return SubmitError::Rejected;
        }
        let lower = first_line.to_ascii_lowercase();
        if lower.contains("user rejected") || lower.contains("user denied") {
            return SubmitError::Rejected;
        }
        let short: String = first_line.chars().take(SHORT_MESSAGE_LEN).collect();
        SubmitError::Provider(short)
    }
}

/// Messages the chain task sends back to the page loop.
#[derive(Clone, Debug, PartialEq)]
pub enum ChainEvent {
    Submitted { ticket: Ticket, hash: TxHash },
    SubmissionFailed { ticket: Ticket, error: SubmitError },
    Confirmed(Receipt),
    WaitFailed { hash: TxHash, reason: String },
}

/// Write side of the chain: hands an action to the wallet and waits for it.
pub trait ChainGateway: Send + Sync + 'static {
    fn submit(
        &self,
        action: &GameAction,
    ) -> impl Future<Output = Result<TxHash, SubmitError>> + Send;

    fn wait_for_receipt(&self, hash: TxHash) -> impl Future<Output = crate::Result<Receipt>> + Send;
}

/// Submits `action` and waits for its receipt, reporting each step. Never
/// touches page state; the page loop feeds the events to its synchronizer.
pub async fn drive_transaction<G: ChainGateway>(
    gateway: &G,
    ticket: Ticket,
    action: GameAction,
    events: &mpsc::UnboundedSender<ChainEvent>,
) {
    let hash = match gateway.submit(&action).await {
        Ok(hash) => hash,
        Err(error) => {
            let _ = events.send(ChainEvent::SubmissionFailed { ticket, error });
            return;
        }
    };
    if events.send(ChainEvent::Submitted { ticket, hash }).is_err() {
        return;
    }
    let event = match gateway.wait_for_receipt(hash).await {
        Ok(receipt) => ChainEvent::Confirmed(receipt),
        Err(err) => ChainEvent::WaitFailed {
            hash,
            reason: format!("{err:#}"),
        },
    };
    let _ = events.send(event);
}

/// Addresses of every casino contract on one network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContractBook {
    pub hub: Address,
    pub coinflip: Address,
    pub rift: Address,
    pub anvil: Address,
    pub altar: Address,
    pub plinko: Address,
    pub pegs: Address,
    pub cascade: Address,
    pub runes: Address,
}

impl ContractBook {
    pub fn from_record(record: &DeploymentRecord) -> crate::Result<Self> {
        let missing = record.missing_contracts();
        if !missing.is_empty() {
            bail!("missing contract addresses: {}", missing.join(", "));
        }
        let address = |name: &str| -> crate::Result<Address> {
            let text = record
                .address_of(name)
                .ok_or_else(|| anyhow!("missing {name} address"))?;
            Address::from_str(text.trim())
                .with_context(|| format!("{name} address `{text}` is not valid"))
        };
        Ok(Self {
            hub: address("hub")?,
            coinflip: address("coinflip")?,
            rift: address("rift")?,
            anvil: address("anvil")?,
            altar: address("altar")?,
            plinko: address("plinko")?,
            pegs: address("pegs")?,
            cascade: address("cascade")?,
            runes: address("runes")?,
        })
    }

    pub fn for_game(&self, game: GameId) -> Address {
        match game {
            GameId::Buy | GameId::Redeem => self.hub,
            GameId::CoinFlip => self.coinflip,
            GameId::Rift => self.rift,
            GameId::Anvil => self.anvil,
            GameId::Altar => self.altar,
            GameId::Plinko => self.plinko,
            GameId::Pegs => self.pegs,
            GameId::Cascade => self.cascade,
        }
    }
}

/// Read-only contract views over a plain HTTP provider.
#[derive(Clone, Debug)]
pub struct EthersReads {
    client: Arc<ReadClient>,
    book: ContractBook,
}

impl EthersReads {
    pub fn new(client: Arc<ReadClient>, book: ContractBook) -> Self {
        Self { client, book }
    }
}

impl ContractReads for EthersReads {
    async fn read(&self, key: ReadKey, account: Option<Address>) -> crate::Result<ReadValue> {
        let player = || account.ok_or_else(|| anyhow!("{} needs an account", key.label()));
        let client = self.client.clone();
        let book = &self.book;
        let value = match key {
            ReadKey::Coins => ReadValue::Amount(
                ChaosCoin::new(book.hub, client)
                    .get_coins(player()?)
                    .call()
                    .await
                    .context("getCoins")?,
            ),
            ReadKey::Points => ReadValue::Amount(
                ChaosCoin::new(book.hub, client)
                    .points(player()?)
                    .call()
                    .await
                    .context("points")?,
            ),
            ReadKey::HasActiveBet => ReadValue::Flag(
                CoinFlip::new(book.coinflip, client)
                    .has_active_bet(player()?)
                    .call()
                    .await
                    .context("hasActiveBet")?,
            ),
            ReadKey::PendingPoints => ReadValue::Amount(
                CoinFlip::new(book.coinflip, client)
                    .pending_points(player()?)
                    .call()
                    .await
                    .context("pendingPoints")?,
            ),
            ReadKey::PlinkoGameBalance => ReadValue::Amount(
                ChaosPlinko::new(book.plinko, client)
                    .game_balances(player()?)
                    .call()
                    .await
                    .context("gameBalances")?,
            ),
            ReadKey::CascadePendingWinnings => ReadValue::Amount(
                ChaosCascade::new(book.cascade, client)
                    .pending_winnings(player()?)
                    .call()
                    .await
                    .context("pendingWinnings")?,
            ),
            ReadKey::AltarTimeLeft => ReadValue::Amount(
                ChaosAltar::new(book.altar, client)
                    .get_time_left()
                    .call()
                    .await
                    .context("getTimeLeft")?,
            ),
            ReadKey::AltarEssence => ReadValue::Amount(
                ChaosAltar::new(book.altar, client)
                    .altar_essence()
                    .call()
                    .await
                    .context("altarEssence")?,
            ),
            ReadKey::AltarHarbinger => ReadValue::Address(
                ChaosAltar::new(book.altar, client)
                    .current_harbinger()
                    .call()
                    .await
                    .context("currentHarbinger")?,
            ),
        };
        Ok(value)
    }
}

impl OwnedTokens for EthersReads {
    async fn balance_of(&self, owner: Address) -> crate::Result<U256> {
        ChaosRunes::new(self.book.runes, self.client.clone())
            .balance_of(owner)
            .call()
            .await
            .context("balanceOf")
    }

    async fn token_of_owner_by_index(&self, owner: Address, index: U256) -> crate::Result<U256> {
        ChaosRunes::new(self.book.runes, self.client.clone())
            .token_of_owner_by_index(owner, index)
            .call()
            .await
            .with_context(|| format!("tokenOfOwnerByIndex({index})"))
    }
}

/// Signs with a local wallet and waits for receipts over the same provider.
#[derive(Clone, Debug)]
pub struct EthersGateway {
    client: Arc<SignerClient>,
    book: ContractBook,
    confirmation_timeout: Duration,
    poll_interval: Duration,
}

impl EthersGateway {
    pub fn new(client: Arc<SignerClient>, book: ContractBook, confirmation_timeout: Duration) -> Self {
        Self {
            client,
            book,
            confirmation_timeout,
            poll_interval: Duration::from_millis(1_500),
        }
    }

    pub fn signer_address(&self) -> Address {
        self.client.address()
    }

    fn call_for(&self, action: &GameAction) -> ContractCall<SignerClient, ()> {
        let client = self.client.clone();
        let book = &self.book;
        match action {
            GameAction::BuyCoins { amount } => ChaosCoin::new(book.hub, client)
                .buy_coins(*amount)
                .value(coins_cost_wei(*amount)),
            GameAction::RedeemPoints { cost } => {
                ChaosCoin::new(book.hub, client).redeem_points(*cost)
            }
            GameAction::FlipPlaceBet { heads } => {
                CoinFlip::new(book.coinflip, client).place_bet(*heads)
            }
            GameAction::FlipCoin => CoinFlip::new(book.coinflip, client).flip(),
            GameAction::FlipClaim => CoinFlip::new(book.coinflip, client).claim_points(),
            GameAction::RiftPlaceBet { choice, amount } => {
                QuantumRift::new(book.rift, client).place_bet(*choice, *amount)
            }
            GameAction::RiftResolve { bet_id } => {
                QuantumRift::new(book.rift, client).resolve_bet(*bet_id)
            }
            GameAction::AnvilStrike => AethericAnvil::new(book.anvil, client).strike_anvil(),
            GameAction::AnvilResolve { strike_id } => {
                AethericAnvil::new(book.anvil, client).resolve_forge(*strike_id)
            }
            GameAction::AltarChannel { amount } => {
                ChaosAltar::new(book.altar, client).channel(*amount)
            }
            GameAction::PlinkoDeposit { amount } => {
                ChaosPlinko::new(book.plinko, client).deposit(*amount)
            }
            GameAction::PlinkoWithdraw { amount } => {
                ChaosPlinko::new(book.plinko, client).withdraw(*amount)
            }
            GameAction::PlinkoDrop { amount, risk } => {
                ChaosPlinko::new(book.plinko, client).drop_ball(*amount, *risk)
            }
            GameAction::PegsDrop { amount, risk } => {
                ChaosPegs::new(book.pegs, client).drop_ball(*amount, *risk)
            }
            GameAction::CascadeDrop { amount, risk } => {
                ChaosCascade::new(book.cascade, client).drop_ball(*amount, *risk)
            }
            GameAction::CascadeCollect => {
                ChaosCascade::new(book.cascade, client).collect_winnings()
            }
        }
    }
}

impl ChainGateway for EthersGateway {
    async fn submit(&self, action: &GameAction) -> Result<TxHash, SubmitError> {
        let call = self.call_for(action);
        let pending = call.send().await.map_err(|err| {
            warn!(%action, error = %err, "wallet did not submit");
            SubmitError::from_contract(err)
        })?;
        let hash = *pending;
        debug!(%action, ?hash, "submitted");
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> crate::Result<Receipt> {
        let pending =
            PendingTransaction::new(hash, self.client.inner()).interval(self.poll_interval);
        let receipt = time::timeout(self.confirmation_timeout, pending)
            .await
            .map_err(|_| {
                anyhow!(
                    "no receipt after {}s",
                    self.confirmation_timeout.as_secs()
                )
            })?
            .context("provider error while waiting for the receipt")?
            .ok_or_else(|| anyhow!("transaction was dropped from the mempool"))?;
        Ok(Receipt::from(receipt))
    }
}
