//! Transaction lifecycle synchronization for the Chaos Casino contracts.
//!
//! A [`Synchronizer`] is created per game page. It checks preconditions before a
//! transaction is submitted, tracks the single in-flight action, reconciles the
//! decoded receipt into page state and keeps the per-account pending-item store
//! up to date. Chain access goes through [`chain::ChainGateway`] and
//! [`reads::ContractReads`] so the state machine can be driven without a node.

pub mod account;
pub mod action;
pub mod big_int;
pub mod chain;
pub mod collection;
pub mod config;
pub mod decode;
pub mod dispatcher;
pub mod games;
pub mod notices;
pub mod outcome;
pub mod pending;
pub mod reads;
pub mod receipt;
pub mod reconciler;

pub use account::Account;
pub use action::{
    ActionKind,
    GameAction,
    TransactionAction,
};
pub use config::SyncConfig;
pub use games::GameId;
pub use reconciler::{
    Phase,
    ReconcileOutcome,
    Stage,
    Synchronizer,
    Ticket,
};

pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;
