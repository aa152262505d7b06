//! Core of the raffle client.
//!
//! Ties the wallet and contract crates together into the three client
//! components and the engine driving them:
//!
//! - [`AddressResolver`] maps the wallet's chain to the deployed raffle.
//! - [`StateSynchronizer`] keeps the latest [`RaffleSnapshot`] of that raffle.
//! - [`TransactionSubmitter`] enters the raffle and reports the outcome.
//!
//! [`RaffleEngine`] reacts to wallet changes, contract events and an optional
//! refresh interval, and publishes everything on an [`EventBus`] that front
//! ends subscribe to.
//!
//! [`RaffleSnapshot`]: raffle_types::RaffleSnapshot

pub mod builder;
pub mod engine;
pub mod monitoring;
pub mod notification;
pub mod resolver;
pub mod submitter;
pub mod sync;

pub use builder::{BuilderError, RaffleBuilder, RaffleFactories};
pub use engine::{event_bus::EventBus, EngineError, EngineStatus, RaffleEngine};
pub use monitoring::RaffleEventMonitor;
pub use notification::{EventBusNotifier, NotificationSink, TracingNotifier};
pub use resolver::{AddressResolver, Resolution};
pub use submitter::{state::TransactionStateMachine, SubmitError, TransactionSubmitter};
pub use sync::{RefreshOutcome, SkipReason, StateSynchronizer, SyncedSnapshot};
