//! Monitoring of on-chain raffle activity.

pub mod events;

pub use events::RaffleEventMonitor;
