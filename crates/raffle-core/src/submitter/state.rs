//! Submitter transaction state machine.
//!
//! One attempt moves Idle -> Submitting -> Confirming -> Succeeded -> Idle, or
//! drops to Failed -> Idle from either in-flight state. Every accepted
//! transition is published on the event bus and on a watch channel.

use crate::engine::event_bus::EventBus;
use once_cell::sync::Lazy;
use raffle_types::{RaffleEvent, TransactionEvent, TransactionState};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum TransactionStateError {
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition {
		from: TransactionState,
		to: TransactionState,
	},
	#[error("Transaction already in progress ({0})")]
	Busy(TransactionState),
}

// Static transition table - each state maps to allowed next states
static TRANSITIONS: Lazy<HashMap<TransactionState, HashSet<TransactionState>>> = Lazy::new(|| {
	use TransactionState::*;

	let mut m = HashMap::new();
	m.insert(Idle, HashSet::from([Submitting]));
	m.insert(Submitting, HashSet::from([Confirming, Failed]));
	m.insert(Confirming, HashSet::from([Succeeded, Failed]));
	m.insert(Succeeded, HashSet::from([Idle]));
	m.insert(Failed, HashSet::from([Idle]));
	m
});

fn is_valid_transition(from: &TransactionState, to: &TransactionState) -> bool {
	TRANSITIONS
		.get(from)
		.is_some_and(|allowed| allowed.contains(to))
}

/// Current state of the submitter, shared with observers.
pub struct TransactionStateMachine {
	state: watch::Sender<TransactionState>,
	event_bus: EventBus,
}

impl TransactionStateMachine {
	pub fn new(event_bus: EventBus) -> Self {
		let (state, _) = watch::channel(TransactionState::Idle);
		Self { state, event_bus }
	}

	pub fn current(&self) -> TransactionState {
		*self.state.borrow()
	}

	pub fn subscribe(&self) -> watch::Receiver<TransactionState> {
		self.state.subscribe()
	}

	/// Starts an attempt: Idle -> Submitting, atomically.
	pub fn try_begin(&self) -> Result<(), TransactionStateError> {
		let mut busy = None;
		self.state.send_if_modified(|state| {
			if *state == TransactionState::Idle {
				*state = TransactionState::Submitting;
				true
			} else {
				busy = Some(*state);
				false
			}
		});

		if let Some(state) = busy {
			return Err(TransactionStateError::Busy(state));
		}
		self.publish(TransactionState::Idle, TransactionState::Submitting);
		Ok(())
	}

	/// Moves to `to` if the transition table allows it.
	pub fn transition(&self, to: TransactionState) -> Result<(), TransactionStateError> {
		let mut from = to;
		let accepted = self.state.send_if_modified(|state| {
			from = *state;
			if is_valid_transition(state, &to) {
				*state = to;
				true
			} else {
				false
			}
		});

		if !accepted {
			return Err(TransactionStateError::InvalidTransition { from, to });
		}
		self.publish(from, to);
		Ok(())
	}

	/// Forces the machine back to Idle, whatever the current state.
	pub fn reset(&self) {
		let from = self.state.send_replace(TransactionState::Idle);
		if from != TransactionState::Idle {
			tracing::warn!(%from, "Transaction attempt abandoned, state reset");
			self.publish(from, TransactionState::Idle);
		}
	}

	fn publish(&self, from: TransactionState, to: TransactionState) {
		tracing::debug!(%from, %to, "Transaction state changed");
		self.event_bus
			.publish(RaffleEvent::Transaction(TransactionEvent::StateChanged {
				from,
				to,
			}))
			.ok();
	}
}

/// Resets the machine when an attempt is dropped before finishing.
pub(crate) struct AttemptGuard<'a> {
	machine: &'a TransactionStateMachine,
}

impl<'a> AttemptGuard<'a> {
	pub(crate) fn new(machine: &'a TransactionStateMachine) -> Self {
		Self { machine }
	}
}

impl Drop for AttemptGuard<'_> {
	fn drop(&mut self) {
		if self.machine.current() != TransactionState::Idle {
			self.machine.reset();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use raffle_types::TransactionState::*;
	use tokio::sync::broadcast;

	fn drain(
		events: &mut broadcast::Receiver<RaffleEvent>,
	) -> Vec<(TransactionState, TransactionState)> {
		let mut seen = Vec::new();
		while let Ok(event) = events.try_recv() {
			if let RaffleEvent::Transaction(TransactionEvent::StateChanged { from, to }) = event {
				seen.push((from, to));
			}
		}
		seen
	}

	#[test]
	fn test_success_path() {
		let bus = EventBus::new(16);
		let mut events = bus.subscribe();
		let machine = TransactionStateMachine::new(bus);

		machine.try_begin().unwrap();
		machine.transition(Confirming).unwrap();
		machine.transition(Succeeded).unwrap();
		machine.transition(Idle).unwrap();

		assert_eq!(
			drain(&mut events),
			vec![
				(Idle, Submitting),
				(Submitting, Confirming),
				(Confirming, Succeeded),
				(Succeeded, Idle)
			]
		);
	}

	#[test]
	fn test_invalid_transitions_rejected() {
		let machine = TransactionStateMachine::new(EventBus::new(4));

		assert!(matches!(
			machine.transition(Confirming),
			Err(TransactionStateError::InvalidTransition { from: Idle, to: Confirming })
		));

		machine.try_begin().unwrap();
		assert!(machine.transition(Succeeded).is_err());
		machine.transition(Failed).unwrap();
		assert!(machine.transition(Confirming).is_err());
		assert_eq!(machine.current(), Failed);
	}

	#[test]
	fn test_begin_refused_while_busy() {
		let machine = TransactionStateMachine::new(EventBus::new(4));
		let observer = machine.subscribe();

		machine.try_begin().unwrap();
		assert!(matches!(
			machine.try_begin(),
			Err(TransactionStateError::Busy(Submitting))
		));

		machine.transition(Confirming).unwrap();
		assert!(matches!(
			machine.try_begin(),
			Err(TransactionStateError::Busy(Confirming))
		));
		assert_eq!(*observer.borrow(), Confirming);
	}

	#[test]
	fn test_guard_resets_abandoned_attempt() {
		let bus = EventBus::new(16);
		let mut events = bus.subscribe();
		let machine = TransactionStateMachine::new(bus);

		{
			machine.try_begin().unwrap();
			let _guard = AttemptGuard::new(&machine);
			machine.transition(Confirming).unwrap();
		}

		assert_eq!(machine.current(), Idle);
		assert_eq!(drain(&mut events).last(), Some(&(Confirming, Idle)));
		machine.try_begin().unwrap();
	}
}
