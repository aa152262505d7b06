//! Raffle contract ABI.
//!
//! Only the surface the client touches is declared: the read-only getters,
//! `enterRaffle`, the events it watches and the custom errors it decodes
//! revert data against.

use alloy_primitives::{Log as PrimLog, B256};
use alloy_sol_types::{sol, SolEvent, SolInterface};
use raffle_types::ChainEvent;

sol! {
	interface IRaffle {
		error Raffle__NotEnoughETHEntered();
		error Raffle__NotOpen();
		error Raffle__TransferFailed();
		error Raffle__UpkeepNotNeeded(uint256 currentBalance, uint256 numPlayers, uint256 raffleState);

		event RaffleEnter(address indexed player);
		event RequestedRaffleWinner(uint256 indexed requestId);
		event WinnerPicked(address indexed winner);

		function getEntranceFee() external view returns (uint256 fee);
		function getNumberOfPlayers() external view returns (uint256 players);
		function getRecentWinner() external view returns (address winner);
		function enterRaffle() external payable;
	}
}

/// Topics of every event the client monitors.
pub fn monitored_event_signatures() -> Vec<B256> {
	vec![
		IRaffle::RaffleEnter::SIGNATURE_HASH,
		IRaffle::RequestedRaffleWinner::SIGNATURE_HASH,
		IRaffle::WinnerPicked::SIGNATURE_HASH,
	]
}

/// Turns revert data into a readable reason.
///
/// Raffle custom errors are tried first, then the standard `Error(string)` and
/// `Panic(uint256)` encodings. Anything else is returned as hex.
pub fn decode_revert_reason(data: &[u8]) -> String {
	if let Ok(error) = IRaffle::IRaffleErrors::abi_decode(data, true) {
		return match error {
			IRaffle::IRaffleErrors::Raffle__NotEnoughETHEntered(_) => {
				"Raffle__NotEnoughETHEntered".to_string()
			},
			IRaffle::IRaffleErrors::Raffle__NotOpen(_) => "Raffle__NotOpen".to_string(),
			IRaffle::IRaffleErrors::Raffle__TransferFailed(_) => "Raffle__TransferFailed".to_string(),
			IRaffle::IRaffleErrors::Raffle__UpkeepNotNeeded(e) => format!(
				"Raffle__UpkeepNotNeeded(currentBalance={}, numPlayers={}, raffleState={})",
				e.currentBalance, e.numPlayers, e.raffleState
			),
		};
	}

	alloy_sol_types::decode_revert_reason(data)
		.unwrap_or_else(|| format!("0x{}", hex::encode(data)))
}

/// Decodes a raffle event log.
///
/// Returns `Ok(None)` for logs that are not raffle events.
pub fn decode_chain_event(log: &PrimLog, block_number: u64) -> Result<Option<ChainEvent>, String> {
	let Some(topic0) = log.topics().first() else {
		return Ok(None);
	};

	let event = if *topic0 == IRaffle::RaffleEnter::SIGNATURE_HASH {
		let decoded = IRaffle::RaffleEnter::decode_log(log, true)
			.map_err(|e| format!("Failed to decode RaffleEnter: {}", e))?;
		ChainEvent::PlayerEntered {
			player: decoded.player,
			block_number,
		}
	} else if *topic0 == IRaffle::RequestedRaffleWinner::SIGNATURE_HASH {
		let decoded = IRaffle::RequestedRaffleWinner::decode_log(log, true)
			.map_err(|e| format!("Failed to decode RequestedRaffleWinner: {}", e))?;
		ChainEvent::WinnerRequested {
			request_id: decoded.requestId,
			block_number,
		}
	} else if *topic0 == IRaffle::WinnerPicked::SIGNATURE_HASH {
		let decoded = IRaffle::WinnerPicked::decode_log(log, true)
			.map_err(|e| format!("Failed to decode WinnerPicked: {}", e))?;
		ChainEvent::WinnerPicked {
			winner: decoded.winner,
			block_number,
		}
	} else {
		return Ok(None);
	};

	Ok(Some(event))
}
