use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
	A,
	B,
}

impl Choice {
	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"boy" | "a" | "A" => Some(Choice::A),
			"girl" | "b" | "B" => Some(Choice::B),
			_ => None,
		}
	}
}

/// countA + countB == |VoterSet| at every observable state (spec §3 invariant).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCount {
	pub count_a: u64,
	pub count_b: u64,
}

impl VoteCount {
	pub fn total(&self) -> u64 {
		self.count_a + self.count_b
	}
}

/// Individual vote event, retained (most recent 100 per session) for
/// reconnection hydration and published immediately on `vote-events/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
	pub voter_id: String,
	pub name: String,
	pub choice: Choice,
	pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn total_sums_both_choices() {
		let counts = VoteCount { count_a: 2, count_b: 1 };
		assert_eq!(counts.total(), 3);
	}
}
