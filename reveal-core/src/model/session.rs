use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The hidden choice revealed at `reveal_time`. Named `Outcome` rather than
/// the source domain's "gender" since the core treats it as an opaque A/B
/// value (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
	A,
	B,
}

impl Outcome {
	pub fn as_str(&self) -> &'static str {
		match self {
			Outcome::A => "boy",
			Outcome::B => "girl",
		}
	}

	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"boy" | "a" | "A" => Some(Outcome::A),
			"girl" | "b" | "B" => Some(Outcome::B),
			_ => None,
		}
	}
}

/// Lifecycle status. Transitions are monotone: WAITING -> LIVE -> ENDED.
/// No backward transitions (spec §3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
	Waiting,
	Live,
	Ended,
}

impl Status {
	/// Whether `self -> next` is a legal forward transition.
	pub fn can_advance_to(self, next: Status) -> bool {
		matches!(
			(self, next),
			(Status::Waiting, Status::Live)
				| (Status::Waiting, Status::Ended)
				| (Status::Live, Status::Ended)
		)
	}
}

/// The unit of a single reveal event. Created by the HTTP layer; mutated
/// only by the Lifecycle Controller's status transitions (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
	pub session_id: String,
	pub owner_id: String,
	pub outcome: Outcome,
	pub status: Status,
	pub reveal_time: DateTime<Utc>,
	pub created_at: DateTime<Utc>,
}

impl Session {
	pub fn new(session_id: String, owner_id: String, outcome: Outcome, reveal_time: DateTime<Utc>, created_at: DateTime<Utc>) -> Self {
		Self { session_id, owner_id, outcome, status: Status::Waiting, reveal_time, created_at }
	}

	/// Outcome is visible to clients only once the session has ended (spec §3).
	pub fn visible_outcome(&self) -> Option<Outcome> {
		(self.status == Status::Ended).then_some(self.outcome)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_transitions_are_monotone() {
		assert!(Status::Waiting.can_advance_to(Status::Live));
		assert!(Status::Waiting.can_advance_to(Status::Ended));
		assert!(Status::Live.can_advance_to(Status::Ended));
		assert!(!Status::Live.can_advance_to(Status::Waiting));
		assert!(!Status::Ended.can_advance_to(Status::Live));
		assert!(!Status::Ended.can_advance_to(Status::Waiting));
	}

	#[test]
	fn outcome_hidden_until_ended() {
		let mut session = Session::new(
			"s1".into(),
			"owner".into(),
			Outcome::A,
			Utc::now(),
			Utc::now(),
		);
		assert_eq!(session.visible_outcome(), None);
		session.status = Status::Live;
		assert_eq!(session.visible_outcome(), None);
		session.status = Status::Ended;
		assert_eq!(session.visible_outcome(), Some(Outcome::A));
	}

	#[test]
	fn outcome_parses_source_domain_strings() {
		assert_eq!(Outcome::parse("boy"), Some(Outcome::A));
		assert_eq!(Outcome::parse("girl"), Some(Outcome::B));
		assert_eq!(Outcome::parse("nonsense"), None);
	}
}
