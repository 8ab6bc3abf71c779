mod chat;
mod session;
mod vote;

pub use chat::ChatMessage;
pub use session::{Outcome, Session, Status};
pub use vote::{Choice, VoteCount, VoteRecord};
