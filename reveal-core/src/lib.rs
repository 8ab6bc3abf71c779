//! Session runtime for time-boxed reveal voting sessions: components A-J
//! (Cache Store Adapter, Archive Sink, Rate Limiter, Session Repository,
//! Active Session Registry, Vote Engine, Chat Engine, Lifecycle Controller,
//! Broadcast Scheduler, Publisher Port). No HTTP or websocket framing lives
//! here; transports implement the `Publisher` trait and drive `VoteEngine`
//! and `ChatEngine` from their own request handlers.

pub mod archive;
pub mod broadcast;
pub mod chat_engine;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod publisher;
pub mod rate_limiter;
pub mod registry;
pub mod repository;
pub mod sanitize;
pub mod store;
pub mod vote_engine;

pub use archive::{ArchiveSink, FileArchiveSink, SessionArchive};
pub use broadcast::BroadcastScheduler;
pub use chat_engine::{ChatEngine, ChatOutcome};
pub use config::RuntimeConfig;
pub use lifecycle::LifecycleController;
pub use publisher::Publisher;
pub use rate_limiter::RateLimiter;
pub use registry::ActiveSessionRegistry;
pub use repository::SessionRepository;
pub use store::{CacheStore, RedisCacheStore};
pub use vote_engine::{VoteEngine, VoteOutcome};
