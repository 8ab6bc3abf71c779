use thiserror::Error;

/// Cache-tier failure. For admission paths this is surfaced as "try again";
/// for broadcast/lifecycle paths it is logged and the tick is skipped
/// (spec §7).
#[derive(Debug, Error)]
#[error("cache store error: {0}")]
pub struct StoreError(#[from] pub anyhow::Error);

/// Archive sink failure at finalization. Logged; the session is still
/// marked ENDED and cache data survives the post-reveal TTL window for
/// out-of-band recovery (spec §7, §9 open question).
#[derive(Debug, Error)]
#[error("archive write failed: {0}")]
pub struct ArchiveError(#[from] pub anyhow::Error);
