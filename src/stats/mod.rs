//! Player statistics cache: freshness policy, refresh orchestration, bulk
//! refresh and the hidden-match overlay.

pub mod cache;
pub mod freshness;
pub mod overlay;
pub mod scheduler;
pub mod traits;
pub mod types;

pub use cache::StatsCache;
pub use freshness::{DEFAULT_TTL, Freshness};
pub use scheduler::{BulkItemError, BulkReport, run_bulk_refresh};
pub use traits::{Clock, StatsSource, StatsStore, SystemClock};
pub use types::{
    CachedPlayerStats, DisplayIdentity, MAX_RECENT_MATCHES, MatchResult, OwnerKey, PlayerKey,
    RankedStanding, StatsView, Timestamp,
};
