//! Scheduling constants for connectivity probing and queue replay.

/// Interval between remote reachability probes.
pub const CONNECTIVITY_PROBE_INTERVAL_SECS: u64 = 15;

/// Age after which another session may take over a replay claim.
pub const QUEUE_CLAIM_TTL_SECS: i64 = 300;

/// Capacity of the sync event broadcast channel.
pub const SYNC_EVENT_CHANNEL_CAPACITY: usize = 64;
