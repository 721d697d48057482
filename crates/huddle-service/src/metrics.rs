//! Prometheus metrics for group coordination.

use metrics::{counter, describe_counter};

/// Metric names for the group service.
pub mod names {
    /// Cache lookups answered from the cache.
    pub const CACHE_HITS_TOTAL: &str = "huddle_cache_hits_total";
    /// Cache lookups that fell through to the store.
    pub const CACHE_MISSES_TOTAL: &str = "huddle_cache_misses_total";
    /// Cache keys that could not be refreshed or evicted.
    pub const CACHE_FANOUT_FAILURES_TOTAL: &str = "huddle_cache_fanout_failures_total";
    /// Completed coordinator operations, labelled by operation and outcome.
    pub const GROUP_OPERATIONS_TOTAL: &str = "huddle_group_operations_total";
    /// Groups created lazily or by eviction.
    pub const GROUPS_CREATED_TOTAL: &str = "huddle_groups_created_total";
    /// Groups deleted after their last member joined elsewhere.
    pub const GROUPS_DELETED_TOTAL: &str = "huddle_groups_deleted_total";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::CACHE_HITS_TOTAL, "Total number of group cache hits");
    describe_counter!(names::CACHE_MISSES_TOTAL, "Total number of group cache misses");
    describe_counter!(
        names::CACHE_FANOUT_FAILURES_TOTAL,
        "Total number of cache keys left stale after a failed refresh"
    );
    describe_counter!(
        names::GROUP_OPERATIONS_TOTAL,
        "Total number of group operations by outcome"
    );
    describe_counter!(names::GROUPS_CREATED_TOTAL, "Total number of groups created");
    describe_counter!(names::GROUPS_DELETED_TOTAL, "Total number of groups deleted");
}

/// Group service metrics recorder.
#[derive(Clone, Copy, Debug)]
pub struct GroupMetrics;

impl GroupMetrics {
    /// Record a cache lookup.
    pub fn cache_lookup(kind: &'static str, hit: bool) {
        let name = if hit {
            names::CACHE_HITS_TOTAL
        } else {
            names::CACHE_MISSES_TOTAL
        };
        counter!(name, "kind" => kind).increment(1);
    }

    /// Record a finished operation.
    pub fn operation(operation: &'static str, outcome: &'static str) {
        counter!(
            names::GROUP_OPERATIONS_TOTAL,
            "operation" => operation,
            "outcome" => outcome
        )
        .increment(1);
    }

    /// Record a group creation.
    pub fn group_created(reason: &'static str) {
        counter!(names::GROUPS_CREATED_TOTAL, "reason" => reason).increment(1);
    }

    /// Record a group deletion.
    pub fn group_deleted() {
        counter!(names::GROUPS_DELETED_TOTAL).increment(1);
    }
}
