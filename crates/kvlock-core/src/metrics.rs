// Metrics for lock acquisition and release
// Recorded through the `metrics` facade; nothing is exported unless the host installs a recorder

use std::time::Duration;

use kvlock_common::{OutcomeLabel, metric};
use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Initialize all metric descriptions
/// Should be called once at application startup
pub fn init_metrics() {
    describe_counter!(
        metric::ACQUIRE_TOTAL,
        "Total number of lock acquisitions by result"
    );
    describe_histogram!(
        metric::ACQUIRE_WAIT_SECONDS,
        "Time spent acquiring a lock in seconds"
    );
    describe_counter!(
        metric::RELEASE_TOTAL,
        "Total number of lock releases by result"
    );
}

pub(crate) fn record_acquire(result: OutcomeLabel, waited: Duration) {
    counter!(metric::ACQUIRE_TOTAL, "result" => result.as_str()).increment(1);
    histogram!(metric::ACQUIRE_WAIT_SECONDS).record(waited.as_secs_f64());
}

pub(crate) fn record_release(result: OutcomeLabel) {
    counter!(metric::RELEASE_TOTAL, "result" => result.as_str()).increment(1);
}
