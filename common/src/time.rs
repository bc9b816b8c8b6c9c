// Time helpers for transaction and query creation stamps.
//
// Two transactions with identical commands built in the same millisecond
// would share a hash and the network would treat the second one as a replay.
// Creation stamps are therefore strictly increasing within a process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Millis timestamps used to determine it using its type
pub type TimestampMillis = u64;

static LAST_CREATED_TIME: AtomicU64 = AtomicU64::new(0);

#[inline]
pub fn get_current_time() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

#[inline]
pub fn get_current_time_in_millis() -> TimestampMillis {
    get_current_time().as_millis() as TimestampMillis
}

// Wall clock in millis, bumped so that every call returns a fresh value
pub fn next_created_time() -> TimestampMillis {
    let now = get_current_time_in_millis();
    let mut last = LAST_CREATED_TIME.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_CREATED_TIME.compare_exchange_weak(
            last,
            candidate,
            Ordering::SeqCst,
            Ordering::Relaxed,
        ) {
            Ok(_) => return candidate,
            Err(current) => last = current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_time_strictly_increasing() {
        let mut previous = next_created_time();
        for _ in 0..1000 {
            let next = next_created_time();
            assert!(next > previous);
            previous = next;
        }
    }
}
