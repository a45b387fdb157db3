//! Outbox retry schedule tests

use bakery_backend::services::outbox::{backoff_delay, BACKOFF_SECS};

#[test]
fn backoff_follows_the_schedule() {
    for (i, secs) in BACKOFF_SECS.iter().enumerate() {
        assert_eq!(backoff_delay(i as i32 + 1).num_seconds(), *secs);
    }
}

#[test]
fn backoff_is_nondecreasing_and_capped() {
    let mut last = 0;
    for attempts in 1..20 {
        let secs = backoff_delay(attempts).num_seconds();
        assert!(secs >= last);
        assert!(secs <= *BACKOFF_SECS.last().unwrap());
        last = secs;
    }
}

#[test]
fn attempts_beyond_the_table_reuse_the_last_entry() {
    assert_eq!(
        backoff_delay(7).num_seconds(),
        *BACKOFF_SECS.last().unwrap()
    );
    assert_eq!(
        backoff_delay(100).num_seconds(),
        *BACKOFF_SECS.last().unwrap()
    );
}

#[test]
fn zero_attempts_clamp_to_the_first_entry() {
    assert_eq!(backoff_delay(0).num_seconds(), BACKOFF_SECS[0]);
}
