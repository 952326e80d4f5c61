use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use bsb_gate_lib::security::rate_limit::{
    ManualClock, RateLimitPolicy, RateLimitResult, RateLimiter, SlidingWindowCounter,
};
use bsb_gate_lib::security::{identify, ClientKey};
use bsb_gate_lib::GateError;

fn limiter(max_requests: u32, window_seconds: u64) -> (RateLimiter, ManualClock) {
    let clock = ManualClock::new(0);
    let policy = RateLimitPolicy::new(max_requests, window_seconds).expect("valid policy");
    let limiter =
        RateLimiter::with_counter(SlidingWindowCounter::new(policy), Arc::new(clock.clone()));
    (limiter, clock)
}

fn key(name: &str) -> ClientKey {
    identify(name, "test-agent")
}

#[test]
fn test_two_per_minute_scenario() {
    let (limiter, clock) = limiter(2, 60);
    let client = key("10.0.0.1");

    assert!(limiter.check(&client).is_allowed());

    clock.set(10);
    assert!(limiter.check(&client).is_allowed());

    clock.set(20);
    match limiter.check(&client) {
        RateLimitResult::Limited { limit, window, retry_after } => {
            assert_eq!(limit, 2);
            assert_eq!(window, Duration::from_secs(60));
            assert_eq!(retry_after, Duration::from_secs(60));
        }
        other => panic!("expected Limited, got {other:?}"),
    }

    // Only the t=10 entry is still inside [1, 61]
    clock.set(61);
    assert!(limiter.check(&client).is_allowed());
    assert_eq!(limiter.counter().count(&client, 61), 2);
}

#[test]
fn test_limit_plus_one_at_fixed_instant() {
    for max in [1u32, 3, 10] {
        let (limiter, _clock) = limiter(max, 60);
        let client = key("10.0.0.2");
        for i in 0..max {
            let result = limiter.check(&client);
            assert!(result.is_allowed(), "request {i} of {max} should pass");
            assert_eq!(result.remaining(), max - i - 1);
        }
        assert!(limiter.check(&client).is_limited());
    }
}

#[test]
fn test_rejected_requests_are_not_recorded() {
    let (limiter, clock) = limiter(2, 60);
    let client = key("10.0.0.3");
    assert!(limiter.check(&client).is_allowed());
    assert!(limiter.check(&client).is_allowed());
    for _ in 0..50 {
        assert!(limiter.check(&client).is_limited());
    }
    assert_eq!(limiter.counter().count(&client, 0), 2);

    clock.set(61);
    assert!(limiter.check(&client).is_allowed());
    assert!(limiter.check(&client).is_allowed());
}

#[test]
fn test_window_slides_after_full_window() {
    let (limiter, clock) = limiter(5, 30);
    let client = key("10.0.0.4");
    for _ in 0..5 {
        assert!(limiter.check(&client).is_allowed());
    }
    assert!(limiter.check(&client).is_limited());

    clock.set(31);
    assert_eq!(limiter.counter().count(&client, 31), 0);
    assert!(limiter.check(&client).is_allowed());
}

#[test]
fn test_distinct_clients_are_independent() {
    let (limiter, _clock) = limiter(1, 60);
    let first = key("10.0.0.5");
    let second = key("10.0.0.6");
    let same_ip_other_agent = identify("10.0.0.5", "other-agent");

    assert!(limiter.check(&first).is_allowed());
    assert!(limiter.check(&first).is_limited());
    assert!(limiter.check(&second).is_allowed());
    assert!(limiter.check(&same_ip_other_agent).is_allowed());
}

#[test]
fn test_zero_policy_is_rejected() {
    assert!(matches!(RateLimitPolicy::new(0, 60), Err(GateError::Config(_))));
    assert!(matches!(RateLimitPolicy::new(10, 0), Err(GateError::Config(_))));
}

#[test]
fn test_concurrent_callers_admit_exactly_the_limit() {
    const THREADS: usize = 16;
    const PER_THREAD: usize = 25;
    const LIMIT: u32 = 37;

    let policy = RateLimitPolicy::new(LIMIT, 60).expect("valid policy");
    let counter = Arc::new(SlidingWindowCounter::with_capacity(policy, 1024, 8));
    let barrier = Arc::new(Barrier::new(THREADS));
    let admitted = Arc::new(AtomicUsize::new(0));
    let client = key("10.0.0.7");

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let counter = Arc::clone(&counter);
            let barrier = Arc::clone(&barrier);
            let admitted = Arc::clone(&admitted);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..PER_THREAD {
                    if counter.try_admit(&client, 100) {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker thread panicked");
    }

    assert_eq!(admitted.load(Ordering::SeqCst), LIMIT as usize);
    assert_eq!(counter.count(&client, 100), LIMIT as usize);
}

#[test]
fn test_concurrent_distinct_clients_do_not_interfere() {
    const THREADS: usize = 8;
    const LIMIT: u32 = 10;

    let policy = RateLimitPolicy::new(LIMIT, 60).expect("valid policy");
    let counter = Arc::new(SlidingWindowCounter::new(policy));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let counter = Arc::clone(&counter);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let client = key(&format!("192.168.1.{i}"));
                barrier.wait();
                (0..LIMIT * 2).filter(|_| counter.try_admit(&client, 5)).count()
            })
        })
        .collect();

    for handle in handles {
        let admitted = handle.join().expect("worker thread panicked");
        assert_eq!(admitted, LIMIT as usize);
    }
    assert_eq!(counter.tracked_clients(), THREADS);
}

#[test]
fn test_table_stays_bounded() {
    let policy = RateLimitPolicy::new(5, 60).expect("valid policy");
    let counter = SlidingWindowCounter::with_capacity(policy, 64, 4);
    for i in 0..1000 {
        assert!(counter.try_admit(&key(&format!("172.16.0.{i}")), 10));
    }
    assert!(counter.tracked_clients() <= 64);
}
