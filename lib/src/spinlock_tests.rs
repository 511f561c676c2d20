use std::sync::Arc;
use std::thread;

use crate::spinlock::SpinMutex;

#[test]
fn uncontended_lock_round_trip() {
    let m = SpinMutex::new(41u32);
    assert!(!m.is_locked());
    {
        let mut g = m.lock();
        *g += 1;
        assert!(m.is_locked());
    }
    assert!(!m.is_locked());
    assert_eq!(*m.lock(), 42);
}

#[test]
fn try_lock_fails_while_held() {
    let m = SpinMutex::new(());
    let g = m.lock();
    assert!(m.try_lock().is_none());
    drop(g);
    assert!(m.try_lock().is_some());
}

#[test]
fn counter_survives_contention() {
    const THREADS: usize = 8;
    const INCREMENTS: usize = 10_000;

    let m = Arc::new(SpinMutex::new(0usize));
    let mut handles = std::vec::Vec::new();
    for _ in 0..THREADS {
        let m = Arc::clone(&m);
        handles.push(thread::spawn(move || {
            for _ in 0..INCREMENTS {
                *m.lock() += 1;
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(*m.lock(), THREADS * INCREMENTS);
}

#[test]
fn guard_releases_on_drop_under_contention() {
    let m = Arc::new(SpinMutex::new(0u32));
    let held = m.lock();
    let m2 = Arc::clone(&m);
    let waiter = thread::spawn(move || {
        *m2.lock() = 7;
    });
    // The waiter is queued behind our ticket until the guard drops.
    assert_eq!(*held, 0);
    drop(held);
    waiter.join().unwrap();
    assert_eq!(*m.lock(), 7);
}
