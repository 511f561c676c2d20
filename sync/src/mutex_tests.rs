use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use nimbus_lib::testing::{host_init, spawn, with_current};

use crate::mutex::Mutex;
use crate::wait::WaitRecord;

fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let start = Instant::now();
    while !cond() {
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "timed out waiting for: {what}"
        );
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn lock_unlock_round_trip() {
    with_current(0, || {
        let m = Mutex::new();
        assert!(!m.is_locked());
        m.lock();
        assert!(m.is_locked());
        assert!(m.owned());
        m.unlock();
        assert!(!m.is_locked());
        assert!(!m.owned());
    });
}

#[test]
fn try_lock_respects_holder() {
    let m = Arc::new(Mutex::new());
    let m2 = Arc::clone(&m);
    with_current(0, || {
        m.lock();
        let contender = spawn(1, move || m2.try_lock());
        assert!(!contender.join().unwrap());
        m.unlock();
    });
    let m3 = Arc::clone(&m);
    let t = spawn(1, move || {
        assert!(m3.try_lock());
        m3.unlock();
    });
    t.join().unwrap();
}

#[test]
fn contended_lock_hands_off_in_fifo_order() {
    let m = Arc::new(Mutex::new());
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let holder_m = Arc::clone(&m);
    let (hold_tx, hold_rx) = mpsc::channel::<()>();
    let holder = spawn(0, move || {
        holder_m.lock();
        hold_rx.recv().unwrap();
        holder_m.unlock();
    });
    wait_until("holder owns the mutex", || m.is_locked());

    let mut waiters = Vec::new();
    for id in 0..3u32 {
        let wm = Arc::clone(&m);
        let worder = Arc::clone(&order);
        waiters.push(spawn(id, move || {
            wm.lock();
            worder.lock().unwrap().push(id);
            wm.unlock();
        }));
        // Queue one waiter at a time so the arrival order is fixed.
        wait_until("waiter queued", || m.waiter_count() == id as usize + 1);
    }

    hold_tx.send(()).unwrap();
    holder.join().unwrap();
    for w in waiters {
        w.join().unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    assert!(!m.is_locked());
    assert_eq!(m.waiter_count(), 0);
}

#[test]
fn send_lock_grants_a_free_mutex_immediately() {
    host_init();
    let m = Arc::new(Mutex::new());
    let m2 = Arc::clone(&m);
    let (tx, rx) = mpsc::channel::<usize>();
    let recipient = spawn(0, move || {
        let wr = WaitRecord::for_current_thread();
        tx.send(&wr as *const WaitRecord as usize).unwrap();
        wr.wait(None);
        // The transfer landed before the wake; just record it.
        m2.receive_lock();
        assert!(m2.owned());
        m2.unlock();
    });
    let wr = rx.recv().unwrap() as *mut WaitRecord;
    // SAFETY: the recipient's frame lives until the wake this transfer
    // performs.
    unsafe { m.send_lock(wr) };
    recipient.join().unwrap();
    assert!(!m.is_locked());
}

#[test]
fn send_lock_queues_behind_a_holder() {
    let m = Arc::new(Mutex::new());
    let got = Arc::new(AtomicU32::new(0));

    let holder_m = Arc::clone(&m);
    let (hold_tx, hold_rx) = mpsc::channel::<()>();
    let holder = spawn(0, move || {
        holder_m.lock();
        hold_rx.recv().unwrap();
        holder_m.unlock();
    });
    wait_until("holder owns the mutex", || m.is_locked());

    let m2 = Arc::clone(&m);
    let got2 = Arc::clone(&got);
    let (tx, rx) = mpsc::channel::<usize>();
    let recipient = spawn(1, move || {
        let wr = WaitRecord::for_current_thread();
        tx.send(&wr as *const WaitRecord as usize).unwrap();
        wr.wait(None);
        m2.receive_lock();
        assert!(m2.owned());
        got2.store(1, Ordering::Release);
        m2.unlock();
    });
    let wr = rx.recv().unwrap() as *mut WaitRecord;
    // SAFETY: as above.
    unsafe { m.send_lock(wr) };

    // The transfer must not land while the holder still has the mutex.
    thread::sleep(Duration::from_millis(20));
    assert_eq!(got.load(Ordering::Acquire), 0);
    assert_eq!(m.waiter_count(), 1);

    hold_tx.send(()).unwrap();
    holder.join().unwrap();
    recipient.join().unwrap();
    assert_eq!(got.load(Ordering::Acquire), 1);
    assert!(!m.is_locked());
}

#[test]
fn unlock_by_non_owner_is_fatal() {
    let m = Arc::new(Mutex::new());
    let m2 = Arc::clone(&m);
    let holder = spawn(0, move || {
        m2.lock();
        // Keep holding until the test ends; the mutex is throwaway.
        thread::sleep(Duration::from_millis(50));
        m2.unlock();
    });
    wait_until("holder owns the mutex", || m.is_locked());
    let m3 = Arc::clone(&m);
    let intruder = spawn(1, move || m3.unlock());
    assert!(intruder.join().is_err());
    holder.join().unwrap();
}
