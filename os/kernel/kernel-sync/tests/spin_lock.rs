use kernel_sync::SpinLock;
use kernel_sync::context::hosted;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::{panic, thread};

#[test]
fn basic_lock_and_raii() {
    hosted::install();
    let l = SpinLock::new(0_u32);

    {
        let mut g = l.lock();
        *g = 41;
    }

    // lock again; previous drop must have unlocked
    {
        let mut g = l.lock();
        *g += 1;
        assert_eq!(*g, 42);
    }
}

#[test]
fn try_lock_semantics() {
    hosted::install();
    let l = SpinLock::new(1u8);

    let g1 = l.try_lock();
    assert!(g1.is_some());
    assert_eq!(**g1.as_ref().unwrap(), 1);

    // while held, try_lock must fail
    assert!(l.try_lock().is_none());

    drop(g1);
    assert!(l.try_lock().is_some());
}

#[test]
fn with_lock_works_and_unlocks() {
    hosted::install();
    let l = SpinLock::new(String::from("a"));
    let len = l.with_lock(|s| {
        s.push('b');
        s.len()
    });
    assert_eq!(len, 2);

    let got = l.with_lock(|s| s.clone());
    assert_eq!(got, "ab");
}

#[test]
fn get_mut_allows_direct_mutation() {
    let mut l = SpinLock::new(vec![1, 2, 3]);
    l.get_mut().push(4);
    assert_eq!(l.lock().as_slice(), &[1, 2, 3, 4]);
}

#[test]
fn contended_increments_are_exact_and_exclusive() {
    hosted::install();
    let threads = 8;
    let iters = 5_000;

    let lock = Arc::new(SpinLock::new(0usize));
    let in_cs = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(threads));

    let mut handles = Vec::with_capacity(threads);
    for _ in 0..threads {
        let lock = Arc::clone(&lock);
        let in_cs = Arc::clone(&in_cs);
        let start = Arc::clone(&start);
        handles.push(thread::spawn(move || {
            start.wait();
            for _ in 0..iters {
                lock.with_lock(|v| {
                    let prev = in_cs.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(prev, 0, "mutual exclusion violated");
                    *v += 1;
                    in_cs.fetch_sub(1, Ordering::SeqCst);
                });
                thread::yield_now();
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(lock.with_lock(|v| *v), threads * iters);
    assert_eq!(in_cs.load(Ordering::SeqCst), 0);
}

#[test]
fn holder_is_visible_only_to_its_own_thread() {
    hosted::install();
    let lock = Arc::new(SpinLock::named("probe", ()));
    let held = Arc::new(Barrier::new(2));
    let checked = Arc::new(Barrier::new(2));

    let holder = {
        let lock = Arc::clone(&lock);
        let held = Arc::clone(&held);
        let checked = Arc::clone(&checked);
        thread::spawn(move || {
            let g = lock.lock();
            assert!(lock.is_held_by_current_context());
            held.wait();
            checked.wait();
            drop(g);
        })
    };

    held.wait();
    assert!(lock.is_locked());
    assert!(!lock.is_held_by_current_context());
    checked.wait();
    holder.join().unwrap();

    let _g = lock.lock();
    assert!(lock.is_held_by_current_context());
}

#[test]
fn recursive_acquire_panics_and_releases() {
    hosted::install();
    let l = SpinLock::named("outer", 5_u32);

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let _g = l.lock();
        let _again = l.lock();
    }));
    assert!(res.is_err(), "expected recursive acquire to panic");

    assert!(!l.is_locked());
    assert_eq!(l.with_lock(|v| *v), 5);
}

#[test]
fn lock_is_released_on_panic() {
    hosted::install();
    let l = SpinLock::new(0u32);

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        l.with_lock(|v| {
            *v = 123;
            panic!("boom");
        });
    }));
    assert!(res.is_err(), "expected panic");

    assert_eq!(l.with_lock(|v| *v), 123);
}

/// Spot-check a concrete instantiation compiles as Sync.
#[test]
fn spinlock_is_sync_for_send_t() {
    fn takes_sync<S: Sync>(_s: &S) {}
    let l = SpinLock::new(0u8);
    takes_sync(&l);
}
