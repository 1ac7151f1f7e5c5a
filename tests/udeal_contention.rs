//! Two threads hammering one `Udeal` for 1000 grabs each: the shared
//! counter must land on exactly 2000 and no two grabs may ever
//! overlap, regardless of scheduling (worked example for fair
//! exclusive access under contention).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use upipe_core::upump::Udeal;

#[test]
fn two_threads_two_thousand_grabs_never_overlap() {
    const PER_THREAD: usize = 1000;

    let deal = Arc::new(Udeal::new());
    let counter = Arc::new(AtomicUsize::new(0));
    let inside = Arc::new(AtomicUsize::new(0));
    let max_concurrent = Arc::new(AtomicUsize::new(0));

    let spawn_worker = || {
        let deal = deal.clone();
        let counter = counter.clone();
        let inside = inside.clone();
        let max_concurrent = max_concurrent.clone();
        thread::spawn(move || {
            for _ in 0..PER_THREAD {
                let _guard = deal.grab();
                let concurrent = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(concurrent, Ordering::SeqCst);
                counter.fetch_add(1, Ordering::SeqCst);
                inside.fetch_sub(1, Ordering::SeqCst);
            }
        })
    };

    let a = spawn_worker();
    let b = spawn_worker();
    a.join().unwrap();
    b.join().unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 2 * PER_THREAD);
    assert_eq!(max_concurrent.load(Ordering::SeqCst), 1, "grabs overlapped under contention");
    assert_eq!(deal.waiters(), 0);
}
