//! Multi-threaded access to the dynamic tier, the context pool and the resolver

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cyclecache::cache::tier::PersistentStore;
use cyclecache::prelude::*;
use cyclecache::resolver::ExecutionContextPool;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const KEY_SPACE: u32 = 64;

fn key(i: u32) -> [f32; 4] {
    [i as f32, (i * 7 % 13) as f32, 0.25, -(i as f32)]
}

/// Run `body` on a helper thread and fail the test if it does not finish in time
fn with_deadline<F>(deadline: Duration, body: F)
where
    F: FnOnce() + Send + 'static,
{
    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    let worker = thread::spawn(move || {
        body();
        let _ = done_tx.send(());
    });
    match done_rx.recv_timeout(deadline) {
        Ok(()) => worker.join().unwrap(),
        Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
            // the body panicked; surface its panic
            worker.join().unwrap();
        }
        Err(crossbeam_channel::RecvTimeoutError::Timeout) => panic!("stress run did not complete, likely deadlock"),
    }
}

#[test]
fn test_random_interleaved_add_get_keeps_invariants() {
    with_deadline(Duration::from_secs(60), || {
        let cache = Arc::new(BoundedLruCache::without_fixed_tier(16, 4));
        let num_threads = 8;
        let ops_per_thread = 5_000;

        let handles: Vec<_> = (0..num_threads)
            .map(|thread_id| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(0xC0FFEE + thread_id as u64);
                    for _ in 0..ops_per_thread {
                        let i = rng.random_range(0..KEY_SPACE);
                        if rng.random_bool(0.5) {
                            cache.add(&key(i), i as f32).unwrap();
                        } else if let Some(value) = cache.get(&key(i)).unwrap() {
                            // first write wins and every writer stores the same value
                            assert_eq!(value, i as f32);
                        }
                        assert!(cache.size() <= cache.capacity());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.size() <= 16);
        cache.check_consistency().unwrap();
        let snapshot = cache.counter().snapshot();
        assert_eq!(snapshot.accesses, snapshot.hits + snapshot.misses);
    });
}

#[test]
fn test_concurrent_readers_of_fixed_tier() {
    let mut store = PersistentStore::new(4);
    for i in 0..KEY_SPACE {
        store.write_one(&key(i), i as f32 * 2.0);
    }
    let cache = Arc::new(BoundedLruCache::new(8, FixedTierCache::from_store(store)));

    let handles: Vec<_> = (0..8)
        .map(|thread_id| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for round in 0..1_000u32 {
                    let i = (thread_id * 7 + round) % KEY_SPACE;
                    assert_eq!(cache.get(&key(i)).unwrap(), Some(i as f32 * 2.0));
                    // fixed tier keys are never copied into the dynamic tier
                    cache.add(&key(i), -1.0).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.size(), 0);
    assert_eq!(cache.fixed().counter().hits(), 8 * 1_000);
    assert_eq!(cache.counter().accesses(), 0);
}

#[test]
fn test_context_pool_creates_one_context_per_thread_under_race() {
    let pool = Arc::new(ExecutionContextPool::new(2, 8, 100));
    let barrier = Arc::new(std::sync::Barrier::new(12));

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let first = pool.get_or_create().unwrap();
                for _ in 0..100 {
                    let again = pool.get_or_create().unwrap();
                    assert!(Arc::ptr_eq(&first, &again));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(pool.len(), 12);
}

struct SlowLinearPredictor {
    calls: AtomicUsize,
}

impl Predictor for SlowLinearPredictor {
    fn predict(&self, features: &[f32], scratch: &mut Vec<f32>) -> Result<f32, CacheOperationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        scratch.clear();
        scratch.extend_from_slice(features);
        Ok(scratch.iter().sum::<f32>() + 1.0)
    }
}

struct FieldEncoder;

impl FeatureEncoder for FieldEncoder {
    fn output_length(&self) -> usize {
        3
    }

    fn encode(&self, workload: &Workload) -> Vec<f32> {
        vec![
            workload.output.width as f32,
            workload.output.height as f32,
            workload.output.channels as f32,
        ]
    }
}

struct Passthrough;

impl OutputAdapter for Passthrough {
    fn adapt(&self, _workload: &Workload, raw_value: f32) -> f32 {
        raw_value
    }

    fn valid_interval(&self) -> (f32, f32) {
        (0.0, 1.0e9)
    }
}

#[test]
fn test_resolver_shared_across_threads() {
    with_deadline(Duration::from_secs(60), || {
        let predictor = Arc::new(SlowLinearPredictor {
            calls: AtomicUsize::new(0),
        });
        let resolver = Arc::new(
            CostResolver::builder()
                .model(predictor.clone(), Arc::new(FieldEncoder), Arc::new(Passthrough))
                .cache_capacity(1024)
                .build()
                .unwrap(),
        );

        let handles: Vec<_> = (0..6)
            .map(|thread_id| {
                let resolver = Arc::clone(&resolver);
                thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(thread_id);
                    for _ in 0..500 {
                        let channels = rng.random_range(1..32u32);
                        let device = if rng.random_bool(0.5) { VpuDevice::Vpu2_7 } else { VpuDevice::Npu5_0 };
                        let wl = Workload::new(
                            device,
                            Operation::Convolution,
                            Tensor::new(4, 4, 16, 1, DataType::Uint8),
                            Tensor::new(4, 4, channels, 1, DataType::Uint8),
                        );
                        let outcome = resolver.resolve(&wl);
                        assert_eq!(outcome.value(), Some(4 + 4 + channels + 1));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(resolver.context_pool().len(), 6);
        resolver.descriptor_cache().check_consistency().unwrap();
        resolver.workload_cache().check_consistency().unwrap();
        // 31 channel values on two devices; concurrent first misses may predict twice
        let calls = predictor.calls.load(Ordering::SeqCst);
        assert!(calls >= 62 && calls <= 62 * 6, "predictor ran {} times", calls);
    });
}
