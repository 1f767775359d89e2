//! 多执行上下文并发测试
//!
//! 覆盖一致性（同一个块解析到同一个缓存块）、独占锁阻塞、并发未命中与跨桶窃取
//! 下的计数正确性，以及结束后的单一桶成员关系。

use bcache_core::{BlockKey, BufferCache, CacheConfig, MemDisk, TickClock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const BLOCK_SIZE: usize = 64;

fn new_cache(capacity: usize, buckets: usize) -> BufferCache<Arc<MemDisk>, Arc<TickClock>> {
    let config = CacheConfig {
        capacity,
        buckets,
        block_size: BLOCK_SIZE,
    };
    BufferCache::new(
        config,
        Arc::new(MemDisk::new(BLOCK_SIZE)),
        Arc::new(TickClock::new()),
    )
    .unwrap()
}

fn counter(data: &[u8]) -> u32 {
    u32::from_le_bytes(data[..4].try_into().unwrap())
}

#[test]
fn test_second_acquire_blocks_until_release() {
    let cache = new_cache(4, 13);
    let holding = AtomicBool::new(false);
    let released = AtomicBool::new(false);

    thread::scope(|s| {
        let first = s.spawn(|| {
            let buf = cache.acquire(1, 20);
            holding.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            released.store(true, Ordering::SeqCst);
            let id = buf.id();
            buf.release();
            id
        });

        let second = s.spawn(|| {
            while !holding.load(Ordering::SeqCst) {
                thread::yield_now();
            }
            let buf = cache.acquire(1, 20);
            // 独占锁只有在第一个持有者释放之后才能拿到
            assert!(released.load(Ordering::SeqCst));
            buf.id()
        });

        assert_eq!(first.join().unwrap(), second.join().unwrap());
    });

    assert_eq!(cache.lookup(1, 20).unwrap().refcnt, 0);
}

#[test]
fn test_concurrent_increments_are_coherent() {
    const THREADS: usize = 4;
    const ROUNDS: usize = 200;
    const BLOCKS: u32 = 40;

    // 每个线程同时最多持有一个缓存块，容量足够时不会耗尽
    let cache = new_cache(8, 13);
    let done = AtomicUsize::new(0);

    thread::scope(|s| {
        for t in 0..THREADS {
            let cache = &cache;
            let done = &done;
            s.spawn(move || {
                let mut seed = 0x9E37_79B9u32.wrapping_mul(t as u32 + 1);
                for _ in 0..ROUNDS {
                    seed ^= seed << 13;
                    seed ^= seed >> 17;
                    seed ^= seed << 5;
                    let blockno = seed % BLOCKS;

                    let mut buf = cache.read(1, blockno).unwrap();
                    let next = counter(&buf) + 1;
                    buf[..4].copy_from_slice(&next.to_le_bytes());
                    buf.flush().unwrap();
                    buf.release();
                    cache.clock().tick();
                    done.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });

    assert_eq!(done.load(Ordering::Relaxed), THREADS * ROUNDS);

    // 每次递增都在独占锁下完成并写回，设备上的总和等于总轮数
    let total: u32 = (0..BLOCKS)
        .map(|b| {
            cache
                .disk()
                .snapshot(BlockKey::new(1, b))
                .map(|data| counter(&data))
                .unwrap_or(0)
        })
        .sum();
    assert_eq!(total as usize, THREADS * ROUNDS);

    let stats = cache.stats();
    assert_eq!(stats.exhaustions, 0);
    assert_eq!(stats.disk_writes as usize, THREADS * ROUNDS);

    // 每个缓存块恰好属于一个桶，且位于其块号对应的桶；每个块最多缓存一份
    let mut seen_ids = HashSet::new();
    let mut seen_keys = HashSet::new();
    for bucket in 0..cache.bucket_count() {
        for info in cache.bucket_members(bucket) {
            assert!(seen_ids.insert(info.id), "buffer {} in two buckets", info.id);
            assert_eq!(info.refcnt, 0);
            if info.key.dev == 1 {
                assert_eq!(cache.bucket_of(info.key.blockno), bucket);
                assert!(seen_keys.insert(info.key), "{} cached twice", info.key);
            }
        }
    }
    assert_eq!(seen_ids.len(), cache.capacity());
}

#[test]
fn test_concurrent_misses_on_same_block_share_buffer() {
    const THREADS: usize = 6;

    let cache = new_cache(THREADS, 13);
    let ids: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let cache = &cache;
                s.spawn(move || {
                    let buf = cache.read(3, 77).unwrap();
                    buf.id()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.disk_reads, 1);
    assert_eq!(cache.lookup(3, 77).unwrap().refcnt, 0);
}

#[test]
fn test_exhaustion_with_held_buffers_does_not_corrupt() {
    const CAPACITY: usize = 5;
    let cache = new_cache(CAPACITY, 3);

    let held: Vec<_> = (0..CAPACITY as u32)
        .map(|b| cache.read(1, b).unwrap())
        .collect();

    let err = thread::scope(|s| s.spawn(|| cache.try_acquire(1, 1000).err()).join().unwrap());
    assert!(err.is_some());

    let result = thread::scope(|s| {
        s.spawn(|| {
            let _buf = cache.acquire(1, 1001);
        })
        .join()
    });
    assert!(result.is_err(), "acquire on an exhausted pool must abort");

    for buf in &held {
        assert_eq!(cache.lookup(1, buf.blockno()).unwrap().id, buf.id());
    }
    drop(held);
    assert!(cache.try_acquire(1, 1000).is_ok());
}
