//! 哈希桶与桶索引
//!
//! 每个桶持有一条基于下标的侵入式循环双向链表：节点 `0..nbuf` 是缓存块，
//! 节点 `nbuf + b` 是桶 `b` 的哨兵。链接存放在 [`BucketIndex`] 的节点数组里，
//! 只有持有节点所在桶的锁（即持有 [`BucketGuard`]）时才会读写，
//! 因此摘除和插入都是 O(1) 且不需要裸指针。

use super::buffer::BufId;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use spin::{Mutex, MutexGuard};

/// 链表节点链接
struct Link {
    prev: AtomicUsize,
    next: AtomicUsize,
}

impl Link {
    fn new(prev: usize, next: usize) -> Self {
        Self {
            prev: AtomicUsize::new(prev),
            next: AtomicUsize::new(next),
        }
    }

    fn prev(&self) -> usize {
        self.prev.load(Ordering::Relaxed)
    }

    fn next(&self) -> usize {
        self.next.load(Ordering::Relaxed)
    }

    fn set_prev(&self, node: usize) {
        self.prev.store(node, Ordering::Relaxed);
    }

    fn set_next(&self, node: usize) {
        self.next.store(node, Ordering::Relaxed);
    }
}

/// 桶：一把短锁，锁内数据是成员数量
struct Bucket {
    len: Mutex<usize>,
}

/// 桶索引：固定数量的桶 + 哈希函数
pub(crate) struct BucketIndex {
    buckets: Vec<Bucket>,
    links: Vec<Link>,
    nbuf: usize,
}

impl BucketIndex {
    /// 创建桶索引，全部 `nbuf` 个缓存块按 ID 顺序放入桶 0
    pub fn new(nbuf: usize, nbucket: usize) -> Self {
        let mut links = Vec::with_capacity(nbuf + nbucket);
        // 桶 0 的链表：head -> 0 -> 1 -> ... -> nbuf-1 -> head
        let head0 = nbuf;
        for id in 0..nbuf {
            let prev = if id == 0 { head0 } else { id - 1 };
            let next = if id + 1 == nbuf { head0 } else { id + 1 };
            links.push(Link::new(prev, next));
        }
        for b in 0..nbucket {
            let head = nbuf + b;
            if b == 0 && nbuf > 0 {
                links.push(Link::new(nbuf - 1, 0));
            } else {
                links.push(Link::new(head, head));
            }
        }

        let buckets = (0..nbucket)
            .map(|b| Bucket {
                len: Mutex::new(if b == 0 { nbuf } else { 0 }),
            })
            .collect();

        Self {
            buckets,
            links,
            nbuf,
        }
    }

    /// 桶数量
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// 块号 -> 桶下标
    ///
    /// 纯函数，在缓存生命周期内保持稳定。
    #[inline]
    pub fn bucket_of(&self, blockno: u32) -> usize {
        blockno as usize % self.buckets.len()
    }

    /// 跨桶窃取的访问顺序：从 `home` 的下一个桶开始循环，跳过 `home` 本身
    ///
    /// 每次未命中都使用同一个确定性顺序，每个其他桶恰好访问一次。
    pub fn steal_order(&self, home: usize) -> impl Iterator<Item = usize> {
        let n = self.buckets.len();
        (1..n).map(move |k| (home + k) % n)
    }

    /// 获取桶锁
    pub fn lock(&self, bucket: usize) -> BucketGuard<'_> {
        BucketGuard {
            bucket,
            head: self.nbuf + bucket,
            len: self.buckets[bucket].len.lock(),
            links: &self.links,
        }
    }
}

/// 持有桶锁期间对该桶链表的访问权
pub(crate) struct BucketGuard<'a> {
    bucket: usize,
    head: usize,
    len: MutexGuard<'a, usize>,
    links: &'a [Link],
}

impl<'a> BucketGuard<'a> {
    /// 桶下标
    pub fn index(&self) -> usize {
        self.bucket
    }

    /// 成员数量
    pub fn len(&self) -> usize {
        *self.len
    }

    /// 按扫描顺序（从哨兵的 next 开始）遍历成员
    pub fn iter(&self) -> Members<'_> {
        Members {
            links: self.links,
            head: self.head,
            cur: self.links[self.head].next(),
        }
    }

    /// 从本桶摘除缓存块
    pub fn unlink(&mut self, id: BufId) {
        debug_assert!(self.iter().any(|m| m == id), "unlink: buffer not in bucket");
        let link = &self.links[id];
        let (prev, next) = (link.prev(), link.next());
        self.links[prev].set_next(next);
        self.links[next].set_prev(prev);
        link.set_prev(id);
        link.set_next(id);
        *self.len -= 1;
    }

    /// 将缓存块插入本桶链表头部
    ///
    /// 调用者必须先把它从原来的桶摘除。
    pub fn push_front(&mut self, id: BufId) {
        let first = self.links[self.head].next();
        self.links[id].set_prev(self.head);
        self.links[id].set_next(first);
        self.links[first].set_prev(id);
        self.links[self.head].set_next(id);
        *self.len += 1;
    }
}

/// 桶成员迭代器
pub(crate) struct Members<'a> {
    links: &'a [Link],
    head: usize,
    cur: usize,
}

impl Iterator for Members<'_> {
    type Item = BufId;

    fn next(&mut self) -> Option<BufId> {
        if self.cur == self.head {
            return None;
        }
        let id = self.cur;
        self.cur = self.links[id].next();
        Some(id)
    }
}
