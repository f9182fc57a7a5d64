//! 索引跟踪的最小堆与事件对象池
//! Index-tracked min-heap and event pool
//!
//! 堆中只存储对象池的索引；每个事件记录自己在堆数组中的位置，
//! 使得按句柄删除和更新都是O(log n)而不需要线性扫描。已完成或
//! 被取消的事件进入空闲栈等待复用，而不是被释放。
//!
//! The heap stores pool indices only; every event records its own position
//! in the heap array, so removal and update by handle are O(log n) with no
//! linear scan. Finished or cancelled events go onto a free stack for reuse
//! instead of being deallocated.

use crate::timer::event::{Event, EventHandle, EventInfo, ExpireFn};
use std::time::Duration;
use tokio::time::Instant;

/// The live heap plus the recycling pool backing one slot timer. Not
/// thread-safe on its own; the owning timer wraps it in a mutex.
///
/// 支撑一个槽位定时器的存活堆与回收池。自身不保证线程安全；
/// 由所属定时器用互斥锁包装。
pub(crate) struct EventHeap {
    /// Backing storage for all events ever allocated by this timer.
    /// 该定时器分配过的所有事件的底层存储。
    events: Vec<Event>,
    /// Min-heap of pool indices, ordered by `expire`. Ties are broken by
    /// arbitrary heap-insertion order; callers must not rely on stability.
    /// 按 `expire` 排序的对象池索引最小堆。相同到期时间的顺序由
    /// 堆插入顺序随意决定；调用方不得依赖其稳定性。
    heap: Vec<usize>,
    /// Stack of recycled pool indices available for the next allocation.
    /// 可供下次分配使用的已回收对象池索引栈。
    free: Vec<usize>,
}

impl EventHeap {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            heap: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Number of live events.
    /// 存活事件的数量。
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Takes a parked event from the free stack (or grows the pool), fills
    /// it in, and pushes it into the heap. Returns the pool index and the
    /// slot generation backing the issued handle.
    ///
    /// 从空闲栈取出一个停放的事件（或扩展对象池），填充字段并压入堆。
    /// 返回对象池索引和签发句柄所依据的槽位代数。
    pub fn alloc(
        &mut self,
        ttl: Duration,
        expire: Instant,
        callback: ExpireFn,
        slot_pos: usize,
        round: u64,
    ) -> (usize, u64) {
        let index = match self.free.pop() {
            Some(index) => {
                let ev = &mut self.events[index];
                ev.ttl = ttl;
                ev.expire = expire;
                ev.callback = Some(callback);
                ev.slot_pos = slot_pos;
                ev.round = round;
                ev.cron = false;
                ev.in_use = true;
                index
            }
            None => {
                self.events.push(Event {
                    ttl,
                    expire,
                    callback: Some(callback),
                    slot_pos,
                    heap_index: 0,
                    round,
                    cron: false,
                    generation: 0,
                    in_use: true,
                });
                self.events.len() - 1
            }
        };

        let pos = self.heap.len();
        self.heap.push(index);
        self.events[index].heap_index = pos;
        self.sift_up(pos);

        (index, self.events[index].generation)
    }

    /// Whether the handle coordinates still refer to a live event.
    /// 句柄坐标是否仍指向一个存活事件。
    pub fn is_live(&self, index: usize, generation: u64) -> bool {
        self.events
            .get(index)
            .is_some_and(|ev| ev.in_use && ev.generation == generation)
    }

    /// Removes a live event from its current heap position and recycles it.
    /// The caller must have verified liveness under the same lock.
    ///
    /// 将存活事件从其当前堆位置移除并回收。调用方必须已在同一把锁下
    /// 验证过存活性。
    pub fn remove(&mut self, index: usize) -> bool {
        if !self.events[index].in_use {
            return false;
        }
        let pos = self.events[index].heap_index;
        let last = self.heap.len() - 1;
        if pos != last {
            self.swap_entries(pos, last);
            self.heap.pop();
            // The element swapped into `pos` may violate the order in either
            // direction; at most one of the two sifts will move it.
            self.sift_down(pos);
            self.sift_up(pos);
        } else {
            self.heap.pop();
        }
        self.recycle(index);
        true
    }

    /// Moves a live event to a new deadline and restores heap order around
    /// its (possibly new) position.
    ///
    /// 将存活事件移动到新的截止时间，并在其（可能变化的）位置周围
    /// 恢复堆序。
    pub fn update_expire(&mut self, index: usize, ttl: Duration, expire: Instant) {
        let ev = &mut self.events[index];
        ev.ttl = ttl;
        ev.expire = expire;
        let pos = ev.heap_index;
        self.sift_down(pos);
        self.sift_up(pos);
    }

    /// Pops every event whose deadline has passed and returns their
    /// callbacks in expiry order. The heap property guarantees that once the
    /// root is not yet due, no due event remains.
    ///
    /// 弹出所有已到期的事件并按到期顺序返回其回调。堆性质保证一旦
    /// 堆根尚未到期，就不再有已到期的事件残留。
    pub fn drain_due(&mut self, now: Instant) -> Vec<ExpireFn> {
        let mut fired = Vec::new();
        while let Some(&root) = self.heap.first() {
            if self.events[root].expire > now {
                break;
            }
            let callback = self.events[root].callback.take();
            let last = self.heap.len() - 1;
            if last > 0 {
                self.swap_entries(0, last);
            }
            self.heap.pop();
            if !self.heap.is_empty() {
                self.sift_down(0);
            }
            self.recycle(root);
            if let Some(callback) = callback {
                fired.push(callback);
            }
        }
        fired
    }

    /// Deadline of the earliest live event, if any.
    /// 最早存活事件的截止时间（如果有）。
    pub fn peek_expire(&self) -> Option<Instant> {
        self.heap.first().map(|&index| self.events[index].expire)
    }

    /// A point-in-time list of live events in heap-internal order. The order
    /// is not sorted; only the first element is guaranteed to be the
    /// earliest.
    ///
    /// 按堆内部顺序排列的存活事件即时列表。该顺序并非有序；
    /// 只有第一个元素保证是最早的。
    pub fn snapshot(&self) -> Vec<EventInfo> {
        self.heap
            .iter()
            .map(|&index| {
                let ev = &self.events[index];
                EventInfo {
                    handle: EventHandle {
                        index,
                        generation: ev.generation,
                        slot_pos: ev.slot_pos,
                    },
                    ttl: ev.ttl,
                    expire: ev.expire,
                    round: ev.round,
                    cron: ev.cron,
                }
            })
            .collect()
    }

    /// Parks a slot on the free stack. Clearing the callback releases any
    /// resources it captured; bumping the generation invalidates every
    /// handle issued for the finished scheduling.
    ///
    /// 将槽位停放到空闲栈。清除回调会释放其捕获的所有资源；
    /// 递增代数会使已结束调度所签发的全部句柄失效。
    fn recycle(&mut self, index: usize) {
        let ev = &mut self.events[index];
        ev.callback = None;
        ev.in_use = false;
        ev.generation += 1;
        self.free.push(index);
    }

    /// Swaps two heap positions, keeping each event's `heap_index` in step
    /// with its actual array position.
    ///
    /// 交换两个堆位置，使每个事件的 `heap_index` 与其实际数组位置
    /// 保持同步。
    fn swap_entries(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        let ia = self.heap[a];
        let ib = self.heap[b];
        self.events[ia].heap_index = a;
        self.events[ib].heap_index = b;
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.events[self.heap[pos]].expire < self.events[self.heap[parent]].expire {
                self.swap_entries(pos, parent);
                pos = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        loop {
            let left = pos * 2 + 1;
            if left >= self.heap.len() {
                break;
            }
            let mut child = left;
            let right = left + 1;
            if right < self.heap.len()
                && self.events[self.heap[right]].expire < self.events[self.heap[left]].expire
            {
                child = right;
            }
            if self.events[self.heap[child]].expire < self.events[self.heap[pos]].expire {
                self.swap_entries(pos, child);
                pos = child;
            } else {
                break;
            }
        }
    }
}
