//! 槽位定时器核心实现
//! Slot timer core implementation
//!
//! 定时器维护一组按绝对到期时间排序的待处理事件，支持并发的调度、
//! 取消和重新调度。回调的调用始终发生在堆锁之外，因此回调可以安全
//! 地重入定时器（在本定时器或其他定时器上调度/取消）而不会死锁。
//!
//! The timer maintains a set of pending events ordered by absolute expiry
//! and supports concurrent scheduling, cancellation, and rescheduling.
//! Callback invocation always happens outside the heap lock, so a callback
//! may safely re-enter the timer (schedule/cancel on this or another timer)
//! without deadlocking.

use crate::error::{Error, Result};
use crate::timer::event::{EventHandle, EventInfo, ExpireFn};
use crate::timer::heap::EventHeap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Notify, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace, warn};

/// The minimum delay the scheduler accepts. Anything shorter is rejected
/// with `Error::InvalidDelay` rather than rounded up.
///
/// 调度器接受的最小延迟。更短的延迟会以 `Error::InvalidDelay`
/// 拒绝而不是向上取整。
pub const MIN_DELAY: Duration = Duration::from_millis(1);

/// An independent min-heap delay queue with event recycling.
///
/// A standalone timer is created with [`Timer::new`] and driven by its own
/// loop via [`Timer::start`]. When owned by a [`crate::wheel::TimeWheel`]
/// the timer stays passive and is drained by the wheel's tick through
/// [`Timer::process_due`].
///
/// 带事件回收的独立最小堆延迟队列。
///
/// 独立定时器通过 [`Timer::new`] 创建并经 [`Timer::start`] 由自身循环
/// 驱动。被 [`crate::wheel::TimeWheel`] 拥有时，定时器保持被动，
/// 由时间轮的滴答通过 [`Timer::process_due`] 排空。
pub struct Timer {
    /// Heap and recycling pool; one lock per timer, never shared across
    /// wheel slots.
    /// 堆与回收池；每个定时器一把锁，绝不跨时间轮槽位共享。
    heap: Mutex<EventHeap>,
    /// Wakes the autonomous loop whenever a schedule or reschedule may have
    /// produced an earlier deadline than the one currently slept on.
    /// 当调度或重新调度可能产生比当前睡眠目标更早的截止时间时，
    /// 唤醒自主循环。
    wake: Notify,
    /// Live-event counter; shared with the owning wheel so the wheel's
    /// total count stays O(1).
    /// 存活事件计数器；与所属时间轮共享，使时间轮的总数保持O(1)。
    counter: Arc<AtomicI64>,
    /// Which wheel slot this timer is (0 for a standalone timer).
    /// 此定时器对应的时间轮槽位（独立定时器为0）。
    slot_pos: usize,
    /// Whether the autonomous loop has been started.
    /// 自主循环是否已启动。
    running: AtomicBool,
    /// Shutdown signal for the autonomous loop.
    /// 自主循环的关闭信号。
    shutdown_tx: watch::Sender<bool>,
}

impl Timer {
    /// Creates a standalone timer with its own live counter. The timer is
    /// passive until [`Timer::start`] is called.
    ///
    /// 创建带有自己存活计数器的独立定时器。在调用 [`Timer::start`]
    /// 之前定时器是被动的。
    pub fn new() -> Arc<Self> {
        Self::with_counter(0, Arc::new(AtomicI64::new(0)))
    }

    /// Creates a timer bound to a wheel slot, sharing the wheel's live
    /// counter.
    /// 创建绑定到时间轮槽位的定时器，共享时间轮的存活计数器。
    pub(crate) fn with_counter(slot_pos: usize, counter: Arc<AtomicI64>) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            heap: Mutex::new(EventHeap::new()),
            wake: Notify::new(),
            counter,
            slot_pos,
            running: AtomicBool::new(false),
            shutdown_tx,
        })
    }

    /// Callbacks never run under this lock, so a poisoned mutex can only
    /// mean a panic inside the heap itself; the state is still coherent
    /// enough to continue.
    fn lock(&self) -> MutexGuard<'_, EventHeap> {
        self.heap.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedules `callback` to run once after `delay`.
    ///
    /// Returns `Error::InvalidDelay` for delays below [`MIN_DELAY`]. Safe to
    /// call from any number of threads while the timer's own loop (or the
    /// owning wheel's tick) is running.
    ///
    /// 调度 `callback` 在 `delay` 之后执行一次。
    ///
    /// 延迟低于 [`MIN_DELAY`] 时返回 `Error::InvalidDelay`。在定时器
    /// 自身循环（或所属时间轮的滴答）运行期间可从任意数量的线程
    /// 安全调用。
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> Result<EventHandle>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.schedule_with_round(delay, Arc::new(callback), 0)
    }

    pub(crate) fn schedule_with_round(
        &self,
        delay: Duration,
        callback: ExpireFn,
        round: u64,
    ) -> Result<EventHandle> {
        if delay < MIN_DELAY {
            return Err(Error::InvalidDelay);
        }
        let expire = Instant::now() + delay;
        let handle = {
            let mut heap = self.lock();
            let (index, generation) = heap.alloc(delay, expire, callback, self.slot_pos, round);
            EventHandle {
                index,
                generation,
                slot_pos: self.slot_pos,
            }
        };
        self.counter.fetch_add(1, Ordering::Relaxed);
        trace!(
            index = handle.index,
            slot_pos = self.slot_pos,
            delay_ms = delay.as_millis() as u64,
            "event scheduled"
        );
        // The new deadline may be earlier than the one the loop sleeps on.
        self.wake.notify_one();
        Ok(handle)
    }

    /// Cancels a scheduled event. Returns `true` iff an event was actually
    /// removed; a stale handle (already fired or already cancelled) is a
    /// harmless no-op returning `false`. If the event's heap pop has already
    /// happened this tick, the callback fires and cancel reports `false`.
    ///
    /// 取消已调度的事件。当且仅当确实移除了事件时返回 `true`；
    /// 失效句柄（已触发或已取消）是无害的空操作，返回 `false`。
    /// 如果本次滴答已完成该事件的堆弹出，回调仍会触发，取消报告
    /// `false`。
    pub fn cancel(&self, handle: &EventHandle) -> bool {
        let removed = {
            let mut heap = self.lock();
            heap.is_live(handle.index, handle.generation) && heap.remove(handle.index)
        };
        if removed {
            self.counter.fetch_sub(1, Ordering::Relaxed);
            trace!(index = handle.index, "event cancelled");
        } else {
            trace!(index = handle.index, "cancel of dead handle ignored");
        }
        removed
    }

    /// Moves a live event to a new deadline, keeping its callback. The
    /// returned handle refers to the same scheduling; the caller should use
    /// it in place of the old one.
    ///
    /// 将存活事件移动到新的截止时间，保留其回调。返回的句柄指向
    /// 同一次调度；调用方应使用它替代旧句柄。
    pub fn reschedule(&self, handle: &EventHandle, delay: Duration) -> Result<EventHandle> {
        if delay < MIN_DELAY {
            return Err(Error::InvalidDelay);
        }
        let expire = Instant::now() + delay;
        {
            let mut heap = self.lock();
            if !heap.is_live(handle.index, handle.generation) {
                return Err(Error::NotFound);
            }
            heap.update_expire(handle.index, delay, expire);
        }
        trace!(
            index = handle.index,
            delay_ms = delay.as_millis() as u64,
            "event rescheduled"
        );
        self.wake.notify_one();
        Ok(handle.clone())
    }

    /// Pops and runs every event due at `now`, recycling each one, and
    /// returns the number fired. Callbacks are invoked after the heap lock
    /// is released, each isolated with `catch_unwind` so one panicking
    /// callback cannot stop the driving task or starve later events.
    ///
    /// 弹出并运行所有在 `now` 已到期的事件，逐一回收，并返回触发
    /// 数量。回调在释放堆锁之后调用，并各自用 `catch_unwind` 隔离，
    /// 因此单个恐慌的回调不会停止驱动任务或饿死后续事件。
    pub fn process_due(&self, now: Instant) -> usize {
        let fired = { self.lock().drain_due(now) };
        if fired.is_empty() {
            return 0;
        }
        let count = fired.len();
        self.counter.fetch_sub(count as i64, Ordering::Relaxed);
        for callback in fired {
            if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                warn!(slot_pos = self.slot_pos, "timer callback panicked");
            }
        }
        debug!(slot_pos = self.slot_pos, count, "due events fired");
        count
    }

    /// Schedules an event and returns a single-value source that yields the
    /// firing timestamp. Exactly one value is ever produced; cancelling the
    /// returned handle closes the channel instead.
    ///
    /// 调度一个事件并返回产出触发时间戳的单值源。最多只会产出一个
    /// 值；取消返回的句柄则会关闭通道。
    pub fn after(&self, delay: Duration) -> Result<(EventHandle, oneshot::Receiver<Instant>)> {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let handle = self.schedule(delay, move || {
            if let Some(tx) = tx.lock().unwrap_or_else(PoisonError::into_inner).take() {
                let _ = tx.send(Instant::now());
            }
        })?;
        Ok((handle, rx))
    }

    /// Suspends the caller until a freshly scheduled event fires. Returns
    /// `Ok(true)` when the event fired, `Ok(false)` when it was cancelled
    /// before firing (the sleeper is released either way).
    ///
    /// 挂起调用方直到新调度的事件触发。事件触发时返回 `Ok(true)`，
    /// 触发前被取消时返回 `Ok(false)`（两种情况下睡眠者都会被释放）。
    pub async fn sleep(&self, delay: Duration) -> Result<bool> {
        let (_handle, rx) = self.after(delay)?;
        Ok(rx.await.is_ok())
    }

    /// Number of live events.
    /// 存活事件的数量。
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether any events are pending.
    /// 是否有待处理事件。
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A point-in-time list of live events in heap-internal order; only the
    /// first element is guaranteed earliest.
    /// 按堆内部顺序排列的存活事件即时列表；只有第一个元素保证最早。
    pub fn snapshot(&self) -> Vec<EventInfo> {
        self.lock().snapshot()
    }

    /// Deadline of the earliest live event.
    /// 最早存活事件的截止时间。
    pub(crate) fn peek_expire(&self) -> Option<Instant> {
        self.lock().peek_expire()
    }

    /// Starts the autonomous loop: sleep until the heap root's deadline,
    /// drain, repeat. A schedule or reschedule that produces an earlier
    /// deadline pre-empts the current sleep through the wake signal.
    /// Idempotent. Must be called within a tokio runtime.
    ///
    /// 启动自主循环：睡眠到堆根的截止时间，排空，重复。产生更早
    /// 截止时间的调度或重新调度会通过唤醒信号抢占当前睡眠。
    /// 幂等。必须在tokio运行时内调用。
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let timer = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            debug!(slot_pos = timer.slot_pos, "timer loop started");
            loop {
                let next = timer.peek_expire();
                tokio::select! {
                    _ = timer.wake.notified() => {
                        // Deadline set may have changed; recompute the sleep
                        // target.
                        continue;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = async {
                        match next {
                            Some(at) => sleep_until(at).await,
                            // Empty heap: park until a schedule wakes us.
                            None => std::future::pending::<()>().await,
                        }
                    } => {
                        timer.process_due(Instant::now());
                    }
                }
            }
            debug!(slot_pos = timer.slot_pos, "timer loop stopped");
        });
    }

    /// Stops the autonomous loop. Idempotent; pending events remain queued
    /// but nothing processes them afterwards.
    ///
    /// 停止自主循环。幂等；待处理事件仍保留在队列中，但此后不再有
    /// 任何处理。
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
