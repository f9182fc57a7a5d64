//! 时间轮驱动核心实现
//! Time wheel driver core implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::timer::{EventHandle, ExpireFn, Timer};
use crate::wheel::stats::{SlotStats, WheelStats};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info, trace};

/// A hashed timing wheel: `slot_count` independent slot timers, a fixed
/// tick interval, and a rotating cursor. A requested delay is hashed to one
/// slot; each tick drains exactly one slot, so per-tick work is bounded by
/// that slot's due events rather than the total pending count.
///
/// 哈希时间轮：`slot_count` 个独立的槽位定时器、固定的滴答间隔和
/// 一个旋转游标。请求的延迟被哈希到某个槽位；每次滴答只排空一个
/// 槽位，因此每次滴答的工作量由该槽位的到期事件决定，而不是全部
/// 待处理事件的总数。
pub struct TimeWheel {
    /// Tick granularity; also the unit of the slot hash.
    /// 滴答粒度；同时是槽位哈希的单位。
    interval: Duration,
    /// Number of slot timers the pending events are sharded across.
    /// 待处理事件分片的槽位定时器数量。
    slot_count: usize,
    /// The slot timers. Each owns its own heap, pool, and lock.
    /// 槽位定时器。每个都拥有自己的堆、对象池和锁。
    slots: Vec<Arc<Timer>>,
    /// Fixed reference point for the interval-unit clock. Both the tick
    /// cursor and the write-time hash divide elapsed time since this epoch
    /// by `interval`, so the two can never disagree on units.
    /// 间隔单位时钟的固定基准点。滴答游标和写入时哈希都用自该基准
    /// 以来的流逝时间除以 `interval`，因此两者在单位上永不失配。
    epoch: Instant,
    /// The slot the tick task is draining (or will drain next).
    /// 滴答任务正在（或即将）排空的槽位。
    current_pos: AtomicUsize,
    /// Total live events across all slots, shared with every slot timer.
    /// 全部槽位的存活事件总数，与每个槽位定时器共享。
    counter: Arc<AtomicI64>,
    /// Whether the tick task has been spawned.
    /// 滴答任务是否已生成。
    started: AtomicBool,
    /// Shutdown signal for the tick task.
    /// 滴答任务的关闭信号。
    shutdown_tx: watch::Sender<bool>,
}

impl TimeWheel {
    /// Creates a wheel with the given tick interval and slot count. Both
    /// must be positive; no further floor is imposed on the interval. The
    /// slot timers are allocated eagerly but nothing runs until
    /// [`TimeWheel::start`].
    ///
    /// 以给定的滴答间隔和槽位数创建时间轮。两者都必须为正；对间隔
    /// 不施加其他下限。槽位定时器被立即分配，但在调用
    /// [`TimeWheel::start`] 之前不会有任何运行。
    pub fn new(interval: Duration, slot_count: usize) -> Result<Arc<Self>> {
        if interval.is_zero() || slot_count == 0 {
            return Err(Error::InvalidConfig);
        }
        let counter = Arc::new(AtomicI64::new(0));
        let slots = (0..slot_count)
            .map(|pos| Timer::with_counter(pos, Arc::clone(&counter)))
            .collect();
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Arc::new(Self {
            interval,
            slot_count,
            slots,
            epoch: Instant::now(),
            current_pos: AtomicUsize::new(0),
            counter,
            started: AtomicBool::new(false),
            shutdown_tx,
        }))
    }

    /// Creates a wheel from a [`Config`].
    /// 从 [`Config`] 创建时间轮。
    pub fn with_config(config: Config) -> Result<Arc<Self>> {
        Self::new(config.interval, config.slot_count)
    }

    /// Spawns the background tick task. Idempotent; a second call is a
    /// no-op. Must be called within a tokio runtime.
    ///
    /// 生成后台滴答任务。幂等；第二次调用是空操作。必须在tokio
    /// 运行时内调用。
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.current_pos
            .store(self.clock_position(), Ordering::Relaxed);
        let wheel = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            info!(
                interval_ms = wheel.interval.as_millis() as u64,
                slot_count = wheel.slot_count,
                "time wheel started"
            );
            let mut ticker = interval(wheel.interval);
            // Skipped ticks are harmless: the cursor is recomputed from the
            // clock, so the next tick lands on the right slot anyway.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => wheel.advance(),
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("time wheel stopped");
        });
    }

    /// Signals the tick task to terminate. Idempotent and terminal: no
    /// further ticks occur, previously scheduled events stay in their slots
    /// unprocessed.
    ///
    /// 通知滴答任务终止。幂等且终态：不再有滴答发生，已调度的事件
    /// 留在各自槽位中不被处理。
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// One tick: recompute the cursor from the clock and drain the slot it
    /// points at.
    /// 一次滴答：从时钟重新计算游标并排空其指向的槽位。
    fn advance(&self) {
        // Recomputing rather than incrementing means clock drift or a
        // stalled tick cannot leave the cursor pointing at a stale slot.
        let pos = self.clock_position();
        self.current_pos.store(pos, Ordering::Relaxed);
        let fired = self.slots[pos].process_due(Instant::now());
        if fired > 0 {
            debug!(pos, fired, "tick drained slot");
        } else {
            trace!(pos, "tick");
        }
    }

    /// Elapsed time since the epoch, in whole interval units.
    /// 自基准点以来的流逝时间，以整间隔为单位。
    fn units(&self, d: Duration) -> u64 {
        (d.as_nanos() / self.interval.as_nanos()) as u64
    }

    /// The slot the cursor belongs at right now.
    /// 游标此刻应处的槽位。
    fn clock_position(&self) -> usize {
        (self.units(self.epoch.elapsed()) % self.slot_count as u64) as usize
    }

    /// The slot a new event with the given delay is filed into:
    /// `(now_units + delay_units) % slot_count`, stepped past the cursor if
    /// it lands on the slot the tick task may be draining this very tick.
    ///
    /// 给定延迟的新事件应归档的槽位：`(now_units + delay_units) %
    /// slot_count`；若落在滴答任务本次可能正在排空的槽位上则后移
    /// 一位。
    fn write_position(&self, delay: Duration) -> usize {
        let target = self.units(self.epoch.elapsed()) + self.units(delay);
        let pos = (target % self.slot_count as u64) as usize;
        if pos == self.current_pos.load(Ordering::Relaxed) {
            (pos + 1) % self.slot_count
        } else {
            pos
        }
    }

    /// Schedules `callback` to run once after `delay`. The returned handle
    /// records which slot owns the event, so cancellation never re-hashes.
    ///
    /// 调度 `callback` 在 `delay` 之后执行一次。返回的句柄记录了拥有
    /// 该事件的槽位，因此取消时无需重新哈希。
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> Result<EventHandle>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.schedule_arc(delay, Arc::new(callback))
    }

    fn schedule_arc(&self, delay: Duration, callback: ExpireFn) -> Result<EventHandle> {
        let pos = self.write_position(delay);
        let round = self.units(delay) / self.slot_count as u64;
        self.slots[pos].schedule_with_round(delay, callback, round)
    }

    /// Alias of [`TimeWheel::schedule`], mirroring the standard-library
    /// style `after`-function naming.
    /// [`TimeWheel::schedule`] 的别名，沿用标准库风格的 `after` 函数
    /// 命名。
    pub fn after_fn<F>(&self, delay: Duration, callback: F) -> Result<EventHandle>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.schedule(delay, callback)
    }

    /// Cancels a scheduled event via the slot recorded on its handle.
    /// Returns `true` iff an event was actually removed.
    ///
    /// 通过句柄上记录的槽位取消已调度的事件。当且仅当确实移除了
    /// 事件时返回 `true`。
    pub fn cancel(&self, handle: &EventHandle) -> bool {
        match self.slots.get(handle.slot_pos) {
            Some(slot) => slot.cancel(handle),
            None => false,
        }
    }

    /// Moves a scheduled event to a new deadline, keeping its callback. The
    /// event stays in the slot that already owns it; callers must use the
    /// returned handle afterwards.
    ///
    /// 将已调度事件移动到新的截止时间，保留其回调。事件留在已拥有
    /// 它的槽位中；调用方此后必须使用返回的句柄。
    pub fn reschedule(&self, handle: &EventHandle, delay: Duration) -> Result<EventHandle> {
        let slot = self.slots.get(handle.slot_pos).ok_or(Error::NotFound)?;
        slot.reschedule(handle, delay)
    }

    /// Schedules an event and returns a single-value source yielding the
    /// firing timestamp; the channel closes instead if the event is
    /// cancelled.
    ///
    /// 调度一个事件并返回产出触发时间戳的单值源；事件被取消时通道
    /// 转而关闭。
    pub fn after(&self, delay: Duration) -> Result<(EventHandle, oneshot::Receiver<Instant>)> {
        let pos = self.write_position(delay);
        self.slots[pos].after(delay)
    }

    /// Suspends the caller until the event fires (`Ok(true)`) or is
    /// cancelled first (`Ok(false)`).
    ///
    /// 挂起调用方直到事件触发（`Ok(true)`）或先被取消
    /// （`Ok(false)`）。
    pub async fn sleep(&self, delay: Duration) -> Result<bool> {
        let (_handle, rx) = self.after(delay)?;
        Ok(rx.await.is_ok())
    }

    /// Total live events across all slots.
    /// 全部槽位的存活事件总数。
    pub fn timer_count(&self) -> i64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// The tick interval.
    /// 滴答间隔。
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The number of slots.
    /// 槽位数量。
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// The slot the cursor currently points at.
    /// 游标当前指向的槽位。
    pub fn current_pos(&self) -> usize {
        self.current_pos.load(Ordering::Relaxed)
    }

    /// Per-slot live counts, in slot order.
    /// 按槽位顺序排列的每槽位存活计数。
    pub fn slot_lengths(&self) -> Vec<SlotStats> {
        self.slots
            .iter()
            .enumerate()
            .map(|(slot_id, slot)| SlotStats {
                slot_id,
                len: slot.len(),
            })
            .collect()
    }

    /// Aggregate statistics for the whole wheel.
    /// 整个时间轮的聚合统计信息。
    pub fn stats(&self) -> WheelStats {
        let mut non_empty_slots = 0;
        let mut max_slot_len = 0;
        let mut total_timers = 0;
        for slot in &self.slots {
            let len = slot.len();
            if len > 0 {
                non_empty_slots += 1;
                max_slot_len = max_slot_len.max(len);
            }
            total_timers += len;
        }
        WheelStats {
            slot_count: self.slot_count,
            interval: self.interval,
            current_pos: self.current_pos(),
            total_timers,
            non_empty_slots,
            max_slot_len,
        }
    }
}
