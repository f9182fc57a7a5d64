//! 时间轮统计信息
//! Time wheel statistics

use std::fmt;
use std::time::Duration;

/// Live-event count of one slot, for the per-slot length report.
/// 单个槽位的存活事件计数，用于每槽位长度报告。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotStats {
    /// Slot index.
    /// 槽位索引。
    pub slot_id: usize,
    /// Live events currently queued in the slot.
    /// 当前在该槽位排队的存活事件数。
    pub len: usize,
}

/// Aggregate statistics for a whole wheel.
/// 整个时间轮的聚合统计信息。
#[derive(Debug, Clone)]
pub struct WheelStats {
    /// Total number of slots.
    /// 槽位总数。
    pub slot_count: usize,
    /// Tick interval.
    /// 滴答间隔。
    pub interval: Duration,
    /// Slot the cursor currently points at.
    /// 游标当前指向的槽位。
    pub current_pos: usize,
    /// Live events summed over all slots.
    /// 全部槽位存活事件之和。
    pub total_timers: usize,
    /// Slots holding at least one live event.
    /// 至少持有一个存活事件的槽位数。
    pub non_empty_slots: usize,
    /// Largest per-slot queue length.
    /// 最大的单槽位队列长度。
    pub max_slot_len: usize,
}

impl fmt::Display for WheelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WheelStats {{ slots: {}, interval: {:?}, pos: {}, timers: {}, non_empty: {}, max_slot: {} }}",
            self.slot_count,
            self.interval,
            self.current_pos,
            self.total_timers,
            self.non_empty_slots,
            self.max_slot_len
        )
    }
}
