//! 定义了时间轮的可配置参数。
//! Defines configurable parameters for the timing wheel.

use std::time::Duration;

/// A structure containing all configurable parameters for a timing wheel.
/// Both values are fixed at construction; there is no runtime reconfiguration.
///
/// 包含时间轮所有可配置参数的结构体。
/// 两个值都在构造时固定；不支持运行时重新配置。
#[derive(Debug, Clone)]
pub struct Config {
    /// The tick granularity. The background task wakes once per interval and
    /// drains exactly one slot, so firing accuracy is bounded by this value.
    ///
    /// 滴答粒度。后台任务每个间隔唤醒一次并只排空一个槽位，
    /// 因此触发精度受此值限制。
    pub interval: Duration,

    /// The number of slots the pending events are sharded across. Larger
    /// values bound per-tick work more tightly at the cost of memory.
    ///
    /// 待处理事件分片的槽位数量。更大的值以内存为代价更严格地
    /// 限制每次滴答的工作量。
    pub slot_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            slot_count: 60,
        }
    }
}
