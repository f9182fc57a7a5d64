//! 定时器事件定义
//! Timer Event Definitions
//!
//! 该模块定义了定时器系统中使用的事件、句柄和回调类型。
//!
//! This module defines the event, handle, and callback types used in the
//! timer system.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// The zero-argument callback invoked when an event expires.
/// 事件到期时调用的零参数回调。
pub type ExpireFn = Arc<dyn Fn() + Send + Sync + 'static>;

/// Opaque handle to a scheduled event, used for cancellation and
/// rescheduling. Equality is identity: two handles are equal only if they
/// refer to the same scheduling of the same event slot. A handle goes stale
/// once its event fires or is cancelled; operations through a stale handle
/// are no-ops.
///
/// 已调度事件的不透明句柄，用于取消和重新调度。相等性即同一性：
/// 只有引用同一事件槽位的同一次调度时两个句柄才相等。事件触发或
/// 被取消后句柄即失效；通过失效句柄的操作都是空操作。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHandle {
    /// Index of the event in its owning timer's pool.
    /// 事件在其所属定时器对象池中的索引。
    pub(crate) index: usize,
    /// Generation of the pool slot when this handle was issued. A recycled
    /// slot bumps its generation, which is what makes stale handles inert.
    /// 签发此句柄时对象池槽位的代数。槽位被回收时代数递增，
    /// 这使得失效句柄变为惰性。
    pub(crate) generation: u64,
    /// Which wheel slot owns the event (0 for a standalone timer).
    /// 哪个时间轮槽位拥有该事件（独立定时器为0）。
    pub(crate) slot_pos: usize,
}

impl EventHandle {
    /// The wheel slot that owns this event.
    /// 拥有该事件的时间轮槽位。
    pub fn slot_pos(&self) -> usize {
        self.slot_pos
    }
}

/// A point-in-time view of one live event, as returned by `snapshot`.
/// `snapshot` 返回的单个存活事件的即时视图。
#[derive(Debug, Clone)]
pub struct EventInfo {
    /// Handle of the live event.
    /// 存活事件的句柄。
    pub handle: EventHandle,
    /// The delay requested at scheduling time.
    /// 调度时请求的延迟。
    pub ttl: Duration,
    /// The absolute due timestamp.
    /// 绝对到期时间戳。
    pub expire: Instant,
    /// Full wheel rotations remaining before the event is due. Recorded for
    /// introspection only; firing is governed by `expire`.
    /// 事件到期前剩余的完整轮转数。仅用于自省；触发由 `expire` 决定。
    pub round: u64,
    /// Reserved for repeating timers; carried but not yet wired to a firing
    /// path.
    /// 为重复定时器保留；目前仅记录，尚未接入触发路径。
    pub cron: bool,
}

/// One scheduled unit of work inside a timer's pool. A slot is either live
/// (member of the heap) or parked on the free stack, never both.
///
/// 定时器对象池中的一个调度工作单元。槽位要么存活（堆的成员），
/// 要么停放在空闲栈上，绝不会同时处于两种状态。
pub(crate) struct Event {
    /// The delay requested at scheduling time; refreshed on reschedule.
    /// 调度时请求的延迟；重新调度时刷新。
    pub ttl: Duration,
    /// The absolute due timestamp; sole heap ordering key.
    /// 绝对到期时间戳；堆排序的唯一键。
    pub expire: Instant,
    /// The callback to run at expiry; cleared when the slot is recycled.
    /// 到期时运行的回调；槽位回收时清除。
    pub callback: Option<ExpireFn>,
    /// Which wheel slot owns this event.
    /// 哪个时间轮槽位拥有该事件。
    pub slot_pos: usize,
    /// Current position in the owning heap array. Kept consistent with the
    /// actual array position on every swap.
    /// 在所属堆数组中的当前位置。每次交换时与实际数组位置保持一致。
    pub heap_index: usize,
    /// Full wheel rotations remaining before due.
    /// 到期前剩余的完整轮转数。
    pub round: u64,
    /// Reserved for repeating timers.
    /// 为重复定时器保留。
    pub cron: bool,
    /// Bumped every time the slot is recycled; stale handles compare against
    /// this and miss.
    /// 每次槽位回收时递增；失效句柄与之比较而失配。
    pub generation: u64,
    /// Whether this slot is live (in the heap) versus parked on the free
    /// stack.
    /// 该槽位是存活（在堆中）还是停放在空闲栈上。
    pub in_use: bool,
}
