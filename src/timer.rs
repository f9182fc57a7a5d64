//! 槽位定时器模块
//! Slot Timer Module
//!
//! 该模块实现了一个独立的延迟队列：基于索引跟踪的最小堆，
//! 支持O(log n)的插入、按句柄取消和重新调度，并通过空闲槽位栈
//! 回收已完成的事件以减少分配开销。它既可以自主运行（自带睡眠/唤醒
//! 循环），也可以被时间轮驱动（被动模式，由外部批量排空）。
//!
//! This module implements a self-contained delay queue: an index-tracked
//! min-heap supporting O(log n) insertion, cancellation-by-handle and
//! rescheduling, with a free-slot stack that recycles finished events to
//! reduce allocation churn. It can run autonomously (its own sleep/wake
//! loop) or be driven by a time wheel (passive mode, drained externally
//! in batches).

mod core;
pub(crate) mod event;
mod heap;


pub use self::core::{MIN_DELAY, Timer};
pub use event::{EventHandle, EventInfo, ExpireFn};
