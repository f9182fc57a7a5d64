//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use thiserror::Error;

/// The primary error type for the timing wheel library.
/// 时间轮库的主要错误类型。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The wheel was constructed with a zero interval or a zero slot count.
    /// 时间轮以零时间间隔或零槽位数构造。
    #[error("invalid wheel configuration: interval and slot count must be positive")]
    InvalidConfig,

    /// A requested delay is below the minimum the scheduler accepts (1 millisecond).
    /// 请求的延迟低于调度器接受的最小值（1毫秒）。
    #[error("delay is below the 1ms minimum")]
    InvalidDelay,

    /// The referenced event has already fired or been cancelled.
    /// 引用的事件已经触发或已被取消。
    #[error("event already fired or cancelled")]
    NotFound,
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;
