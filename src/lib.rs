#![deny(clippy::expect_used, clippy::unwrap_used)]

//! 基于哈希时间轮算法的定时器库的根。
//! The root of the hashed timing wheel timer library.

pub mod config;
pub mod error;
pub mod timer;
pub mod wheel;

pub use config::Config;
pub use error::{Error, Result};
pub use timer::{EventHandle, ExpireFn, Timer};
pub use wheel::{SlotStats, TimeWheel, WheelStats};
