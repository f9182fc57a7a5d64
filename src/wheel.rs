//! 时间轮驱动模块
//! Time Wheel Driver Module
//!
//! 该模块实现了哈希时间轮驱动：将请求的延迟哈希到固定数量的槽位
//! 定时器之一，并由后台滴答任务推进旋转游标。存储和排序完全委托
//! 给槽位定时器；时间轮本身只负责分片、游标推进和委托。
//!
//! This module implements the hashed time wheel driver: it hashes a
//! requested delay into one of a fixed number of slot timers and advances a
//! rotating cursor on a background tick task. Storage and ordering are
//! delegated entirely to the slot timers; the wheel itself only shards,
//! advances the cursor, and delegates.

mod driver;
mod stats;

pub use driver::TimeWheel;
pub use stats::{SlotStats, WheelStats};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::Error;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tokio::time::{Duration, sleep};

    #[tokio::test]
    async fn test_wheel_creation() {
        let wheel = TimeWheel::with_config(Config::default()).unwrap();
        assert_eq!(wheel.slot_count(), 60);
        assert_eq!(wheel.interval(), Duration::from_secs(1));
        assert_eq!(wheel.timer_count(), 0);

        let stats = wheel.stats();
        assert_eq!(stats.total_timers, 0);
        assert_eq!(stats.non_empty_slots, 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert_eq!(
            TimeWheel::new(Duration::ZERO, 60).err(),
            Some(Error::InvalidConfig)
        );
        assert_eq!(
            TimeWheel::new(Duration::from_secs(1), 0).err(),
            Some(Error::InvalidConfig)
        );
    }

    #[tokio::test]
    async fn test_invalid_delay_rejected() {
        let wheel = TimeWheel::new(Duration::from_secs(1), 60).unwrap();
        assert_eq!(
            wheel
                .schedule(Duration::from_micros(500), || {})
                .err(),
            Some(Error::InvalidDelay)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_and_fire() {
        let wheel = TimeWheel::new(Duration::from_secs(1), 60).unwrap();
        wheel.start();

        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        wheel
            .schedule(Duration::from_secs(1), move || {
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();
        assert_eq!(wheel.timer_count(), 1);

        // 最大延迟加两个滴答周期
        // Max delay plus two tick periods
        sleep(Duration::from_secs(3)).await;
        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(wheel.timer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let wheel = TimeWheel::new(Duration::from_secs(1), 60).unwrap();
        wheel.start();

        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let handle = wheel
            .schedule(Duration::from_secs(1), move || {
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();

        assert!(wheel.cancel(&handle));
        assert_eq!(wheel.timer_count(), 0);
        // 重复取消是无害的空操作
        // Repeated cancel is a harmless no-op
        assert!(!wheel.cancel(&handle));

        sleep(Duration::from_secs(2)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_position_steps_past_cursor() {
        let wheel = TimeWheel::new(Duration::from_secs(1), 60).unwrap();

        // 延迟恰好是一整圈时，原始槽位等于游标位置，必须后移一位。
        // A delay of exactly one rotation hashes onto the cursor's slot and
        // must be stepped past it.
        let handle = wheel.schedule(Duration::from_secs(60), || {}).unwrap();
        assert_eq!(handle.slot_pos(), 1);

        let handle = wheel.schedule(Duration::from_secs(30), || {}).unwrap();
        assert_eq!(handle.slot_pos(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slot_lengths_report() {
        let wheel = TimeWheel::new(Duration::from_secs(1), 60).unwrap();
        for i in 1..=5u64 {
            wheel.schedule(Duration::from_secs(i), || {}).unwrap();
        }

        let lengths = wheel.slot_lengths();
        assert_eq!(lengths.len(), 60);
        let total: usize = lengths.iter().map(|s| s.len).sum();
        assert_eq!(total, 5);
        assert_eq!(wheel.timer_count(), 5);

        let stats = wheel.stats();
        assert_eq!(stats.total_timers, 5);
        assert_eq!(stats.non_empty_slots, 5);
        assert_eq!(stats.max_slot_len, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_keeps_callback() {
        let wheel = TimeWheel::new(Duration::from_millis(1), 60).unwrap();
        wheel.start();

        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let handle = wheel
            .schedule(Duration::from_millis(20), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        // 推迟到同一槽位的下一圈
        // Push the deadline out to the same slot's next rotation
        let handle = wheel.reschedule(&handle, Duration::from_millis(80)).unwrap();
        assert_eq!(wheel.timer_count(), 1);

        sleep(Duration::from_millis(40)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(wheel.timer_count(), 0);

        // 触发后句柄即失效
        // The handle goes stale once fired
        assert!(!wheel.cancel(&handle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_yields_firing_time() {
        let wheel = TimeWheel::new(Duration::from_millis(1), 60).unwrap();
        wheel.start();

        let before = tokio::time::Instant::now();
        let (_handle, rx) = wheel.after(Duration::from_millis(5)).unwrap();
        let fired_at = rx.await.unwrap();
        assert!(fired_at >= before + Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_releases_sleeper() {
        let wheel = TimeWheel::new(Duration::from_millis(1), 60).unwrap();
        wheel.start();

        let (handle, rx) = wheel.after(Duration::from_secs(10)).unwrap();
        assert!(wheel.cancel(&handle));
        // 通道关闭即取消结果，睡眠者立刻被释放
        // The closed channel is the cancelled outcome; the sleeper is
        // released immediately
        assert!(rx.await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_terminal() {
        let wheel = TimeWheel::new(Duration::from_millis(1), 60).unwrap();
        wheel.start();

        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        wheel
            .schedule(Duration::from_millis(5), move || {
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();
        wheel.stop();
        // stop() 是幂等的
        // stop() is idempotent
        wheel.stop();

        sleep(Duration::from_millis(50)).await;
        assert!(!fired.load(Ordering::SeqCst));
        // 已调度的事件留在槽位中，未被取消
        // Scheduled events remain in their slots, not cancelled
        assert_eq!(wheel.timer_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let wheel = TimeWheel::new(Duration::from_millis(1), 60).unwrap();
        wheel.start();
        wheel.start();

        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        wheel
            .schedule(Duration::from_millis(5), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        sleep(Duration::from_millis(70)).await;
        // 只有一个滴答任务在运行，事件恰好触发一次
        // Only one tick task runs; the event fires exactly once
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
