//! 时间轮系统集成测试
//! Time wheel system integration tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use timewheel::{Config, TimeWheel, Timer};
use tokio::time::{Duration, sleep};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[tokio::test(start_paused = true)]
async fn test_wheel_base() {
    init_tracing();
    let wheel = TimeWheel::with_config(Config::default()).unwrap();
    wheel.start();

    let fired = Arc::new(AtomicBool::new(false));
    let flag = fired.clone();
    wheel
        .after_fn(Duration::from_secs(1), move || {
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

    // 最大延迟加两个滴答周期
    // Max delay plus two tick periods
    sleep(Duration::from_secs(3)).await;
    assert!(fired.load(Ordering::SeqCst));
    assert_eq!(wheel.timer_count(), 0);

    wheel.stop();
}

#[tokio::test(start_paused = true)]
async fn test_wheel_cancel_before_expiry() {
    let wheel = TimeWheel::with_config(Config::default()).unwrap();
    wheel.start();

    let fired = Arc::new(AtomicBool::new(false));
    let flag = fired.clone();
    let handle = wheel
        .schedule(Duration::from_secs(1), move || {
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();
    assert!(wheel.cancel(&handle));

    sleep(Duration::from_secs(2)).await;
    assert!(!fired.load(Ordering::SeqCst));

    wheel.stop();
}

#[tokio::test(start_paused = true)]
async fn test_standalone_timer_reschedule_window() {
    let timer = Timer::new();
    timer.start();

    let fired = Arc::new(AtomicBool::new(false));
    let flag = fired.clone();
    let handle = timer
        .schedule(Duration::from_millis(20), move || {
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();
    timer.reschedule(&handle, Duration::from_millis(5)).unwrap();

    // 新截止时间落在等待窗口之内
    // The new deadline lands inside the waiting window
    sleep(Duration::from_millis(10)).await;
    assert!(fired.load(Ordering::SeqCst));

    timer.stop();
}

#[tokio::test(start_paused = true)]
async fn test_many_concurrent_schedules_all_fire_once() {
    init_tracing();
    let wheel = TimeWheel::new(Duration::from_millis(1), 60).unwrap();
    wheel.start();

    let fired = Arc::new(AtomicU32::new(0));
    let mut tasks = Vec::new();
    for task_id in 0..600u64 {
        let wheel = wheel.clone();
        let fired = fired.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..100u64 {
                let delay = Duration::from_millis((task_id + i) % 60 + 1);
                let fired = fired.clone();
                wheel
                    .schedule(delay, move || {
                        fired.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
            }
        }));
    }
    futures::future::join_all(tasks).await;
    assert_eq!(wheel.timer_count(), 60_000);

    // 最大延迟加上游标完整走完两圈的余量
    // Max delay plus two full cursor rotations of slack
    sleep(Duration::from_millis(200)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 60_000);
    assert_eq!(wheel.timer_count(), 0);

    wheel.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_schedulers_real_time() {
    init_tracing();
    let wheel = TimeWheel::new(Duration::from_millis(1), 60).unwrap();
    wheel.start();

    let fired = Arc::new(AtomicU32::new(0));
    let mut tasks = Vec::new();
    for task_id in 0..60u64 {
        let wheel = wheel.clone();
        let fired = fired.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..100 {
                let delay = Duration::from_millis(task_id % 60 + 1);
                let fired = fired.clone();
                wheel
                    .schedule(delay, move || {
                        fired.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
            }
        }));
    }
    futures::future::join_all(tasks).await;

    // 真实时钟下留出充足余量：最大延迟60毫秒加多圈游标旋转
    // Generous slack on the real clock: 60ms max delay plus several
    // cursor rotations
    sleep(Duration::from_millis(1_000)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 6_000);
    assert_eq!(wheel.timer_count(), 0);

    wheel.stop();
}

#[tokio::test(start_paused = true)]
async fn test_panicking_callback_does_not_stop_ticking() {
    init_tracing();
    let wheel = TimeWheel::new(Duration::from_millis(1), 60).unwrap();
    wheel.start();

    wheel
        .schedule(Duration::from_millis(5), || {
            panic!("injected failure");
        })
        .unwrap();

    let fired = Arc::new(AtomicBool::new(false));
    let flag = fired.clone();
    wheel
        .schedule(Duration::from_millis(15), move || {
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

    sleep(Duration::from_millis(30)).await;
    // 恐慌的回调被隔离，滴答任务继续驱动后续事件
    // The panicking callback is isolated; the tick task keeps driving
    // later events
    assert!(fired.load(Ordering::SeqCst));
    assert_eq!(wheel.timer_count(), 0);

    wheel.stop();
}

#[tokio::test(start_paused = true)]
async fn test_wheel_sleep_blocks_until_fired() {
    let wheel = TimeWheel::new(Duration::from_millis(1), 60).unwrap();
    wheel.start();

    let before = tokio::time::Instant::now();
    assert_eq!(wheel.sleep(Duration::from_millis(25)).await, Ok(true));
    assert!(before.elapsed() >= Duration::from_millis(25));

    wheel.stop();
}
