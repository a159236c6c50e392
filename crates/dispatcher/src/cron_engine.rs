//! 定时触发引擎
//!
//! 后台循环睡眠到最早的下次触发时间，到期的条目各自在独立的 tokio 任务中执行。
//! 条目在运行期间新增时通过 [`Notify`] 唤醒循环重新计算睡眠时长。

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use dcron_core::EntryId;

use crate::cron_utils::CronScheduler;

/// 到期时执行的任务
pub type CronJob = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

const IDLE_SLEEP: Duration = Duration::from_secs(24 * 3600);

struct CronEntry {
    schedule: CronScheduler,
    next: Option<DateTime<Utc>>,
    job: CronJob,
}

#[derive(Default)]
struct EngineState {
    entries: BTreeMap<EntryId, CronEntry>,
    next_id: u64,
    running: bool,
    shutdown_tx: Option<broadcast::Sender<()>>,
}

pub struct CronEngine {
    state: Arc<Mutex<EngineState>>,
    wakeup: Arc<Notify>,
    loop_handle: Option<JoinHandle<()>>,
}

fn lock_state(state: &Mutex<EngineState>) -> MutexGuard<'_, EngineState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CronEngine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState::default())),
            wakeup: Arc::new(Notify::new()),
            loop_handle: None,
        }
    }

    /// 注册定时条目，返回其关联ID
    pub fn add(&self, schedule: CronScheduler, job: CronJob) -> EntryId {
        let mut state = lock_state(&self.state);
        state.next_id += 1;
        let id = EntryId(state.next_id);

        let next = if state.running {
            schedule.next_execution_time(Utc::now())
        } else {
            None
        };
        state.entries.insert(
            id,
            CronEntry {
                schedule,
                next,
                job,
            },
        );

        if state.running {
            self.wakeup.notify_one();
        }
        id
    }

    /// 条目的下次触发时间；引擎未启动时为 `None`
    pub fn entry(&self, id: EntryId) -> Option<DateTime<Utc>> {
        lock_state(&self.state)
            .entries
            .get(&id)
            .and_then(|entry| entry.next)
    }

    pub fn len(&self) -> usize {
        lock_state(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_running(&self) -> bool {
        lock_state(&self.state).running
    }

    /// 启动调度循环，必须在 tokio 运行时中调用
    pub fn start(&mut self) {
        let shutdown_rx = {
            let mut state = lock_state(&self.state);
            if state.running {
                return;
            }
            state.running = true;

            let now = Utc::now();
            for entry in state.entries.values_mut() {
                entry.next = entry.schedule.next_execution_time(now);
            }

            let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
            state.shutdown_tx = Some(shutdown_tx);
            shutdown_rx
        };

        let state = self.state.clone();
        let wakeup = self.wakeup.clone();
        self.loop_handle = Some(tokio::spawn(run_loop(state, wakeup, shutdown_rx)));
        info!("定时调度引擎已启动");
    }

    /// 停止调度循环
    ///
    /// 返回后不会再有新的触发；已经开始执行的任务不受影响。
    pub async fn stop(&mut self) {
        {
            let mut state = lock_state(&self.state);
            if !state.running {
                return;
            }
            state.running = false;
            if let Some(shutdown_tx) = state.shutdown_tx.take() {
                let _ = shutdown_tx.send(());
            }
        }

        if let Some(handle) = self.loop_handle.take() {
            if let Err(e) = handle.await {
                warn!("定时调度循环异常退出: {}", e);
            }
        }
        info!("定时调度引擎已停止");
    }
}

impl Default for CronEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CronEngine {
    fn drop(&mut self) {
        let mut state = lock_state(&self.state);
        state.running = false;
        if let Some(shutdown_tx) = state.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

async fn run_loop(
    state: Arc<Mutex<EngineState>>,
    wakeup: Arc<Notify>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        let sleep_for = {
            let state = lock_state(&state);
            if !state.running {
                break;
            }
            let now = Utc::now();
            state
                .entries
                .values()
                .filter_map(|entry| entry.next)
                .min()
                .map(|next| (next - now).to_std().unwrap_or(Duration::ZERO))
                .unwrap_or(IDLE_SLEEP)
        };

        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("定时调度循环收到停止信号");
                break;
            }
            _ = wakeup.notified() => {
                continue;
            }
            _ = tokio::time::sleep(sleep_for) => {
                fire_due_entries(&state);
            }
        }
    }
}

fn fire_due_entries(state: &Mutex<EngineState>) {
    let now = Utc::now();
    let due: Vec<(EntryId, CronJob)> = {
        let mut state = lock_state(state);
        if !state.running {
            return;
        }
        state
            .entries
            .iter_mut()
            .filter(|(_, entry)| entry.next.is_some_and(|next| next <= now))
            .map(|(id, entry)| {
                entry.next = entry.schedule.next_execution_time(now);
                (*id, entry.job.clone())
            })
            .collect()
    };

    for (id, job) in due {
        debug!("定时条目 {} 到期触发", id);
        tokio::spawn(job());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_job(counter: Arc<AtomicUsize>) -> CronJob {
        Arc::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_next_is_set_on_start() {
        let mut engine = CronEngine::new();
        let id = engine.add(
            CronScheduler::new("@daily").unwrap(),
            counting_job(Arc::new(AtomicUsize::new(0))),
        );
        assert_eq!(engine.entry(id), None);

        engine.start();
        let next = engine.entry(id).unwrap();
        assert!(next > Utc::now());

        engine.stop().await;
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn test_entry_ids_are_distinct() {
        let engine = CronEngine::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let first = engine.add(
            CronScheduler::new("@hourly").unwrap(),
            counting_job(counter.clone()),
        );
        let second = engine.add(
            CronScheduler::new("@hourly").unwrap(),
            counting_job(counter),
        );
        assert_ne!(first, second);
        assert_eq!(engine.len(), 2);
    }

    #[tokio::test]
    async fn test_due_entry_fires_until_stopped() {
        let mut engine = CronEngine::new();
        let counter = Arc::new(AtomicUsize::new(0));
        engine.add(
            CronScheduler::new("@every 1s").unwrap(),
            counting_job(counter.clone()),
        );

        engine.start();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        engine.stop().await;

        let fired = counter.load(Ordering::SeqCst);
        assert!(fired >= 1, "expected at least one trigger, got {fired}");

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), fired);
    }

    #[tokio::test]
    async fn test_entry_added_while_running() {
        let mut engine = CronEngine::new();
        engine.start();

        let counter = Arc::new(AtomicUsize::new(0));
        let id = engine.add(
            CronScheduler::new("@every 1s").unwrap(),
            counting_job(counter.clone()),
        );
        assert!(engine.entry(id).is_some());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        engine.stop().await;
        assert!(counter.load(Ordering::SeqCst) >= 1);
    }
}
