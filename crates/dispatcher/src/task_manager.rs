use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use dcron_core::metrics::{record_task_run, record_trigger_rejected};
use dcron_core::{
    ContainerRuntime, RunOutcome, SchedulerError, SchedulerResult, StructuredLogger, Task,
    TaskInfo, TaskSpec, TasksConfig,
};
use dcron_worker::{TaskExecutor, TaskLogger};

use crate::cron_engine::{CronEngine, CronJob};
use crate::cron_utils::CronScheduler;
use crate::run_history::TaskStatsStore;

/// 任务生命周期回调，参数为任务当前的状态快照
pub type TaskListener = Arc<dyn Fn(&TaskInfo) + Send + Sync>;

struct Registry {
    tasks: BTreeMap<String, Arc<Task>>,
    cron: CronEngine,
}

/// 任务管理器
///
/// 持有任务注册表、定时调度引擎和运行历史。生命周期回调需要在
/// 放入 `Arc` 共享之前通过 [`TaskManager::on_task_started`] /
/// [`TaskManager::on_task_finished`] 注册。
pub struct TaskManager {
    executor: TaskExecutor,
    logs_dir: PathBuf,
    registry: Mutex<Registry>,
    history: TaskStatsStore,
    started_listeners: Vec<TaskListener>,
    finished_listeners: Vec<TaskListener>,
}

impl TaskManager {
    /// 创建任务管理器，日志目录不存在时自动创建
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        project_name: impl Into<String>,
        logs_dir: impl Into<PathBuf>,
    ) -> SchedulerResult<Self> {
        let logs_dir = logs_dir.into();
        std::fs::create_dir_all(&logs_dir)
            .map_err(|e| SchedulerError::log_file(&logs_dir, e))?;

        Ok(Self {
            executor: TaskExecutor::new(runtime, project_name),
            logs_dir,
            registry: Mutex::new(Registry {
                tasks: BTreeMap::new(),
                cron: CronEngine::new(),
            }),
            history: TaskStatsStore::new(),
            started_listeners: Vec::new(),
            finished_listeners: Vec::new(),
        })
    }

    pub fn on_task_started<F>(&mut self, listener: F)
    where
        F: Fn(&TaskInfo) + Send + Sync + 'static,
    {
        self.started_listeners.push(Arc::new(listener));
    }

    pub fn on_task_finished<F>(&mut self, listener: F)
    where
        F: Fn(&TaskInfo) + Send + Sync + 'static,
    {
        self.finished_listeners.push(Arc::new(listener));
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// 加载任务集，替换全部任务并丢弃原有的定时调度引擎
    ///
    /// 校验失败时注册表保持不变。运行历史不受影响，本方法也不启动调度。
    pub async fn load_config(&self, config: &TasksConfig) -> SchedulerResult<()> {
        config.validate()?;
        for (name, schedule) in config.schedules() {
            if schedule.trim().is_empty() {
                continue;
            }
            CronScheduler::validate_cron_expression(schedule).map_err(|e| {
                SchedulerError::Configuration(format!("任务 {name} 的调度表达式无效: {e}"))
            })?;
        }

        let mut tasks = BTreeMap::new();
        for (name, run) in &config.run {
            tasks.insert(
                name.clone(),
                Arc::new(Task::new(name.clone(), TaskSpec::Run(run.clone()))),
            );
        }
        for (name, exec) in &config.exec {
            tasks.insert(
                name.clone(),
                Arc::new(Task::new(name.clone(), TaskSpec::Exec(exec.clone()))),
            );
        }

        let mut registry = self.registry.lock().await;
        registry.tasks = tasks;
        registry.cron = CronEngine::new();
        info!("已加载 {} 个任务", registry.tasks.len());
        Ok(())
    }

    /// 将尚未注册的定时任务注册到调度引擎并启动调度
    ///
    /// 某个任务的调度表达式解析失败时立即返回，已注册的任务保留。
    pub async fn start(self: &Arc<Self>) -> SchedulerResult<()> {
        let mut registry = self.registry.lock().await;
        let Registry { tasks, cron } = &mut *registry;

        for task in tasks.values() {
            if !task.is_scheduled() || task.entry_id().is_some() {
                continue;
            }
            let schedule = CronScheduler::new(task.schedule())?;
            let entry_id = cron.add(schedule, scheduled_job(Arc::downgrade(self), task.clone()));
            task.set_entry_id(entry_id);
            StructuredLogger::log_task_registered(&task.name, task.schedule(), entry_id.0);
        }

        cron.start();
        if cron.is_empty() {
            info!("任务调度已启动，没有定时任务，仅支持手动触发");
        } else {
            info!("任务调度已启动，共 {} 个定时任务", cron.len());
        }
        Ok(())
    }

    /// 停止触发新的定时运行，正在执行的运行不受影响
    pub async fn stop(&self) {
        self.registry.lock().await.cron.stop().await;
    }

    pub async fn is_running(&self) -> bool {
        self.registry.lock().await.cron.is_running()
    }

    /// 停止调度、加载新任务集，原先处于运行状态时重新启动
    pub async fn reload(self: &Arc<Self>, config: &TasksConfig) -> SchedulerResult<()> {
        let was_running = self.is_running().await;
        self.stop().await;

        let loaded = self.load_config(config).await;
        if let Err(e) = &loaded {
            warn!("重新加载任务配置失败，保留原有任务: {}", e);
        }

        if was_running {
            self.start().await?;
        }
        loaded
    }

    /// 定时触发的运行，不检查任务是否正在运行
    pub async fn run_task(&self, task: Arc<Task>) {
        let stats = self.history.allocate(&task.name).await;
        self.execute_run(&task, stats.id, "schedule").await;
    }

    /// 手动触发任务
    pub async fn trigger_task(self: &Arc<Self>, name: &str) -> SchedulerResult<JoinHandle<()>> {
        let allocated = match self.task(name).await {
            Some(task) => self
                .history
                .try_allocate(name)
                .await
                .map(|stats| (task, stats)),
            None => Err(SchedulerError::TaskNotFound {
                name: name.to_string(),
            }),
        };
        let (task, stats) = allocated.inspect_err(|e| {
            if e.is_dispatch_rejection() {
                StructuredLogger::log_trigger_rejected(name, e);
                record_trigger_rejected(name);
            }
        })?;

        let manager = self.clone();
        Ok(tokio::spawn(async move {
            manager.execute_run(&task, stats.id, "manual").await;
        }))
    }

    pub async fn task(&self, name: &str) -> Option<Arc<Task>> {
        self.registry.lock().await.tasks.get(name).cloned()
    }

    pub async fn is_task_running(&self, name: &str) -> bool {
        self.history.is_running(name).await
    }

    pub fn get_logfile_path(&self, name: &str, run_id: u64) -> PathBuf {
        self.logs_dir.join(format!("{name}.{run_id}.log"))
    }

    /// 打开运行日志文件
    pub async fn open_logfile(&self, name: &str, run_id: u64) -> SchedulerResult<tokio::fs::File> {
        if self.history.get(name, run_id).await.is_none() {
            return Err(SchedulerError::RunNotFound {
                name: name.to_string(),
                id: run_id,
            });
        }

        let path = self.get_logfile_path(name, run_id);
        tokio::fs::File::open(&path)
            .await
            .map_err(|e| SchedulerError::log_file(path, e))
    }

    /// 所有任务的状态快照，按名称排序
    pub async fn task_infos(&self) -> BTreeMap<String, TaskInfo> {
        let tasks: Vec<(Arc<Task>, Option<chrono::DateTime<chrono::Utc>>)> = {
            let registry = self.registry.lock().await;
            registry
                .tasks
                .values()
                .map(|task| (task.clone(), next_fire_time(&registry.cron, task)))
                .collect()
        };

        let mut infos = BTreeMap::new();
        for (task, next) in tasks {
            let stats = self.history.snapshot(&task.name).await;
            infos.insert(
                task.name.clone(),
                TaskInfo {
                    name: task.name.clone(),
                    schedule: task.schedule().to_string(),
                    next,
                    stats,
                },
            );
        }
        infos
    }

    pub async fn task_info(&self, name: &str) -> Option<TaskInfo> {
        let task = self.task(name).await?;
        Some(self.snapshot(&task).await)
    }

    /// 任务已被重新加载替换时不再报告下次触发时间
    async fn snapshot(&self, task: &Task) -> TaskInfo {
        let next = {
            let registry = self.registry.lock().await;
            match registry.tasks.get(&task.name) {
                Some(current) if std::ptr::eq(current.as_ref(), task) => {
                    next_fire_time(&registry.cron, task)
                }
                _ => None,
            }
        };

        TaskInfo {
            name: task.name.clone(),
            schedule: task.schedule().to_string(),
            next,
            stats: self.history.snapshot(&task.name).await,
        }
    }

    async fn execute_run(&self, task: &Task, run_id: u64, trigger: &str) {
        let path = self.get_logfile_path(&task.name, run_id);
        let logfile = match tokio::fs::File::create(&path).await {
            Ok(file) => file.into_std().await,
            Err(e) => {
                // 记录保持运行中状态，不再结束
                let err = SchedulerError::log_file(&path, e);
                StructuredLogger::log_system_error("task_manager", "create_logfile", &err);
                return;
            }
        };

        StructuredLogger::log_task_started(&task.name, run_id, trigger);
        self.notify(&self.started_listeners, task).await;

        let mut output = TaskLogger::new(logfile);
        let started_at = Instant::now();
        let result = self.executor.execute(&task.spec, &mut output).await;

        let status = match result {
            Ok(status) => Some(status),
            Err(e) => {
                StructuredLogger::log_task_crashed(&task.name, run_id, &e);
                let message = format!("[CRON] Error: {e}\n");
                if let Err(write_err) = output.stderr().write_all(message.as_bytes()) {
                    warn!("写入任务 {} 的错误信息失败: {}", task.name, write_err);
                }
                None
            }
        };
        if let Err(e) = output.flush() {
            warn!("刷新任务 {} 的运行日志失败: {}", task.name, e);
        }

        let outcome = RunOutcome {
            status,
            stdout_size: output.stdout_size(),
            stderr_size: output.stderr_size(),
        };
        self.history.finalize(&task.name, run_id, &outcome).await;

        let duration = started_at.elapsed().as_secs_f64();
        record_task_run(&task.name, outcome.outcome_label(), duration);
        if let Some(status) = outcome.status {
            StructuredLogger::log_task_finished(
                &task.name,
                run_id,
                status,
                outcome.stdout_size,
                outcome.stderr_size,
                duration,
            );
        }

        self.notify(&self.finished_listeners, task).await;
    }

    async fn notify(&self, listeners: &[TaskListener], task: &Task) {
        if listeners.is_empty() {
            return;
        }
        let info = self.snapshot(task).await;
        for listener in listeners {
            listener(&info);
        }
    }
}

fn next_fire_time(cron: &CronEngine, task: &Task) -> Option<chrono::DateTime<chrono::Utc>> {
    task.entry_id().and_then(|id| cron.entry(id))
}

fn scheduled_job(manager: Weak<TaskManager>, task: Arc<Task>) -> CronJob {
    Arc::new(move || {
        let manager = manager.clone();
        let task = task.clone();
        async move {
            if let Some(manager) = manager.upgrade() {
                manager.run_task(task).await;
            }
        }
        .boxed()
    })
}
