//! In-memory mock implementations of the runtime and transport traits
//!
//! The mocks record every call so tests can assert on the container
//! lifecycle without a Docker daemon.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dcron_core::{
    ContainerRuntime, ContainerSpec, ContainerSummary, ExecSpec, Frame, OutputChunk,
    OutputStream, SchedulerError, SchedulerResult, SubscriberTransport,
};
use futures::StreamExt;
use tokio::sync::Semaphore;

#[derive(Debug, Default)]
struct RuntimeState {
    exit_code: i64,
    exec_exit_code: Option<i64>,
    output: Vec<OutputChunk>,
    output_error: bool,
    running: Vec<ContainerSummary>,
    failing_on: Option<String>,
    calls: Vec<String>,
    created: Vec<ContainerSpec>,
    removed: Vec<String>,
    execs: Vec<(String, ExecSpec)>,
    next_id: u64,
}

/// Mock implementation of ContainerRuntime for testing
///
/// When built with [`MockContainerRuntime::held`], every `wait_container`
/// and `start_exec` call blocks until [`MockContainerRuntime::release`]
/// hands out a permit, which keeps a run in flight for as long as a test
/// needs.
#[derive(Debug, Clone)]
pub struct MockContainerRuntime {
    state: Arc<Mutex<RuntimeState>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockContainerRuntime {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RuntimeState {
                exec_exit_code: Some(0),
                ..Default::default()
            })),
            gate: None,
        }
    }

    pub fn with_exit_code(self, code: i64) -> Self {
        self.state.lock().unwrap().exit_code = code;
        self
    }

    pub fn with_exec_exit_code(self, code: Option<i64>) -> Self {
        self.state.lock().unwrap().exec_exit_code = code;
        self
    }

    pub fn with_output(self, chunks: Vec<OutputChunk>) -> Self {
        self.state.lock().unwrap().output = chunks;
        self
    }

    /// The output stream yields an error after the configured chunks
    pub fn with_output_error(self) -> Self {
        self.state.lock().unwrap().output_error = true;
        self
    }

    pub fn with_running_container(self, id: &str, name: &str) -> Self {
        self.state.lock().unwrap().running.push(ContainerSummary {
            id: id.to_string(),
            names: vec![name.to_string()],
        });
        self
    }

    /// Make the named operation (e.g. `"start_container"`) fail
    pub fn failing_on(self, operation: &str) -> Self {
        self.state.lock().unwrap().failing_on = Some(operation.to_string());
        self
    }

    pub fn held(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let `count` held runs proceed
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.as_str() == operation)
            .count()
    }

    pub fn created_containers(&self) -> Vec<ContainerSpec> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn removed_containers(&self) -> Vec<String> {
        self.state.lock().unwrap().removed.clone()
    }

    pub fn created_execs(&self) -> Vec<(String, ExecSpec)> {
        self.state.lock().unwrap().execs.clone()
    }

    fn record(&self, operation: &str) -> SchedulerResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(operation.to_string());
        if state.failing_on.as_deref() == Some(operation) {
            return Err(SchedulerError::RuntimeClient(format!(
                "mock failure in {operation}"
            )));
        }
        Ok(())
    }

    async fn pass_gate(&self) {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }

    fn output_stream(&self) -> OutputStream {
        let state = self.state.lock().unwrap();
        let mut items: Vec<SchedulerResult<OutputChunk>> =
            state.output.iter().cloned().map(Ok).collect();
        if state.output_error {
            items.push(Err(SchedulerError::RuntimeClient(
                "mock stream failure".to_string(),
            )));
        }
        futures::stream::iter(items).boxed()
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        format!("{prefix}-{}", state.next_id)
    }
}

impl Default for MockContainerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for MockContainerRuntime {
    async fn create_container(&self, spec: &ContainerSpec) -> SchedulerResult<String> {
        self.record("create_container")?;
        self.state.lock().unwrap().created.push(spec.clone());
        Ok(self.next_id("container"))
    }

    async fn start_container(&self, _container_id: &str) -> SchedulerResult<()> {
        self.record("start_container")
    }

    async fn wait_container(&self, _container_id: &str) -> SchedulerResult<i64> {
        self.record("wait_container")?;
        self.pass_gate().await;
        Ok(self.state.lock().unwrap().exit_code)
    }

    async fn container_logs(&self, _container_id: &str) -> SchedulerResult<OutputStream> {
        self.record("container_logs")?;
        Ok(self.output_stream())
    }

    async fn remove_container(&self, container_id: &str) -> SchedulerResult<()> {
        self.record("remove_container")?;
        self.state
            .lock()
            .unwrap()
            .removed
            .push(container_id.to_string());
        Ok(())
    }

    async fn list_running_containers(&self) -> SchedulerResult<Vec<ContainerSummary>> {
        self.record("list_running_containers")?;
        Ok(self.state.lock().unwrap().running.clone())
    }

    async fn create_exec(&self, container_id: &str, spec: &ExecSpec) -> SchedulerResult<String> {
        self.record("create_exec")?;
        self.state
            .lock()
            .unwrap()
            .execs
            .push((container_id.to_string(), spec.clone()));
        Ok(self.next_id("exec"))
    }

    async fn start_exec(&self, _exec_id: &str) -> SchedulerResult<OutputStream> {
        self.record("start_exec")?;
        self.pass_gate().await;
        Ok(self.output_stream())
    }

    async fn inspect_exec(&self, _exec_id: &str) -> SchedulerResult<Option<i64>> {
        self.record("inspect_exec")?;
        Ok(self.state.lock().unwrap().exec_exit_code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransportMode {
    Healthy,
    Failing,
    Stalled,
}

/// Mock implementation of SubscriberTransport for testing
#[derive(Debug, Clone)]
pub struct MockTransport {
    frames: Arc<Mutex<Vec<Frame>>>,
    mode: TransportMode,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            frames: Arc::new(Mutex::new(Vec::new())),
            mode: TransportMode::Healthy,
        }
    }

    /// Every send fails with a transport error
    pub fn failing() -> Self {
        Self {
            mode: TransportMode::Failing,
            ..Self::new()
        }
    }

    /// Every send hangs forever
    pub fn stalled() -> Self {
        Self {
            mode: TransportMode::Stalled,
            ..Self::new()
        }
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn text_frames(&self) -> Vec<String> {
        self.frames()
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Text(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriberTransport for MockTransport {
    async fn send(&mut self, frame: Frame) -> SchedulerResult<()> {
        match self.mode {
            TransportMode::Healthy => {
                self.frames.lock().unwrap().push(frame);
                Ok(())
            }
            TransportMode::Failing => Err(SchedulerError::Transport(
                "mock transport closed".to_string(),
            )),
            TransportMode::Stalled => futures::future::pending().await,
        }
    }
}
