//! Test data builders for task configurations

use dcron_core::{CommandLine, ExecTaskConfig, RunTaskConfig, TasksConfig};

pub fn run_config(schedule: &str, image: &str, command: &[&str]) -> RunTaskConfig {
    RunTaskConfig {
        schedule: schedule.to_string(),
        image: image.to_string(),
        command: CommandLine::new(command.iter().copied()),
        ..Default::default()
    }
}

pub fn exec_config(schedule: &str, service: &str, command: &[&str]) -> ExecTaskConfig {
    ExecTaskConfig {
        schedule: schedule.to_string(),
        service: service.to_string(),
        command: CommandLine::new(command.iter().copied()),
        ..Default::default()
    }
}

/// Builder for creating test task sets
#[derive(Debug, Default)]
pub struct TaskConfigBuilder {
    config: TasksConfig,
}

impl TaskConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run(mut self, name: &str, schedule: &str, image: &str, command: &[&str]) -> Self {
        self.config
            .run
            .insert(name.to_string(), run_config(schedule, image, command));
        self
    }

    pub fn with_run_task(mut self, name: &str, task: RunTaskConfig) -> Self {
        self.config.run.insert(name.to_string(), task);
        self
    }

    pub fn with_exec(mut self, name: &str, schedule: &str, service: &str, command: &[&str]) -> Self {
        self.config
            .exec
            .insert(name.to_string(), exec_config(schedule, service, command));
        self
    }

    pub fn build(self) -> TasksConfig {
        self.config
    }
}
