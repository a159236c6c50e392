//! 任务输出分流
//!
//! 每次运行的 stdout/stderr 写入同时落到两个目的地：
//!
//! - 运行日志文件，每次写入追加一行 `{"log": "...", "stream": "stdout"}`
//! - 调度进程自身的标准输出/标准错误
//!
//! 并分别统计转发出去的字节数。
//!
//! 两个目的地都是同步写入，在调用方所在的 tokio 工作线程上直接执行，
//! 单次写入的数据量不超过容器输出流的一个数据块。

use std::borrow::Cow;
use std::io::{self, BufWriter, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use dcron_core::OutputChunk;
use serde::Serialize;
use tracing::warn;

type SharedLog = Arc<Mutex<BufWriter<Box<dyn Write + Send>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

#[derive(Serialize)]
struct LogLine<'a> {
    log: Cow<'a, str>,
    stream: StreamKind,
}

fn lock_log(log: &SharedLog) -> MutexGuard<'_, BufWriter<Box<dyn Write + Send>>> {
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 单个输出流的分流写入器
pub struct StreamLogger {
    kind: StreamKind,
    log: SharedLog,
    forward: Box<dyn Write + Send>,
    written: u64,
}

impl StreamLogger {
    fn new(kind: StreamKind, log: SharedLog, forward: Box<dyn Write + Send>) -> Self {
        Self {
            kind,
            log,
            forward,
            written: 0,
        }
    }

    /// 已转发的字节数
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    fn append_log_line(&self, buf: &[u8]) -> io::Result<()> {
        let line = LogLine {
            log: String::from_utf8_lossy(buf),
            stream: self.kind,
        };
        let mut log = lock_log(&self.log);
        serde_json::to_writer(&mut *log, &line)?;
        log.write_all(b"\n")
    }
}

impl Write for StreamLogger {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Err(e) = self.append_log_line(buf) {
            warn!(stream = self.kind.as_str(), "写入运行日志失败: {}", e);
        }

        self.forward.write_all(buf)?;
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.forward.flush()
    }
}

/// 一次运行的输出记录器
pub struct TaskLogger {
    log: SharedLog,
    stdout: StreamLogger,
    stderr: StreamLogger,
}

impl TaskLogger {
    /// 转发到调度进程自身的标准输出/标准错误
    pub fn new(log: impl Write + Send + 'static) -> Self {
        Self::with_streams(log, io::stdout(), io::stderr())
    }

    pub fn with_streams(
        log: impl Write + Send + 'static,
        stdout: impl Write + Send + 'static,
        stderr: impl Write + Send + 'static,
    ) -> Self {
        let log: SharedLog = Arc::new(Mutex::new(BufWriter::new(Box::new(log))));
        Self {
            stdout: StreamLogger::new(StreamKind::Stdout, log.clone(), Box::new(stdout)),
            stderr: StreamLogger::new(StreamKind::Stderr, log.clone(), Box::new(stderr)),
            log,
        }
    }

    pub fn stdout(&mut self) -> &mut StreamLogger {
        &mut self.stdout
    }

    pub fn stderr(&mut self) -> &mut StreamLogger {
        &mut self.stderr
    }

    /// 按数据块来源写入对应的流
    pub fn write_chunk(&mut self, chunk: &OutputChunk) -> io::Result<()> {
        match chunk {
            OutputChunk::Stdout(bytes) => self.stdout.write_all(bytes),
            OutputChunk::Stderr(bytes) => self.stderr.write_all(bytes),
        }
    }

    pub fn stdout_size(&self) -> u64 {
        self.stdout.bytes_written()
    }

    pub fn stderr_size(&self) -> u64 {
        self.stderr.bytes_written()
    }

    /// 将缓冲的日志行刷入日志文件
    pub fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()?;
        self.stderr.flush()?;
        lock_log(&self.log).flush()
    }
}
