pub mod config;
pub mod errors;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod traits;

pub use self::config::*;
pub use errors::*;
pub use logging::{init_logging, StructuredLogger};
pub use models::{
    EntryId, RunOutcome, Task, TaskEvent, TaskInfo, TaskNotification, TaskSpec, TaskStats,
    UNKNOWN_STATUS,
};
pub use traits::{
    ContainerRuntime, ContainerSpec, ContainerSummary, ExecSpec, Frame, OutputChunk, OutputStream,
    SubscriberTransport,
};
