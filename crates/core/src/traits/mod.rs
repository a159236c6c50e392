pub mod container_runtime;
pub mod subscriber_transport;

pub use container_runtime::*;
pub use subscriber_transport::*;
