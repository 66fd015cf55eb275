//! Managed services for test runs
//!
//! Long-lived external dependencies (databases, identity providers, any
//! process a test needs) are started on demand, registered under the
//! configuration they were started with, and reused across tests for as long
//! as the required configuration stays structurally equal.

pub mod error;
pub mod key;
pub mod lifecycle;
pub mod process;
pub mod registry;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use error::{DevServicesError, DevServicesResult};
pub use key::ComparableKey;
pub use lifecycle::{LazySetting, ManagedService, MockServiceHandle, ServiceHandle, ServiceSummary};
pub use process::{start_process_service, PortAllocator, ProcessHandle, ProcessServiceSpec};
pub use registry::ServiceRegistry;
