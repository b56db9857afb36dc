//! fdleak Core Library
//!
//! Per-invocation resource accounting for long-lived serverless process
//! instances. Provides descriptor and connection enumeration, deterministic
//! resource reports, leaking and scoped request policies, the invocation
//! handler that ties them together, and configuration parsing.

pub mod accounting;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod policy;
pub mod registry;
pub mod state;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use accounting::{
    render, ConnectionSnapshot, DescriptorSnapshot, Introspector, OpenFilesLimit,
    ProcessTables, ProcfsIntrospector, ResourceAccountant, ResourceReport,
};
pub use config::{Config, ConfigLoader, FunctionConfig, RuntimeConfig};
pub use context::InvocationContext;
pub use error::{
    FdLeakError, FdLeakResult, HardValidationError, InvocationError, TransportError,
};
pub use handler::{InvocationHandler, InvocationMeta, InvocationResponse};
pub use policy::{AcquisitionPolicy, LeakingPolicy, PolicyKind, ScopedPolicy};
pub use registry::FunctionRegistry;
pub use state::{InvocationState, InvocationStateMachine};
pub use transport::{ClientFactory, HttpClient, HttpResponse, ReqwestClientFactory};
pub use types::{FunctionId, InvocationId, ProcessId, TargetUrl};
