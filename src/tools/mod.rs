//! Tool capability layer
//!
//! Provides the read-only registry the orchestration core consumes:
//! - Descriptors with declared parameter schemas
//! - Closure- and command-backed handlers
//! - Built-in catalog of command-line security tools

pub mod types;
pub mod registry;
pub mod process;
pub mod catalog;

// Re-export commonly used types
pub use types::{ParamType, ParameterSpec, Params, ToolCategory, ToolDescriptor, ToolError};
pub use registry::{RegistryStats, ToolCatalog, ToolHandler, ToolRegistry};
pub use process::{ArgSpec, CommandTool, OutputKind};
pub use catalog::builtin_catalog;
