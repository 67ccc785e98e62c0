//! Target extraction and parameter inference
//!
//! Free text becomes one typed [`TargetDescriptor`]; the descriptor plus
//! caller overrides bind a tool's required parameters.

pub mod extract;
pub mod infer;

pub use extract::{extract_target, TargetDescriptor, TargetKind};
pub use infer::{bind, infer_for_target, infer_params, Binding};
