/// Try-on pipeline module
///
/// This module handles:
/// - Validating and placing user-selected images into slots (upload.rs)
/// - Launching and awaiting the external compositing program (compositor.rs)
/// - The single-flight processing state machine (invoker.rs)

pub mod compositor;
pub mod invoker;
pub mod upload;

pub use compositor::ProcessCompositor;
pub use invoker::{run_in_background, ProcessingInvoker, RunReport};
pub use upload::UploadPipeline;
