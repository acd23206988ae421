use native32_core::ContainerError;
use native32_vm::VmError;
use thiserror::Error;

/// Top-level failure surfaced by a tick, combining the two boundary error
/// types the scheduler straddles.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    Vm(#[from] VmError),
}
