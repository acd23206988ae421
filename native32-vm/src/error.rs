use native32_core::{ActionCode, ContainerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("stack underflow executing action {index}")]
    StackUnderflow { index: u32 },
    #[error("unknown opcode raw value at action {index}")]
    UnknownOpcode { index: u32 },
    #[error("opcode {op:?} at action {index} has no defined VM semantics")]
    UnimplementedOpcode { index: u32, op: ActionCode },
    #[error("jump target at action {index} falls outside the action table")]
    MalformedBytecode { index: u32 },
    #[error("GetUrl2 verb {verb:?} is not handled")]
    UnhandledUrlVerb { verb: String },
    #[error("run exceeded its instruction step budget")]
    StepBudgetExceeded,
    #[error("container read failed while executing action {index}")]
    Container {
        index: u32,
        #[source]
        source: ContainerError,
    },
}
