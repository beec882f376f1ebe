// patter-core - Runtime configuration parameters
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Runtime limits and debugging switches.
//!
//! Parameters specify constraints only; enforcement is handled by the
//! virtual machine.

use crate::error::ConfigError;

/// Configuration supplied when creating a runtime.
#[derive(Debug, Clone)]
pub struct RuntimeParams {
    /// Dump the lexed symbol stream through `tracing::debug!` after each
    /// compile.
    pub log_symbols: bool,

    /// Dump disassembled bytecode through `tracing::debug!` after each
    /// compile.
    pub log_bytecode: bool,

    /// Maximum operand stack depth per script.
    pub max_operand_stack: usize,

    /// Maximum call depth (recursion limit) per script.
    pub max_call_depth: usize,

    /// Maximum instructions per `execute` call before the script yields
    /// back to the host with a `Running` status; 0 means unlimited.
    pub max_instructions: u64,

    /// Block-size hint forwarded to the host allocator.
    pub allocator_block_size: usize,
}

impl Default for RuntimeParams {
    fn default() -> Self {
        RuntimeParams {
            log_symbols: false,
            log_bytecode: false,
            max_operand_stack: 4096,
            max_call_depth: 256,
            max_instructions: 0,
            allocator_block_size: 8192,
        }
    }
}

impl RuntimeParams {
    /// Create parameters with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the parameters for consistency. The execution limits are an
    /// all-or-nothing pair: zeroing either one is rejected rather than
    /// silently disabling the other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_operand_stack == 0 || self.max_call_depth == 0 {
            return Err(ConfigError::InvalidExecutionLimits);
        }
        if self.allocator_block_size == 0 {
            return Err(ConfigError::InvalidBlockSize);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(RuntimeParams::default().validate().is_ok());
    }

    #[test]
    fn test_partial_limits_rejected() {
        let mut params = RuntimeParams::default();
        params.max_call_depth = 0;
        assert!(matches!(
            params.validate(),
            Err(ConfigError::InvalidExecutionLimits)
        ));

        let mut params = RuntimeParams::default();
        params.max_operand_stack = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let mut params = RuntimeParams::default();
        params.allocator_block_size = 0;
        assert!(matches!(params.validate(), Err(ConfigError::InvalidBlockSize)));
    }
}
