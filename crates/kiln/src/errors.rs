//! Error handling and exit codes.

use kiln_memory::MemoryError;

/// Process exit codes.
pub mod exit_codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Generic error.
    pub const ERROR_GENERIC: i32 = 1;
    /// Data read back from a pooled buffer did not match what was written.
    pub const ERROR_MISMATCH: i32 = 3;
    /// Invalid configuration.
    pub const ERROR_CONFIG: i32 = 4;
}

/// Errors raised by the workload driver.
#[derive(Debug, thiserror::Error)]
pub enum KilnError {
    /// Invalid flag, environment variable, or workload file.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// A buffer read back different contents than were written to it.
    #[error("checksum mismatch in round {round}: wrote {expected}, read {actual}")]
    Mismatch {
        /// Workload round that failed.
        round: u64,
        /// Checksum of the written data.
        expected: u64,
        /// Checksum of the data read back.
        actual: u64,
    },
    /// Pool or arena failure.
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Map a driver error to its exit code.
pub fn handle_error(err: &KilnError) -> i32 {
    match err {
        KilnError::Config(_) | KilnError::Memory(MemoryError::InvalidConfig(_)) => {
            exit_codes::ERROR_CONFIG
        }
        KilnError::Mismatch { .. } => exit_codes::ERROR_MISMATCH,
        KilnError::Memory(_) => exit_codes::ERROR_GENERIC,
    }
}

/// Exit code for any error reaching `main`.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<KilnError>())
        .map_or(exit_codes::ERROR_GENERIC, handle_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        assert_eq!(handle_error(&KilnError::Config("bad".into())), 4);
        assert_eq!(
            handle_error(&KilnError::Memory(MemoryError::InvalidConfig("bad".into()))),
            4
        );
        assert_eq!(
            handle_error(&KilnError::Mismatch {
                round: 1,
                expected: 2,
                actual: 3
            }),
            3
        );
        assert_eq!(handle_error(&KilnError::Memory(MemoryError::ZeroCapacity)), 1);
    }

    #[test]
    fn exit_code_looks_through_context() {
        let err = anyhow::Error::new(KilnError::Config("x".into())).context("loading");
        assert_eq!(exit_code(&err), exit_codes::ERROR_CONFIG);
        assert_eq!(exit_code(&anyhow::anyhow!("other")), exit_codes::ERROR_GENERIC);
    }
}
