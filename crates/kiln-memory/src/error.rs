//! Error type for pool and arena construction.

/// Errors raised while creating pooled resources or native buffers.
///
/// Capacity exhaustion and pool misses are not errors; they are reported as
/// `None` by [`RawArena::try_alloc`](crate::arena::RawArena::try_alloc) and
/// [`ResourcePool::try_get`](crate::pool::ResourcePool::try_get).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    /// The global allocator could not satisfy the request.
    #[error("allocation of {size} bytes (align {align}) failed")]
    Allocation {
        /// Requested size in bytes.
        size: usize,
        /// Requested alignment in bytes.
        align: usize,
    },

    /// Size and alignment do not form a valid layout.
    #[error("invalid layout: {size} bytes with align {align}")]
    InvalidLayout {
        /// Requested size in bytes.
        size: usize,
        /// Requested alignment in bytes.
        align: usize,
    },

    /// A native buffer of zero bytes was requested.
    #[error("capacity must be greater than zero")]
    ZeroCapacity,

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_request() {
        let err = MemoryError::Allocation { size: 64, align: 16 };
        assert_eq!(err.to_string(), "allocation of 64 bytes (align 16) failed");
        assert_eq!(
            MemoryError::InvalidConfig("tolerance".into()).to_string(),
            "invalid configuration: tolerance"
        );
    }
}
