//! Host package for the workspace's cross-crate integration tests under `tests/`.
