//! Integration tests for rate limiting functionality.

mod memory;
mod redis;
