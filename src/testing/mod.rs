//! Testing utilities and mock implementations
//!
//! This module provides mock implementations for exercising the device loop
//! without a broker, a network link or real output hardware.

pub mod mocks;

pub use mocks::*;
