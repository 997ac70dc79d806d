//! Test doubles for the external media toolchain.

mod mock_tools;

pub use mock_tools::MockTools;
