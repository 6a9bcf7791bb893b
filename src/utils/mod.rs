//! Cross-cutting filesystem helpers.

pub mod fs;

pub use fs::{ensure_dir, write_atomic};
