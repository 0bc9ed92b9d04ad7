//! SQL generation and the read-only gate.

pub mod gate;
pub mod generator;

pub use gate::{check, is_safe};
pub use generator::{SYSTEM_PROMPT, TABLE_NAME, TextToSql};
