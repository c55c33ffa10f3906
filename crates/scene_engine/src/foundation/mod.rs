//! Shared building blocks: nalgebra-based math helpers and logging setup.

pub mod logging;
pub mod math;
