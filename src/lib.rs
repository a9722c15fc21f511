//! Host status dashboard for small e-ink panels
//!
//! Collects SSH session count, SoC temperature, and OTG usage, and redraws
//! the panel only when one of them changed since the last render.

pub mod cli;
pub mod core;
pub mod utils;
