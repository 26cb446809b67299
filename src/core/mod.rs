//! Core relay building blocks.

pub mod upstream;

pub use upstream::*;
