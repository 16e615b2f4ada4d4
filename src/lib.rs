//! # vk-triangle
//!
//! A progressive Vulkan triangle tutorial built on [`ash`] and [`winit`],
//! using the Vulkan 1.3 dynamic-rendering and synchronization2 feature set.
//!
//! The crate ships three binaries, each one layer deeper into the
//! initialization pipeline:
//!
//! 1. `cargo run --bin instance` - validated instance + debug messenger
//! 2. `cargo run --bin device` - + surface, adapter selection, logical device
//! 3. `cargo run` - + swapchain, pipeline and the draw loop
//!
//! The heavy lifting lives in [`backend`]; [`frame`] drives the per-frame
//! acquire/record/submit/present protocol.

pub mod backend;
pub mod config;
pub mod error;
pub mod frame;
