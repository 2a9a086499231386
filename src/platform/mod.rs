//! Platform abstraction layer
//!
//! The browser build exposes the scene to the page's JavaScript, which owns
//! sprite elements, chat ingestion and the animation-frame loop.

#[cfg(target_arch = "wasm32")]
pub mod web;
