//! Audio devices for the tone generator
//!
//! Provides:
//! - The `AudioDevice` capability the signal graph is built on
//! - A live cpal device with a real-time render thread
//! - An offline device rendering on demand
//! - Sample-accurate parameter automation shared by both

pub mod commands;
mod context;
pub mod device;
pub mod engine;
pub mod nodes;
pub mod offline;
pub mod params;
pub mod render;
pub mod signals;
