//! Key code translation tables for capture layers.
//!
//! The relay itself only ever sees [`KeyboardButton`](crate::KeyboardButton)
//! values; these tables help producers that start from OS key codes.

pub mod windows_vk;

pub use windows_vk::{button_from_raw, vk_to_button};
