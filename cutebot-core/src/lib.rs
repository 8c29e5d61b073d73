//! Board-support drivers for the Cutebot robot carrying a Clue controller,
//! on no-std embedded platforms.
//!
//! For a host-side run against simulated hardware, see `cutebot-app/mock-clue`.
#![cfg_attr(not(test), no_std)]

pub mod utils;
