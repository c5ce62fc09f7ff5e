//! Core drivers for the HT7K motor board on no-std embedded platforms.
//!
//! The board drives four DC motors through H-bridge channel pairs on a
//! PCA9685-family 16-channel PWM controller. See `utils::controllers` for the
//! driver stack and the `mock-mcu` app for a host-side walkthrough.
#![no_std]

extern crate alloc;

#[cfg(test)]
use critical_section as _;

pub mod utils;
