//! Module Exports
//!
//! This file exports the command-frame handling used by whatever transport
//! carries commands to the board.
//!
//! # Modules
//! - `frames`: decodes JSON text/binary frames into `MotorCommand`s and
//!   forwards them to `MOTOR_CHANNEL`.

pub mod frames;

pub use frames::{decode_binary, decode_text, forward, try_forward, ForwardError};
