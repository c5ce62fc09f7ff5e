//! Utility re-exports and helper macros for the HT7K motor board.
//!
//! - `connection`: decoding of JSON command frames and forwarding to the
//!   command channel
//! - `controllers`: PCA9685 PWM controller, motor actuation layer and the
//!   command-executing `SystemController`
//! - `math`: duty-cycle and prescale arithmetic
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod connection;
pub mod controllers;
pub mod math;

pub use connection::forward;
pub use controllers::SystemController;

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
