//! Math utilities for the HT7K motor board.
//!
//! This module provides the duty-cycle and prescale arithmetic shared by the
//! PWM controller and the motor actuation layer.

pub mod duty;
