//! Duty-cycle and prescale arithmetic for a 12-bit PCA9685-family PWM chip.
//!
//! One PWM period is 4096 ticks. A channel is described by the tick at which
//! its output rises (`on`) and the tick at which it falls (`off`). Bit 12 of
//! either value is the chip's full-on / full-off override.
//!
//! # Example
//! ```rust
//! use ht7k_core::utils::math::duty::{prescale_for, speed_to_pwm, DutyCycle};
//! assert_eq!(prescale_for(50), Some(121));
//! assert_eq!(speed_to_pwm(255), 4080);
//! assert_eq!(DutyCycle::clamped(-3, 9000), DutyCycle { on: 0, off: 4095 });
//! ```

/// Internal oscillator frequency (Hz).
pub const OSC_CLOCK_HZ: u32 = 25_000_000;
/// Ticks in one PWM period.
pub const TICKS_PER_PERIOD: u32 = 4096;
/// Largest tick value a regular channel write may carry.
pub const MAX_TICK: u16 = 4095;
/// Speed units are scaled by this factor to get ticks (0..=255 -> 0..=4080).
pub const SPEED_SCALE: i32 = 16;
/// Smallest prescale the chip accepts.
pub const PRESCALE_MIN: u8 = 3;
/// Largest prescale the chip accepts.
pub const PRESCALE_MAX: u8 = 255;

/// On/off tick pair for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyCycle {
    pub on: u16,
    pub off: u16,
}

impl DutyCycle {
    /// Output held low for the whole period through regular ticks.
    pub const OFF: DutyCycle = DutyCycle { on: 0, off: 0 };
    /// Full-on override (bit 12 set in `on`).
    pub const FULL_ON: DutyCycle = DutyCycle {
        on: TICKS_PER_PERIOD as u16,
        off: 0,
    };
    /// Full-off override (bit 12 set in `off`).
    pub const FULL_OFF: DutyCycle = DutyCycle {
        on: 0,
        off: TICKS_PER_PERIOD as u16,
    };

    /// Build a duty cycle, clamping `on` and `off` independently into `0..=4095`.
    pub fn clamped(
        on: i32,
        off: i32,
    ) -> Self {
        DutyCycle {
            on: clamp_tick(on),
            off: clamp_tick(off),
        }
    }

    /// A low-side-off drive of `ticks`: rises at 0, falls at `ticks`.
    pub fn drive(ticks: u16) -> Self {
        DutyCycle {
            on: 0,
            off: ticks.min(MAX_TICK),
        }
    }

    /// True when the output spends any part of the period high.
    pub fn is_active(&self) -> bool {
        *self != Self::OFF && *self != Self::FULL_OFF
    }

    /// Little-endian register bytes `[on_lo, on_hi, off_lo, off_hi]`.
    pub fn to_registers(&self) -> [u8; 4] {
        let [on_lo, on_hi] = self.on.to_le_bytes();
        let [off_lo, off_hi] = self.off.to_le_bytes();
        [on_lo, on_hi, off_lo, off_hi]
    }
}

/// Clamp an arbitrary tick request into `0..=4095`.
pub fn clamp_tick(ticks: i32) -> u16 {
    ticks.clamp(0, MAX_TICK as i32) as u16
}

/// Map an unsigned speed (0..=255) onto ticks.
pub fn speed_to_pwm(speed: u8) -> u16 {
    clamp_tick(speed as i32 * SPEED_SCALE)
}

/// Map a signed speed onto signed ticks in `-4095..=4095`.
///
/// The sign carries the direction, the magnitude the duty.
pub fn signed_speed_to_pwm(speed: i16) -> i32 {
    (speed as i32 * SPEED_SCALE).clamp(-(MAX_TICK as i32), MAX_TICK as i32)
}

/// Split signed ticks across an H-bridge pair as `(forward, reverse)`.
///
/// At most one side is ever driven; zero leaves both sides off.
pub fn bridge_duty(pwm: i32) -> (DutyCycle, DutyCycle) {
    if pwm >= 0 {
        (DutyCycle::drive(clamp_tick(pwm)), DutyCycle::OFF)
    } else {
        (DutyCycle::OFF, DutyCycle::drive(clamp_tick(-pwm)))
    }
}

/// Compute the prescale register value for a target PWM frequency.
///
/// `round(25 MHz / 4096 / hz - 1)`, clamped to the range the chip accepts.
/// Returns `None` for a zero frequency.
pub fn prescale_for(hz: u32) -> Option<u8> {
    if hz == 0 {
        return None;
    }
    let raw = OSC_CLOCK_HZ as f64 / TICKS_PER_PERIOD as f64 / hz as f64 - 1.0;
    let rounded = libm::floor(raw + 0.5);
    let clamped = rounded.clamp(PRESCALE_MIN as f64, PRESCALE_MAX as f64);
    Some(clamped as u8)
}
