//! Motor actuation for the HT7K board.
//!
//! Each of the four motor slots drives an H-bridge through a pair of PWM
//! channels (forward leg, reverse leg). This module owns the slot table, maps
//! speeds onto duty cycles and never drives both legs of a bridge at once.
//! Commands are received via `MOTOR_CHANNEL`.

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use serde::{Deserialize, Serialize};

use super::pca9685::{DeviceError, PwmChannels};
use crate::utils::math::duty::{bridge_duty, signed_speed_to_pwm, speed_to_pwm, DutyCycle};

/// Channel used to receive motor commands (`MotorCommand` messages).
pub static MOTOR_CHANNEL: Channel<CriticalSectionRawMutex, MotorCommand, 16> = Channel::new();

/// Pause between consecutive motors of a fan-out command (ms).
///
/// Keeps all four bridges from switching inside the same current transient.
pub const MOTOR_SETTLE_MS: u32 = 10;

/// Forward/reverse channels of one H-bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPair {
    pub forward: u8,
    pub reverse: u8,
}

/// Channel pairs of M1..M4, in slot order.
pub const MOTOR_CHANNELS: [ChannelPair; 4] = [
    ChannelPair { forward: 12, reverse: 11 },
    ChannelPair { forward: 10, reverse: 9 },
    ChannelPair { forward: 8, reverse: 7 },
    ChannelPair { forward: 4, reverse: 3 },
];

/// Logical motor identifier. `All` fans out to M1..M4.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MotorSlot {
    M1,
    M2,
    M3,
    M4,
    All,
}

impl MotorSlot {
    /// Decode a raw slot id as used by the board's block library
    /// (`0x00`, `0x02`, `0x04`, `0x06`, `0x08` = ALL).
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0x00 => Some(MotorSlot::M1),
            0x02 => Some(MotorSlot::M2),
            0x04 => Some(MotorSlot::M3),
            0x06 => Some(MotorSlot::M4),
            0x08 => Some(MotorSlot::All),
            _ => None,
        }
    }

    /// Decode a 1-based motor number. `All` has no number.
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(MotorSlot::M1),
            2 => Some(MotorSlot::M2),
            3 => Some(MotorSlot::M3),
            4 => Some(MotorSlot::M4),
            _ => None,
        }
    }
}

/// Rotation sense for directional commands.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Clockwise: forward leg driven.
    Cw,
    /// Counter-clockwise: reverse leg driven.
    Ccw,
}

/// Resolve a slot to its channel pairs: one for M1..M4, four (in order) for ALL.
pub fn resolve_channels(slot: MotorSlot) -> &'static [ChannelPair] {
    match slot {
        MotorSlot::M1 => &MOTOR_CHANNELS[0..1],
        MotorSlot::M2 => &MOTOR_CHANNELS[1..2],
        MotorSlot::M3 => &MOTOR_CHANNELS[2..3],
        MotorSlot::M4 => &MOTOR_CHANNELS[3..4],
        MotorSlot::All => &MOTOR_CHANNELS,
    }
}

/// Resolve a raw slot id; unknown ids resolve to no pairs.
pub fn resolve_id(id: u8) -> &'static [ChannelPair] {
    match MotorSlot::from_id(id) {
        Some(slot) => resolve_channels(slot),
        None => &[],
    }
}

/// Motor command variants, one per operation of the command surface.
///
/// Serialized as JSON with tag `"mc"`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "mc", rename_all = "snake_case")]
pub enum MotorCommand {
    // Motor Variants
    /// Run a slot in a direction at speed `s` (0..=255).
    Run { m: MotorSlot, d: Direction, s: u8 },
    /// Run motor number `m` (1..=4) at signed speed `s` (-255..=255).
    Signed { m: u8, s: i16 },
    /// Stop a slot (both legs off).
    Stop { m: MotorSlot },

    // Channel Variants
    /// Drive channel `c` as a digital output.
    Level { c: u8, l: bool },
    /// Program the chip-wide PWM frequency (Hz).
    Freq { f: u32 },
    /// Write raw on/off ticks to channel `c`.
    Raw { c: u8, on: i32, off: i32 },

    // Device Management Variants
    /// Put the PWM oscillator to sleep.
    Sleep,
    /// Wake the PWM oscillator.
    Wake,
}

/// Motor actuation layer over any `PwmChannels` backend.
pub struct MotorDriver<P> {
    pwm: P,
}

impl<P: PwmChannels> MotorDriver<P> {
    pub fn new(pwm: P) -> Self {
        MotorDriver { pwm }
    }

    /// Access the PWM backend for channel-level operations.
    pub fn pwm(&mut self) -> &mut P {
        &mut self.pwm
    }

    pub fn into_inner(self) -> P {
        self.pwm
    }

    /// Run `slot` in `direction` at `speed` (0..=255 -> 0..=4080 ticks).
    ///
    /// With ALL the motors are driven in slot order with `MOTOR_SETTLE_MS`
    /// between them. Within a bridge the idle leg is written before the driven
    /// one, so CW writes reverse then forward.
    pub fn run_directional(
        &mut self,
        slot: MotorSlot,
        direction: Direction,
        speed: u8,
    ) -> Result<(), DeviceError<P::BusError>> {
        let pwm = speed_to_pwm(speed) as i32;
        let (forward, reverse) = match direction {
            Direction::Cw => bridge_duty(pwm),
            Direction::Ccw => bridge_duty(-pwm),
        };
        tracing::debug!(?slot, ?direction, speed, "run directional");
        self.drive(resolve_channels(slot), forward, reverse)
    }

    /// Run motor number `motor` (1..=4) at a signed `speed`.
    ///
    /// Positive speeds drive the forward leg, negative ones the reverse leg.
    pub fn run_signed(
        &mut self,
        motor: u8,
        speed: i16,
    ) -> Result<(), DeviceError<P::BusError>> {
        let Some(slot) = MotorSlot::from_number(motor) else {
            tracing::warn!(motor, "motor number out of range, ignored");
            return Err(DeviceError::InvalidMotor(motor));
        };
        let (forward, reverse) = bridge_duty(signed_speed_to_pwm(speed));
        tracing::debug!(motor, speed, "run signed");
        self.drive(resolve_channels(slot), forward, reverse)
    }

    /// Switch both legs of every bridge in `slot` off.
    pub fn stop(
        &mut self,
        slot: MotorSlot,
    ) -> Result<(), DeviceError<P::BusError>> {
        tracing::debug!(?slot, "stop");
        self.drive(resolve_channels(slot), DutyCycle::OFF, DutyCycle::OFF)
    }

    /// Apply one bridge state to every pair. The idle leg is written first so
    /// a reversal never has both legs active between the two writes.
    fn drive(
        &mut self,
        pairs: &[ChannelPair],
        forward: DutyCycle,
        reverse: DutyCycle,
    ) -> Result<(), DeviceError<P::BusError>> {
        self.pwm.ensure_initialized()?;
        for (i, pair) in pairs.iter().enumerate() {
            if i > 0 {
                self.pwm.settle_ms(MOTOR_SETTLE_MS);
            }
            let legs = if forward.is_active() {
                [(pair.reverse, reverse), (pair.forward, forward)]
            } else {
                [(pair.forward, forward), (pair.reverse, reverse)]
            };
            for (channel, duty) in legs {
                self.pwm
                    .set_channel(channel, duty.on as i32, duty.off as i32)?;
            }
        }
        Ok(())
    }
}
