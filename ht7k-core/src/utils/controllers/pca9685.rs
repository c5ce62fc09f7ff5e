//! PCA9685-family PWM controller for the HT7K motor board.
//!
//! `PwmController` owns one chip on the I2C bus: its lazy bring-up state, its
//! oscillator prescale and the raw per-channel duty-cycle register writes. All
//! bus traffic goes through `embedded_hal::i2c::I2c`; settle delays go through
//! an injected `DelayNs` so callers decide how waiting is done.

use embedded_hal::{delay::DelayNs, i2c::I2c};

use crate::utils::math::duty::{prescale_for, DutyCycle};

/// Default 7-bit bus address of the chip on the HT7K board.
pub const DEFAULT_ADDRESS: u8 = 0x40;
/// Number of PWM output channels.
pub const CHANNEL_COUNT: u8 = 16;
/// PWM frequency programmed at bring-up unless configured otherwise.
pub const DEFAULT_FREQUENCY_HZ: u32 = 50;
/// Oscillator stabilization wait after a prescale write or wake-up (µs).
pub const PRESCALE_SETTLE_US: u32 = 5_000;

/// Duty cycle written by `set_digital_level(_, true)`.
///
/// Logical high is the chip's full-on override, logical low the full-off
/// override. Firmware for this board has used both polarities; this one is
/// fixed here and covered by tests.
pub const DIGITAL_HIGH: DutyCycle = DutyCycle::FULL_ON;
/// Duty cycle written by `set_digital_level(_, false)`.
pub const DIGITAL_LOW: DutyCycle = DutyCycle::FULL_OFF;

// Registers
const MODE1: u8 = 0x00;
const LED0_ON_L: u8 = 0x06;
const PRE_SCALE: u8 = 0xFE;

// MODE1 bits
const MODE1_BASELINE: u8 = 0x00;
const MODE1_SLEEP: u8 = 0x10;
const MODE1_RESTART_MASK: u8 = 0x7F;
/// RESTART | AI (auto-increment) | ALLCALL
const MODE1_RESUME: u8 = 0xA1;

/// Errors that can occur when driving the PWM chip or the motors behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError<E: core::fmt::Debug> {
    /// The bus transport reported a failure.
    Bus(E),
    /// Channel index outside `0..=15`; nothing was sent.
    InvalidChannel(u8),
    /// Motor number outside the addressable range; nothing was sent.
    InvalidMotor(u8),
    /// Frequency of zero; nothing was sent.
    InvalidFrequency(u32),
}

/// Bring-up state of a chip. Moves to `Initialized` once and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipState {
    Uninitialized,
    Initialized,
}

/// Chip-wide PWM frequency and the prescale derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyConfig {
    pub hz: u32,
    pub prescale: u8,
}

impl FrequencyConfig {
    /// Derive the prescale for `hz`. `None` for a zero frequency.
    pub fn new(hz: u32) -> Option<Self> {
        prescale_for(hz).map(|prescale| FrequencyConfig { hz, prescale })
    }
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        FrequencyConfig {
            hz: DEFAULT_FREQUENCY_HZ,
            prescale: 121,
        }
    }
}

/// Channel-level PWM output used by the motor actuation layer.
///
/// Implemented by `PwmController`; tests and alternative backends can provide
/// their own.
pub trait PwmChannels {
    type BusError: core::fmt::Debug;

    /// Bring the output stage up if it is not already.
    fn ensure_initialized(&mut self) -> Result<(), DeviceError<Self::BusError>>;

    /// Write one channel's on/off ticks, clamped into `0..=4095`.
    fn set_channel(
        &mut self,
        channel: u8,
        on: i32,
        off: i32,
    ) -> Result<(), DeviceError<Self::BusError>>;

    /// Block for `ms` milliseconds between channel groups.
    fn settle_ms(
        &mut self,
        ms: u32,
    );
}

impl<T: PwmChannels + ?Sized> PwmChannels for &mut T {
    type BusError = T::BusError;

    fn ensure_initialized(&mut self) -> Result<(), DeviceError<Self::BusError>> {
        (**self).ensure_initialized()
    }

    fn set_channel(
        &mut self,
        channel: u8,
        on: i32,
        off: i32,
    ) -> Result<(), DeviceError<Self::BusError>> {
        (**self).set_channel(channel, on, off)
    }

    fn settle_ms(
        &mut self,
        ms: u32,
    ) {
        (**self).settle_ms(ms)
    }
}

/// Driver for one PCA9685-family chip at a fixed bus address.
pub struct PwmController<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    state: ChipState,
    frequency: FrequencyConfig,
}

impl<I2C, D, E> PwmController<I2C, D>
where
    I2C: I2c<Error = E>,
    D: DelayNs,
    E: core::fmt::Debug,
{
    /// Create a controller. Nothing is sent on the bus until first use.
    ///
    /// `address` defaults to `DEFAULT_ADDRESS`, `frequency` to 50 Hz.
    pub fn new(
        i2c: I2C,
        delay: D,
        address: Option<u8>,
        frequency: Option<FrequencyConfig>,
    ) -> Self {
        PwmController {
            i2c,
            delay,
            address: address.unwrap_or(DEFAULT_ADDRESS),
            state: ChipState::Uninitialized,
            frequency: frequency.unwrap_or_default(),
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn state(&self) -> ChipState {
        self.state
    }

    /// Frequency most recently programmed (or to be programmed at bring-up).
    pub fn frequency(&self) -> FrequencyConfig {
        self.frequency
    }

    /// Give back the bus and delay.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// Bring the chip to a known state: baseline MODE1, configured frequency,
    /// every channel off. Does nothing once the chip is initialized.
    pub fn initialize(&mut self) -> Result<(), DeviceError<E>> {
        if self.state == ChipState::Initialized {
            return Ok(());
        }
        self.write_register(MODE1, MODE1_BASELINE)?;
        self.program_prescale(self.frequency)?;
        for channel in 0..CHANNEL_COUNT {
            self.write_channel(channel, DutyCycle::OFF)?;
        }
        self.state = ChipState::Initialized;
        tracing::info!(
            address = self.address,
            hz = self.frequency.hz,
            "PWM controller initialized"
        );
        Ok(())
    }

    /// Program a new chip-wide PWM frequency.
    ///
    /// The prescale register is only writable while the oscillator sleeps, so
    /// this sleeps the chip, writes the prescale, restores the previous mode,
    /// waits for the oscillator and then restarts the outputs.
    pub fn set_frequency(
        &mut self,
        hz: u32,
    ) -> Result<(), DeviceError<E>> {
        let Some(config) = FrequencyConfig::new(hz) else {
            tracing::warn!(hz, "rejected PWM frequency");
            return Err(DeviceError::InvalidFrequency(hz));
        };
        self.program_prescale(config)?;
        self.frequency = config;
        tracing::info!(hz, prescale = config.prescale, "PWM frequency set");
        Ok(())
    }

    /// Write raw on/off ticks to one channel.
    ///
    /// `on` and `off` are clamped into `0..=4095` independently. Channels
    /// outside `0..=15` are rejected without touching the bus.
    pub fn set_channel(
        &mut self,
        channel: u8,
        on: i32,
        off: i32,
    ) -> Result<(), DeviceError<E>> {
        self.check_channel(channel)?;
        self.ensure_initialized()?;
        let duty = DutyCycle::clamped(on, off);
        if duty.on as i32 != on || duty.off as i32 != off {
            tracing::debug!(channel, on, off, "channel ticks clamped");
        }
        self.write_channel(channel, duty)
    }

    /// Drive a channel as a digital output using the full-on/full-off overrides.
    pub fn set_digital_level(
        &mut self,
        channel: u8,
        high: bool,
    ) -> Result<(), DeviceError<E>> {
        self.check_channel(channel)?;
        self.ensure_initialized()?;
        let duty = if high { DIGITAL_HIGH } else { DIGITAL_LOW };
        self.write_channel(channel, duty)
    }

    /// Put the oscillator to sleep. All outputs stop until `wake`.
    pub fn sleep(&mut self) -> Result<(), DeviceError<E>> {
        self.ensure_initialized()?;
        let mode = self.read_register(MODE1)?;
        self.write_register(MODE1, (mode & MODE1_RESTART_MASK) | MODE1_SLEEP)?;
        tracing::info!("PWM controller asleep");
        Ok(())
    }

    /// Wake the oscillator and restart the outputs with their previous ticks.
    pub fn wake(&mut self) -> Result<(), DeviceError<E>> {
        self.ensure_initialized()?;
        let mode = self.read_register(MODE1)? & !MODE1_SLEEP & MODE1_RESTART_MASK;
        self.write_register(MODE1, mode)?;
        self.delay.delay_us(PRESCALE_SETTLE_US);
        self.write_register(MODE1, mode | MODE1_RESUME)?;
        tracing::info!("PWM controller awake");
        Ok(())
    }

    /// Initialize the chip unless that already happened.
    pub fn ensure_initialized(&mut self) -> Result<(), DeviceError<E>> {
        if self.state == ChipState::Uninitialized {
            self.initialize()?;
        }
        Ok(())
    }

    fn check_channel(
        &self,
        channel: u8,
    ) -> Result<(), DeviceError<E>> {
        if channel >= CHANNEL_COUNT {
            tracing::warn!(channel, "channel out of range, ignored");
            return Err(DeviceError::InvalidChannel(channel));
        }
        Ok(())
    }

    fn program_prescale(
        &mut self,
        config: FrequencyConfig,
    ) -> Result<(), DeviceError<E>> {
        let old_mode = self.read_register(MODE1)?;
        self.write_register(MODE1, (old_mode & MODE1_RESTART_MASK) | MODE1_SLEEP)?;
        self.write_register(PRE_SCALE, config.prescale)?;
        self.write_register(MODE1, old_mode)?;
        self.delay.delay_us(PRESCALE_SETTLE_US);
        self.write_register(MODE1, old_mode | MODE1_RESUME)
    }

    fn write_channel(
        &mut self,
        channel: u8,
        duty: DutyCycle,
    ) -> Result<(), DeviceError<E>> {
        let [on_lo, on_hi, off_lo, off_hi] = duty.to_registers();
        let frame = [LED0_ON_L + 4 * channel, on_lo, on_hi, off_lo, off_hi];
        tracing::debug!(channel, on = duty.on, off = duty.off, "channel write");
        self.write_bytes(&frame)
    }

    fn write_bytes(
        &mut self,
        bytes: &[u8],
    ) -> Result<(), DeviceError<E>> {
        self.i2c
            .write(self.address, bytes)
            .map_err(DeviceError::Bus)
    }

    fn write_register(
        &mut self,
        register: u8,
        value: u8,
    ) -> Result<(), DeviceError<E>> {
        self.write_bytes(&[register, value])
    }

    fn read_register(
        &mut self,
        register: u8,
    ) -> Result<u8, DeviceError<E>> {
        let mut value = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut value)
            .map_err(DeviceError::Bus)?;
        Ok(value[0])
    }
}

impl<I2C, D, E> PwmChannels for PwmController<I2C, D>
where
    I2C: I2c<Error = E>,
    D: DelayNs,
    E: core::fmt::Debug,
{
    type BusError = E;

    fn ensure_initialized(&mut self) -> Result<(), DeviceError<E>> {
        PwmController::ensure_initialized(self)
    }

    fn set_channel(
        &mut self,
        channel: u8,
        on: i32,
        off: i32,
    ) -> Result<(), DeviceError<E>> {
        PwmController::set_channel(self, channel, on, off)
    }

    fn settle_ms(
        &mut self,
        ms: u32,
    ) {
        self.delay.delay_ms(ms);
    }
}
