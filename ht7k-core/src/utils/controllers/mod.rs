//! Module Exports
//!
//! This file exports the driver stack of the HT7K motor board.
//!
//! - `pca9685`: PWM controller (bring-up, frequency, raw channel writes).
//! - `motors`: motor slot table and H-bridge actuation on top of the PWM
//!   controller.

pub mod motors;
/// Module for the PCA9685-family PWM chip.
pub mod pca9685;

use core::cell::RefCell;

use embedded_hal::delay::DelayNs;
use embedded_hal_bus::i2c::RefCellDevice;

pub use motors::{Direction, MotorCommand, MotorDriver, MotorSlot, MOTOR_CHANNEL};
pub use pca9685::{DeviceError, FrequencyConfig, PwmController};

/// Concrete driver stack used by `SystemController`.
pub type BoardMotors<I2C, D> = MotorDriver<PwmController<RefCellDevice<'static, I2C>, D>>;

/// Outcome of `SystemController::drain`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Drained {
    /// Commands taken off the channel.
    pub handled: usize,
    /// Commands the driver rejected or the bus failed.
    pub failed: usize,
}

/// Owns the board's motor stack and executes `MotorCommand`s against it.
pub struct SystemController<I2C: 'static, D> {
    pub motors: BoardMotors<I2C, D>,
}

impl<I2C, D, E> SystemController<I2C, D>
where
    I2C: embedded_hal::i2c::I2c<Error = E> + 'static,
    D: DelayNs,
    E: core::fmt::Debug,
{
    /// Build the stack on a shared bus. The chip is brought up lazily by the
    /// first command that touches it.
    pub fn new(
        i2c_bus: &'static RefCell<I2C>,
        delay: D,
        address: Option<u8>,
        frequency_hz: Option<u32>,
    ) -> Self {
        let frequency = frequency_hz.and_then(|hz| {
            let config = FrequencyConfig::new(hz);
            if config.is_none() {
                tracing::warn!(hz, "invalid PWM frequency, using default");
            }
            config
        });
        let pwm = PwmController::new(RefCellDevice::new(i2c_bus), delay, address, frequency);

        SystemController {
            motors: MotorDriver::new(pwm),
        }
    }

    /// Execute a single command.
    pub fn execute(
        &mut self,
        command: MotorCommand,
    ) -> Result<(), DeviceError<E>> {
        match command {
            MotorCommand::Run { m, d, s } => self.motors.run_directional(m, d, s),
            MotorCommand::Signed { m, s } => self.motors.run_signed(m, s),
            MotorCommand::Stop { m } => self.motors.stop(m),
            MotorCommand::Level { c, l } => self.motors.pwm().set_digital_level(c, l),
            MotorCommand::Freq { f } => self.motors.pwm().set_frequency(f),
            MotorCommand::Raw { c, on, off } => self.motors.pwm().set_channel(c, on, off),
            MotorCommand::Sleep => self.motors.pwm().sleep(),
            MotorCommand::Wake => self.motors.pwm().wake(),
        }
    }

    /// Execute every command currently queued on `MOTOR_CHANNEL`.
    pub fn drain(&mut self) -> Drained {
        let mut drained = Drained::default();
        while let Ok(command) = MOTOR_CHANNEL.try_receive() {
            drained.handled += 1;
            if self.dispatch(command).is_err() {
                drained.failed += 1;
            }
        }
        drained
    }

    /// Wait for the next queued command and execute it.
    pub async fn next_command(&mut self) -> Result<(), DeviceError<E>> {
        let command = MOTOR_CHANNEL.receiver().receive().await;
        tracing::info!("Received motor command: {:?}", command);
        self.dispatch(command)
    }

    pub async fn motor_ch(&mut self) -> ! {
        loop {
            let _ = self.next_command().await;
        }
    }

    fn dispatch(
        &mut self,
        command: MotorCommand,
    ) -> Result<(), DeviceError<E>> {
        let result = self.execute(command);
        match &result {
            Ok(()) => tracing::info!("motor command executed"),
            Err(e) => tracing::error!(?e, "motor command failed: {:?}", command),
        }
        result
    }
}
