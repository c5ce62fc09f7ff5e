use clap::{Parser, Subcommand, ValueEnum};
use core::cell::RefCell;
use critical_section as _;
use embedded_hal::{
    delay::DelayNs,
    i2c::{ErrorKind, ErrorType, I2c, Operation},
};
use ht7k_core::mk_static;
use ht7k_core::utils::connection::try_forward;
use ht7k_core::utils::controllers::{Direction, MotorCommand, MotorSlot, MOTOR_CHANNEL};
use ht7k_core::utils::SystemController;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts {
    /// PWM chip bus address (decimal or 0x-prefixed hex)
    #[clap(long, value_parser = parse_address)]
    address: Option<u8>,
    /// PWM frequency programmed at bring-up (Hz)
    #[clap(long)]
    frequency: Option<u32>,
    #[clap(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run a motor slot in a direction (speed 0..=255)
    Run {
        #[clap(long, value_enum)]
        motor: Slot,
        #[clap(long, value_enum, default_value = "cw")]
        dir: Dir,
        #[clap(long)]
        speed: u8,
    },
    /// Run motor 1..=4 at a signed speed (-255..=255)
    Signed {
        #[clap(long)]
        motor: u8,
        #[clap(long, allow_hyphen_values = true)]
        speed: i16,
    },
    /// Stop a motor slot
    Stop {
        #[clap(long, value_enum)]
        motor: Slot,
    },
    /// Drive a channel as a digital output
    Level {
        #[clap(long)]
        channel: u8,
        #[clap(long)]
        high: bool,
    },
    /// Program the PWM frequency (Hz)
    Freq { hz: u32 },
    /// Write raw on/off ticks to a channel
    Raw {
        #[clap(long)]
        channel: u8,
        #[clap(long, default_value_t = 0)]
        on: i32,
        #[clap(long)]
        off: i32,
    },
    /// Put the PWM oscillator to sleep
    Sleep,
    /// Wake the PWM oscillator
    Wake,
    /// Forward raw JSON command frames, e.g. '{"mc":"stop","m":"all"}'
    Json { frames: Vec<String> },
}

#[derive(Clone, Copy, ValueEnum)]
enum Slot {
    M1,
    M2,
    M3,
    M4,
    All,
}

impl From<Slot> for MotorSlot {
    fn from(slot: Slot) -> Self {
        match slot {
            Slot::M1 => MotorSlot::M1,
            Slot::M2 => MotorSlot::M2,
            Slot::M3 => MotorSlot::M3,
            Slot::M4 => MotorSlot::M4,
            Slot::All => MotorSlot::All,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Dir {
    Cw,
    Ccw,
}

impl From<Dir> for Direction {
    fn from(dir: Dir) -> Self {
        match dir {
            Dir::Cw => Direction::Cw,
            Dir::Ccw => Direction::Ccw,
        }
    }
}

fn parse_address(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid bus address `{}`: {}", s, e))
}

/// I2C bus that logs every transfer and answers reads from a register file.
struct SerialI2cBus {
    registers: [u8; 256],
    pointer: usize,
}

impl SerialI2cBus {
    fn new() -> Self {
        SerialI2cBus {
            registers: [0; 256],
            pointer: 0,
        }
    }
}

impl ErrorType for SerialI2cBus {
    type Error = ErrorKind;
}

impl I2c for SerialI2cBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    info!("I2C 0x{:02X} <- {:02X?}", address, bytes);
                    let Some((&reg, data)) = bytes.split_first() else {
                        continue;
                    };
                    self.pointer = reg as usize;
                    for (i, &b) in data.iter().enumerate() {
                        let idx = (reg as usize + i) % self.registers.len();
                        self.registers[idx] = b;
                    }
                }
                Operation::Read(buf) => {
                    for (i, b) in buf.iter_mut().enumerate() {
                        *b = self.registers[(self.pointer + i) % self.registers.len()];
                    }
                    info!("I2C 0x{:02X} -> {:02X?}", address, buf);
                }
            }
        }
        Ok(())
    }
}

/// Blocking delay on the host thread.
struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(
        &mut self,
        ns: u32,
    ) {
        std::thread::sleep(Duration::from_nanos(ns as u64));
    }
}

fn command_for(cmd: &Cmd) -> Option<MotorCommand> {
    let command = match *cmd {
        Cmd::Run { motor, dir, speed } => MotorCommand::Run {
            m: motor.into(),
            d: dir.into(),
            s: speed,
        },
        Cmd::Signed { motor, speed } => MotorCommand::Signed { m: motor, s: speed },
        Cmd::Stop { motor } => MotorCommand::Stop { m: motor.into() },
        Cmd::Level { channel, high } => MotorCommand::Level { c: channel, l: high },
        Cmd::Freq { hz } => MotorCommand::Freq { f: hz },
        Cmd::Raw { channel, on, off } => MotorCommand::Raw { c: channel, on, off },
        Cmd::Sleep => MotorCommand::Sleep,
        Cmd::Wake => MotorCommand::Wake,
        Cmd::Json { .. } => return None,
    };
    Some(command)
}

/// Queue the requested command(s), execute them, and count what was rejected
/// (undecodable frames, a full queue, or commands the driver refused).
fn run(
    command: &Cmd,
    sys_ctrl: &mut SystemController<SerialI2cBus, StdDelay>,
) -> usize {
    let mut rejected = 0;
    match command {
        Cmd::Json { frames } => {
            for frame in frames {
                if let Err(e) = try_forward(frame.as_bytes()) {
                    warn!("{}: {}", e.reply(), frame);
                    rejected += 1;
                }
            }
        }
        other => {
            if let Some(command) = command_for(other) {
                if MOTOR_CHANNEL.try_send(command).is_err() {
                    error!("command queue full");
                    rejected += 1;
                }
            }
        }
    }

    let drained = sys_ctrl.drain();
    rejected += drained.failed;
    info!(handled = drained.handled, rejected, "done");
    rejected
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let opts: Opts = Opts::parse();

    let i2c_bus = mk_static!(RefCell<SerialI2cBus>, RefCell::new(SerialI2cBus::new()));
    let mut sys_ctrl = SystemController::new(i2c_bus, StdDelay, opts.address, opts.frequency);

    if run(&opts.command, &mut sys_ctrl) == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
