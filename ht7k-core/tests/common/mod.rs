//! Register-level fake of the PWM chip.
//!
//! Bus writes and delays land in one shared event log so tests can check the
//! interleaving of register traffic and settle waits.

#![allow(dead_code)]

use std::{cell::RefCell, rc::Rc};

use embedded_hal::{
    delay::DelayNs,
    i2c::{ErrorKind, ErrorType, I2c, Operation},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Write(u8, Vec<u8>),
    Read(u8, u8),
    DelayNs(u64),
}

#[derive(Default)]
pub struct ChipModel {
    pub registers: Vec<u8>,
    pointer: usize,
    pub log: Vec<Event>,
}

impl ChipModel {
    /// On/off ticks currently latched for `channel`.
    pub fn channel(
        &self,
        channel: u8,
    ) -> (u16, u16) {
        let base = 0x06 + 4 * channel as usize;
        let r = &self.registers;
        (
            u16::from_le_bytes([r[base], r[base + 1]]),
            u16::from_le_bytes([r[base + 2], r[base + 3]]),
        )
    }

    /// Channel frames written so far, as `(channel, on, off)`.
    pub fn channel_writes(&self) -> Vec<(u8, u16, u16)> {
        self.log
            .iter()
            .filter_map(|e| match e {
                Event::Write(_, bytes) if bytes.len() == 5 => Some((
                    (bytes[0] - 0x06) / 4,
                    u16::from_le_bytes([bytes[1], bytes[2]]),
                    u16::from_le_bytes([bytes[3], bytes[4]]),
                )),
                _ => None,
            })
            .collect()
    }

    pub fn delays(&self) -> Vec<u64> {
        self.log
            .iter()
            .filter_map(|e| match e {
                Event::DelayNs(ns) => Some(*ns),
                _ => None,
            })
            .collect()
    }
}

pub type SharedChip = Rc<RefCell<ChipModel>>;

pub fn chip() -> SharedChip {
    Rc::new(RefCell::new(ChipModel {
        registers: vec![0; 256],
        ..Default::default()
    }))
}

pub struct FakeBus(pub SharedChip);
pub struct FakeDelay(pub SharedChip);

impl ErrorType for FakeBus {
    type Error = ErrorKind;
}

impl I2c for FakeBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut chip = self.0.borrow_mut();
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    chip.log.push(Event::Write(address, bytes.to_vec()));
                    if let Some((&reg, data)) = bytes.split_first() {
                        chip.pointer = reg as usize;
                        for (i, &b) in data.iter().enumerate() {
                            let idx = reg as usize + i;
                            chip.registers[idx] = b;
                        }
                    }
                }
                Operation::Read(buf) => {
                    for (i, b) in buf.iter_mut().enumerate() {
                        *b = chip.registers[chip.pointer + i];
                    }
                    let value = buf.first().copied().unwrap_or(0);
                    let reg = chip.pointer as u8;
                    chip.log.push(Event::Read(reg, value));
                }
            }
        }
        Ok(())
    }
}

impl DelayNs for FakeDelay {
    fn delay_ns(
        &mut self,
        ns: u32,
    ) {
        self.0.borrow_mut().log.push(Event::DelayNs(ns as u64));
    }

    fn delay_us(
        &mut self,
        us: u32,
    ) {
        self.0.borrow_mut().log.push(Event::DelayNs(us as u64 * 1_000));
    }

    fn delay_ms(
        &mut self,
        ms: u32,
    ) {
        self.0.borrow_mut().log.push(Event::DelayNs(ms as u64 * 1_000_000));
    }
}
