mod common;

use common::{chip, Event, FakeBus, FakeDelay, SharedChip};
use ht7k_core::utils::controllers::{
    motors::{resolve_channels, MOTOR_SETTLE_MS},
    pca9685::{PRESCALE_SETTLE_US, PwmController},
    Direction, MotorDriver, MotorSlot,
};

const ADDR: u8 = 0x40;

fn driver(chip: &SharedChip) -> MotorDriver<PwmController<FakeBus, FakeDelay>> {
    MotorDriver::new(PwmController::new(
        FakeBus(chip.clone()),
        FakeDelay(chip.clone()),
        None,
        None,
    ))
}

#[test]
fn frequency_sequence_order() {
    let chip = chip();
    let mut pwm = PwmController::new(FakeBus(chip.clone()), FakeDelay(chip.clone()), None, None);
    pwm.set_frequency(50).unwrap();

    let log = chip.borrow().log.clone();
    assert_eq!(
        log,
        vec![
            Event::Write(ADDR, vec![0x00]),
            Event::Read(0x00, 0x00),
            Event::Write(ADDR, vec![0x00, 0x10]),
            Event::Write(ADDR, vec![0xFE, 121]),
            Event::Write(ADDR, vec![0x00, 0x00]),
            Event::DelayNs(PRESCALE_SETTLE_US as u64 * 1_000),
            Event::Write(ADDR, vec![0x00, 0xA1]),
        ]
    );
    assert!(PRESCALE_SETTLE_US >= 5_000);
}

#[test]
fn first_motor_command_brings_chip_up() {
    let chip = chip();
    let mut drv = driver(&chip);
    drv.run_directional(MotorSlot::M1, Direction::Cw, 255).unwrap();

    let c = chip.borrow();
    // 16 clearing frames from bring-up, then exactly the two motor frames.
    let writes = c.channel_writes();
    assert_eq!(writes.len(), 18);
    assert!(writes[..16].iter().all(|&(_, on, off)| on == 0 && off == 0));
    assert_eq!(&writes[16..], &[(11, 0, 0), (12, 0, 4080)]);
    assert_eq!(c.registers[0xFE], 121);
    assert_eq!(c.registers[0x00], 0xA1);
}

#[test]
fn ccw_zero_and_stop_leave_same_state() {
    let a = chip();
    let mut drv = driver(&a);
    drv.run_directional(MotorSlot::M1, Direction::Cw, 200).unwrap();
    drv.run_directional(MotorSlot::M1, Direction::Ccw, 0).unwrap();

    let b = chip();
    let mut drv = driver(&b);
    drv.run_directional(MotorSlot::M1, Direction::Cw, 200).unwrap();
    drv.stop(MotorSlot::M1).unwrap();

    for ch in [12, 11] {
        assert_eq!(a.borrow().channel(ch), (0, 0));
        assert_eq!(b.borrow().channel(ch), (0, 0));
    }
}

#[test]
fn signed_reverse_motor_two() {
    let chip = chip();
    let mut drv = driver(&chip);
    drv.run_signed(2, -100).unwrap();

    let c = chip.borrow();
    assert_eq!(c.channel(10), (0, 0));
    assert_eq!(c.channel(9), (0, 1600));
}

#[test]
fn all_motors_settle_between_each() {
    let chip = chip();
    let mut drv = driver(&chip);
    drv.pwm().initialize().unwrap();
    chip.borrow_mut().log.clear();

    drv.run_directional(MotorSlot::All, Direction::Ccw, 64).unwrap();

    let c = chip.borrow();
    let settle = MOTOR_SETTLE_MS as u64 * 1_000_000;
    let mut frames = 0;
    let mut expected_delays = 0;
    for event in &c.log {
        match event {
            Event::Write(_, bytes) => {
                assert_eq!(bytes.len(), 5);
                frames += 1;
            }
            Event::DelayNs(ns) => {
                assert_eq!(*ns, settle);
                // Settles only ever sit between two complete bridges.
                assert_eq!(frames % 2, 0);
                assert!(frames > 0 && frames < 8);
                expected_delays += 1;
            }
            Event::Read(..) => panic!("unexpected read"),
        }
    }
    assert_eq!(frames, 8);
    assert_eq!(expected_delays, 3);
    for pair in resolve_channels(MotorSlot::All) {
        assert_eq!(c.channel(pair.forward), (0, 0));
        assert_eq!(c.channel(pair.reverse), (0, 1024));
    }
}

#[test]
fn reversal_never_drives_both_legs() {
    let chip = chip();
    let mut drv = driver(&chip);
    drv.run_signed(3, 200).unwrap();
    let start = chip.borrow().channel_writes().len();
    drv.run_signed(3, -200).unwrap();
    drv.run_directional(MotorSlot::M3, Direction::Cw, 200).unwrap();

    // Replay the writes and check the bridge after each one.
    let c = chip.borrow();
    let mut forward = (0u16, 3200u16);
    let mut reverse = (0u16, 0u16);
    for &(ch, on, off) in &c.channel_writes()[start..] {
        match ch {
            8 => forward = (on, off),
            7 => reverse = (on, off),
            _ => unreachable!(),
        }
        assert!(forward.1 == 0 || reverse.1 == 0, "both legs active");
    }
}

#[test]
fn digital_level_latches_override_bits() {
    let chip = chip();
    let mut drv = driver(&chip);
    drv.pwm().set_digital_level(0, true).unwrap();
    assert_eq!(chip.borrow().channel(0), (4096, 0));
    drv.pwm().set_digital_level(0, false).unwrap();
    assert_eq!(chip.borrow().channel(0), (0, 4096));
}
