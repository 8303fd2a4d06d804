//! Device front end tests: sessions and control commands

mod common;

use accel_queue::hal::RegionPinner;
use accel_queue::{AccelError, Accelerator, Direction, EngineConfig, Request, SliceMemory};
use common::{pinner, FifoModel};

const USER_BASE: usize = 0x7000_0000;
const RECORD_AT: usize = USER_BASE;
const STATUS_AT: usize = USER_BASE + 0x40;

type Device = Accelerator<RegionPinner, FifoModel>;

fn device() -> Device {
    Accelerator::with_config(EngineConfig::default(), pinner(), FifoModel::new()).unwrap()
}

#[test]
fn test_second_open_busy_until_release() {
    let dev = device();
    let first = dev.open().unwrap();
    assert!(matches!(dev.open(), Err(AccelError::Busy)));
    assert_eq!(AccelError::Busy.errno(), -16);

    drop(first);
    let second = dev.open();
    assert!(second.is_ok());
}

#[test]
fn test_ioctl_submit_then_poll() {
    let dev = device();
    let handle = dev.open().unwrap();
    let mut backing = vec![0u8; 0x80];
    let mut user = SliceMemory::new(USER_BASE, &mut backing);

    user.write_request(RECORD_AT, &Request::new(0x1000, 0x2000, 64, 2, 0)).unwrap();
    handle.ioctl(1, RECORD_AT, &mut user).unwrap();

    handle.ioctl(0, STATUS_AT, &mut user).unwrap();
    assert_eq!(user.read_i32(STATUS_AT), Ok(1));

    dev.with_engine(|e| e.registers_mut().drain());
    handle.ioctl(0, STATUS_AT, &mut user).unwrap();
    assert_eq!(user.read_i32(STATUS_AT), Ok(0));

    let stats = handle.stats();
    assert_eq!(stats.submitted, 1);
    assert_eq!(stats.descriptors(), 2);
    assert_eq!(stats.reclaimed_ops, 1);
}

#[test]
fn test_ioctl_rejects_bad_record() {
    let dev = device();
    let handle = dev.open().unwrap();
    let mut backing = vec![0u8; 0x80];
    let mut user = SliceMemory::new(USER_BASE, &mut backing);

    user.write_request(RECORD_AT, &Request::new(0x1000, 0x2000, 65, 2, 0)).unwrap();
    let err = handle.ioctl(1, RECORD_AT, &mut user).unwrap_err();
    assert_eq!(err.errno(), -22);
    assert!(!handle.poll());

    // Record outside caller memory
    let err = handle.ioctl(1, USER_BASE + 0x1000, &mut user).unwrap_err();
    assert_eq!(err, AccelError::BadAddress(USER_BASE + 0x1000));
    assert_eq!(err.errno(), -14);
    dev.with_engine(|e| assert_eq!(e.pinner().pin_calls(), 0));
}

#[test]
fn test_ioctl_unknown_command() {
    let dev = device();
    let handle = dev.open().unwrap();
    let mut backing = vec![0u8; 0x80];
    let mut user = SliceMemory::new(USER_BASE, &mut backing);

    let err = handle.ioctl(42, STATUS_AT, &mut user).unwrap_err();
    assert_eq!(err, AccelError::Unsupported(42));
    assert_eq!(err.errno(), -38);
    assert_eq!(user.read_i32(STATUS_AT), Ok(0));
    dev.with_engine(|e| assert_eq!(e.registers().write_count(), 0));
}

#[test]
fn test_queue_survives_reopen() {
    let dev = device();
    {
        let handle = dev.open().unwrap();
        dev.with_engine(|e| e.registers_mut().set_full(Direction::Source, true));
        handle.submit(Request::new(0x1000, 0x2000, 64, 0, 0)).unwrap();
        handle.close();
    }

    let handle = dev.open().unwrap();
    dev.with_engine(|e| e.registers_mut().set_full(Direction::Source, false));
    assert!(handle.poll());
    assert_eq!(handle.stats().descriptors(), 2);

    drop(handle);
    let engine = dev.into_engine();
    assert_eq!(engine.in_flight_len(), 1);
}
