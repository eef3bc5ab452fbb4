//! A `no_std`, no-alloc virtual register file for an I2C temperature/humidity
//! peripheral.
//!
//! The device exposes a fixed byte array to an I2C master. Multi-byte values
//! are little-endian and register ids are byte offsets, so the master reads
//! and writes typed registers with plain byte transfers.
//!
//! # Features
//!
//! - **Const register map** - Layout, ownership and protection resolved at compile time
//! - **Width-aware bus protocol** - Reads return a whole register, never a torn value
//! - **Write protection** - Read-only bytes are silently ignored on the wire
//! - **Update tracking** - The main loop sees which registers the master changed
//! - **Crash-safe persistence** - Signature and CRC per EEPROM block
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐         ┌──────────────────────────┐
//! │   Bus (I2C ISR)      │         │   Main loop (Device)     │
//! │                      │         │                          │
//! │  address_select()    │         │  poll()                  │
//! │  write_byte()        │────────▶│  (drains updated flags,  │
//! │  (marks updated)     │ updated │   acts on config bits)   │
//! │                      │  bits   │                          │
//! │  read_request()      │◀────────│  readings, status bits   │
//! │                      │  values │  ConfigPersistence       │
//! └──────────────────────┘         └──────────────────────────┘
//!              ▲                               ▲
//!              └────────── RegisterStorage ────┘
//!                     (critical section)
//! ```
//!
//! - **Master writes** land only on writable bytes and mark a register updated
//!   once its full width arrived in one burst
//! - **Master reads** at an aligned address return the whole register
//! - **The main loop** publishes readings, evaluates thresholds, and saves or
//!   erases configuration when the master sets the trigger bits
//!
//! # Example
//!
//! ```rust,no_run
//! use sensor_regfile::prelude::*;
//!
//! let registers = RegisterStorage::with_defaults(&Defaults::default());
//! let mut bus = BusTransactionHandler::new();
//! let mut transport = LoopbackTransport::<16>::new();
//!
//! // I2C receive interrupt: the master selects Interval and writes 5000 ms.
//! let mut frame = [0u8; 5];
//! frame[0] = Register::Interval.offset() as u8;
//! frame[1..].copy_from_slice(&5000u32.to_le_bytes());
//! transport.push_received(&frame).unwrap();
//! registers.with_file(|file| bus.service_receive(file, &mut transport)).unwrap();
//!
//! // Main loop: the update is visible as a typed value.
//! let interval = registers.with_file(|file| file.read::<u32>(Register::Interval));
//! assert_eq!(interval, Ok(5000));
//! ```

#![deny(unsafe_code)]
#![no_std]

pub mod bus;
pub mod codec;
pub mod device;
pub mod error;
pub mod helpers;
pub mod layout;
pub mod map;
pub mod persist;
pub mod regfile;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use bus::{
    BusState, BusTransactionHandler, BusTransport, LoopbackTransport, ReadResponse, WriteOutcome,
};
pub use codec::ByteCodec;
pub use device::{Device, PollOutcome, Reading, SensorError, TemperatureHumiditySensor};
pub use error::RegisterError;
pub use layout::{ConfigBit, Defaults, REGISTER_MAP, REGISTER_TOTAL_SIZE, Register, StatusBit};
pub use map::{Access, ProtectionClass, RegisterKind, RegisterMap};
pub use persist::{
    ConfigPersistence, ConfigSnapshot, NvStorage, PersistBlock, PersistLayout, RestoreReport,
};
pub use regfile::RegisterFile;
pub use storage::RegisterStorage;

pub mod prelude {
    pub use super::{
        BusTransactionHandler, BusTransport, ByteCodec, ConfigBit, ConfigPersistence, Defaults,
        Device, LoopbackTransport, NvStorage, PollOutcome, Reading, Register, RegisterError,
        RegisterFile, RegisterStorage, SensorError, StatusBit, TemperatureHumiditySensor,
    };
}
