//! Test support utilities - only compiled in test builds.

use heapless::Deque;

use crate::{
    RegisterError,
    bus::{BusTransactionHandler, LoopbackTransport, ReadResponse},
    device::{Reading, SensorError, TemperatureHumiditySensor},
    persist::NvStorage,
    regfile::RegisterFile,
};

/// Loopback transport large enough for any single transaction.
pub type TestTransport = LoopbackTransport<64>;

/// 64-byte EEPROM, enough for the default persistence layout.
pub type TestEeprom = MemoryEeprom<64>;

/// Runs one master write transaction: `frame[0]` is the register address.
pub fn master_write(
    bus: &mut BusTransactionHandler,
    file: &mut RegisterFile,
    frame: &[u8],
) -> Result<usize, RegisterError> {
    let mut transport = TestTransport::new();
    transport.push_received(frame).unwrap();
    bus.service_receive(file, &mut transport)
}

/// Runs one master read request and returns what the device sent.
pub fn master_read(bus: &mut BusTransactionHandler, file: &mut RegisterFile) -> ReadResponse {
    let mut transport = TestTransport::new();
    bus.service_request(file, &mut transport).unwrap();
    ReadResponse::from_slice(transport.sent()).unwrap()
}

/// Address past the end of a [`MemoryEeprom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EepromOutOfRange;

/// Erased-to-zero EEPROM that counts physical byte writes.
#[derive(Debug, Clone)]
pub struct MemoryEeprom<const N: usize> {
    cells: [u8; N],
    writes: usize,
}

impl<const N: usize> MemoryEeprom<N> {
    pub const CAPACITY: usize = N;

    pub fn new() -> Self {
        Self {
            cells: [0; N],
            writes: 0,
        }
    }

    pub fn byte(&self, addr: usize) -> u8 {
        self.cells[addr]
    }

    pub fn bytes(&self, addr: usize, len: usize) -> &[u8] {
        &self.cells[addr..addr + len]
    }

    /// Flips one bit behind the storage's back, as a worn cell would.
    pub fn flip_bit(&mut self, addr: u16, bit: u8) {
        self.cells[addr as usize] ^= 1 << bit;
    }

    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl<const N: usize> NvStorage for MemoryEeprom<N> {
    type Error = EepromOutOfRange;

    fn read(&mut self, addr: u16) -> Result<u8, EepromOutOfRange> {
        self.cells.get(addr as usize).copied().ok_or(EepromOutOfRange)
    }

    fn write(&mut self, addr: u16, value: u8) -> Result<(), EepromOutOfRange> {
        let cell = self.cells.get_mut(addr as usize).ok_or(EepromOutOfRange)?;
        *cell = value;
        self.writes += 1;
        Ok(())
    }
}

/// Storage whose every access fails.
#[derive(Debug, Clone, Copy)]
pub struct FailingEeprom;

impl NvStorage for FailingEeprom {
    type Error = ();

    fn read(&mut self, _addr: u16) -> Result<u8, ()> {
        Err(())
    }

    fn write(&mut self, _addr: u16, _value: u8) -> Result<(), ()> {
        Err(())
    }
}

/// Sensor that replays queued results, then repeats a fixed reading if one
/// was given, else reports [`SensorError::NoReading`].
#[derive(Debug)]
pub struct ScriptedSensor {
    script: Deque<Result<Reading, SensorError>, 8>,
    repeat: Option<Reading>,
    reads: usize,
}

impl ScriptedSensor {
    pub fn new() -> Self {
        Self {
            script: Deque::new(),
            repeat: None,
            reads: 0,
        }
    }

    pub fn repeating(reading: Reading) -> Self {
        Self {
            repeat: Some(reading),
            ..Self::new()
        }
    }

    pub fn push(&mut self, result: Result<Reading, SensorError>) {
        self.script.push_back(result).unwrap();
    }

    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl TemperatureHumiditySensor for ScriptedSensor {
    fn read(&mut self) -> Result<Reading, SensorError> {
        self.reads += 1;
        match self.script.pop_front() {
            Some(result) => result,
            None => self.repeat.ok_or(SensorError::NoReading),
        }
    }
}
