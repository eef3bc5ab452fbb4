//! Bus-side protocol: maps I2C slave events onto the register file.
//!
//! A write transaction carries one address byte followed by data bytes; a
//! read transaction returns the register starting at the cursor. Reads only
//! start on a register's first byte so the master never sees a value split
//! across two transfers.

use heapless::{Deque, Vec};

use crate::{
    RegisterError,
    layout::{MAX_REGISTER_WIDTH, REGISTER_MAP, Register},
    map::ProtectionClass,
    regfile::RegisterFile,
};

/// Bytes returned for a single read request.
pub type ReadResponse = Vec<u8, MAX_REGISTER_WIDTH>;

/// Protocol state between transport events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusState {
    Idle,
    AddressSelected(u16),
    Receiving,
    Transmitting,
}

/// What happened to a byte written by the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteOutcome {
    /// Stored in the register file.
    Written,
    /// Dropped: read-only byte, or a continuation byte outside a burst that
    /// started at its register's first byte.
    Discarded,
}

/// Progress of a burst write into one writable register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Burst {
    reg: Register,
    written: usize,
}

/// Slave-side byte transport, implemented once per bus peripheral.
pub trait BusTransport {
    type Error;

    /// Next byte received from the master in the current transaction.
    fn receive(&mut self) -> Option<u8>;

    /// Queues bytes for the master to read.
    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error>;
}

/// Bus transaction state machine.
///
/// Owned by the bus context; the register file is passed in per event so it
/// can live in a [`RegisterStorage`](crate::RegisterStorage).
#[derive(Debug)]
pub struct BusTransactionHandler {
    state: BusState,
    burst: Option<Burst>,
}

impl Default for BusTransactionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl BusTransactionHandler {
    pub const fn new() -> Self {
        Self {
            state: BusState::Idle,
            burst: None,
        }
    }

    #[inline]
    pub fn state(&self) -> BusState {
        self.state
    }

    /// Master sent the register address.
    ///
    /// Addresses past the end of the file are rejected with `OutOfBounds`;
    /// cursor and state are left untouched.
    pub fn address_select(
        &mut self,
        file: &mut RegisterFile,
        addr: u8,
    ) -> Result<(), RegisterError> {
        file.set_cursor(addr as u16).inspect_err(|_| {
            #[cfg(feature = "defmt")]
            defmt::warn!("bus: address select {} out of range", addr);
        })?;
        self.state = BusState::AddressSelected(addr as u16);
        self.burst = None;
        Ok(())
    }

    /// Master sent a data byte for the register at the cursor.
    ///
    /// The cursor advances whether or not the byte is stored, keeping master
    /// and slave positions in step.
    pub fn write_byte(&mut self, file: &mut RegisterFile, byte: u8) -> WriteOutcome {
        self.state = BusState::Receiving;

        let addr = file.cursor();
        let outcome = match (file.protection(addr), Register::at(addr)) {
            (Some(ProtectionClass::WritableAligned), Some(reg)) => {
                self.burst = Some(Burst { reg, written: 0 });
                self.store(file, addr, byte)
            }
            (Some(ProtectionClass::WritableContinuation), Some(reg)) => match self.burst {
                Some(burst)
                    if burst.reg == reg
                        && burst.reg.offset() as usize + burst.written == addr as usize =>
                {
                    self.store(file, addr, byte)
                }
                _ => {
                    self.burst = None;
                    WriteOutcome::Discarded
                }
            },
            _ => {
                self.burst = None;
                WriteOutcome::Discarded
            }
        };

        #[cfg(feature = "defmt")]
        if outcome == WriteOutcome::Discarded {
            defmt::trace!("bus: discarded write of {=u8} at {=u16}", byte, addr);
        }

        file.advance_cursor();
        outcome
    }

    fn store(&mut self, file: &mut RegisterFile, addr: u16, byte: u8) -> WriteOutcome {
        if file.write_byte(addr, byte).is_err() {
            self.burst = None;
            return WriteOutcome::Discarded;
        }

        if let Some(burst) = self.burst.as_mut() {
            burst.written += 1;
            if burst.written == burst.reg.width() {
                file.mark_updated(burst.reg);
                self.burst = None;
            }
        }
        WriteOutcome::Written
    }

    /// Master requested data.
    ///
    /// On a register's first byte, returns the whole register and advances
    /// the cursor past it. On any other byte, returns nothing and leaves the
    /// cursor where it is.
    pub fn read_request(&mut self, file: &mut RegisterFile) -> ReadResponse {
        let response = self.prepare_read(file);
        file.advance_cursor_by(response.len());
        response
    }

    /// Builds the response for the byte at the cursor without moving it.
    fn prepare_read(&mut self, file: &RegisterFile) -> ReadResponse {
        self.state = BusState::Transmitting;
        self.burst = None;

        let addr = file.cursor();
        let mut response = ReadResponse::new();

        let width = REGISTER_MAP.read_width(addr).unwrap_or(0);
        if width == 0 {
            #[cfg(feature = "defmt")]
            defmt::debug!("bus: misaligned read at {=u16}", addr);
            return response;
        }

        let mut buf = [0u8; MAX_REGISTER_WIDTH];
        if file.read_range(addr, &mut buf[..width]).is_err() {
            return response;
        }
        for &b in &buf[..width] {
            if response.push(b).is_err() {
                break;
            }
        }
        response
    }

    /// Transaction finished. The cursor keeps its position.
    pub fn end_transaction(&mut self) {
        self.state = BusState::Idle;
        self.burst = None;
    }

    /// Handles a complete write transaction from `transport`: one address
    /// byte, then data bytes.
    ///
    /// Returns the number of data bytes stored. If the address is rejected,
    /// the remaining bytes are drained and discarded.
    pub fn service_receive<T: BusTransport>(
        &mut self,
        file: &mut RegisterFile,
        transport: &mut T,
    ) -> Result<usize, RegisterError> {
        let Some(addr) = transport.receive() else {
            return Ok(0);
        };

        if let Err(e) = self.address_select(file, addr) {
            while transport.receive().is_some() {}
            self.end_transaction();
            return Err(e);
        }

        let mut stored = 0;
        while let Some(byte) = transport.receive() {
            if self.write_byte(file, byte) == WriteOutcome::Written {
                stored += 1;
            }
        }

        self.end_transaction();
        Ok(stored)
    }

    /// Handles a read transaction, sending the response through `transport`.
    ///
    /// Returns the number of bytes sent. The cursor only advances once the
    /// transport accepted the response.
    pub fn service_request<T: BusTransport>(
        &mut self,
        file: &mut RegisterFile,
        transport: &mut T,
    ) -> Result<usize, T::Error> {
        let response = self.prepare_read(file);
        let result = transport.send(&response);
        if result.is_ok() {
            file.advance_cursor_by(response.len());
        }
        self.end_transaction();
        result.map(|()| response.len())
    }
}

/// Transport overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoopbackOverflow;

/// In-memory transport for host-side simulation.
///
/// Bytes queued with [`push_received`](Self::push_received) are handed out by
/// `receive`; bytes passed to `send` collect in [`sent`](Self::sent).
pub struct LoopbackTransport<const N: usize> {
    rx: Deque<u8, N>,
    tx: Vec<u8, N>,
}

impl<const N: usize> core::fmt::Debug for LoopbackTransport<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("pending", &self.rx.len())
            .field("sent", &self.tx.as_slice())
            .finish()
    }
}

impl<const N: usize> Default for LoopbackTransport<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> LoopbackTransport<N> {
    pub fn new() -> Self {
        Self {
            rx: Deque::new(),
            tx: Vec::new(),
        }
    }

    /// Queues bytes as if written by the master.
    pub fn push_received(&mut self, data: &[u8]) -> Result<(), LoopbackOverflow> {
        for &b in data {
            self.rx.push_back(b).map_err(|_| LoopbackOverflow)?;
        }
        Ok(())
    }

    /// Bytes sent to the master so far.
    pub fn sent(&self) -> &[u8] {
        &self.tx
    }

    pub fn clear_sent(&mut self) {
        self.tx.clear();
    }
}

impl<const N: usize> BusTransport for LoopbackTransport<N> {
    type Error = LoopbackOverflow;

    fn receive(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn send(&mut self, data: &[u8]) -> Result<(), LoopbackOverflow> {
        for &b in data {
            self.tx.push(b).map_err(|_| LoopbackOverflow)?;
        }
        Ok(())
    }
}
