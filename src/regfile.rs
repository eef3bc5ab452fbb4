use bitmaps::Bitmap;

use crate::{
    RegisterError,
    codec::ByteCodec,
    helpers::range_span,
    layout::{
        ConfigBit, DEVICE_ID, Defaults, FIRMWARE_VERSION_BUILD, FIRMWARE_VERSION_MAJOR,
        FIRMWARE_VERSION_MINOR, REGISTER_COUNT, REGISTER_MAP, REGISTER_TOTAL_SIZE, Register,
        StatusBit,
    },
    map::ProtectionClass,
};

/// The device's register file: the byte array the bus master sees, a bus
/// cursor, and the set of writable registers the master has updated.
///
/// Writes are visible immediately. Nothing here is transactional; a typed
/// accessor call is the largest unit that happens as a whole.
pub struct RegisterFile {
    bytes: [u8; REGISTER_TOTAL_SIZE],
    cursor: u16,
    updated: Bitmap<REGISTER_COUNT>,
}

impl core::fmt::Debug for RegisterFile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegisterFile")
            .field("bytes", &self.bytes)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    /// Creates an all-zero register file with the cursor at 0.
    pub fn new() -> Self {
        Self {
            bytes: [0; REGISTER_TOTAL_SIZE],
            cursor: 0,
            updated: Bitmap::new(),
        }
    }

    /// Creates a register file holding the device identity and `defaults`.
    pub fn with_defaults(defaults: &Defaults) -> Self {
        let mut file = Self::new();
        file.load_defaults(defaults);
        file
    }

    /// Loads the device identity and factory configuration.
    ///
    /// Does not mark anything updated.
    pub fn load_defaults(&mut self, defaults: &Defaults) {
        self.put(Register::Id, DEVICE_ID);
        self.put(Register::VersionMajor, FIRMWARE_VERSION_MAJOR);
        self.put(Register::VersionMinor, FIRMWARE_VERSION_MINOR);
        self.put(Register::VersionBuild, FIRMWARE_VERSION_BUILD);
        self.put(Register::Interval, defaults.interval_ms);
        self.put(Register::UpperThreshold, defaults.upper_threshold);
        self.put(Register::LowerThreshold, defaults.lower_threshold);
        self.put(Register::StartDelay, defaults.start_delay_ms);
        self.put(Register::Config, defaults.config);
        self.put(Register::DeviceAddress, defaults.device_address);
        self.put(Register::SensorModel, defaults.sensor_model);
    }

    /// Typed write for values whose width is known to match the layout.
    fn put<T: ByteCodec>(&mut self, reg: Register, value: T) {
        let offset = reg.offset() as usize;
        let encoded = value.encode();
        let data = encoded.as_ref();
        debug_assert_eq!(data.len(), reg.width());
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Typed read for values whose width is known to match the layout.
    fn get<T: ByteCodec>(&self, reg: Register) -> T {
        let mut bytes = T::Bytes::default();
        let dst = bytes.as_mut();
        debug_assert_eq!(dst.len(), reg.width());
        dst.copy_from_slice(self.register_bytes(reg));
        T::decode(&bytes)
    }

    pub fn interval_ms(&self) -> u32 {
        self.get(Register::Interval)
    }

    pub fn start_delay_ms(&self) -> u32 {
        self.get(Register::StartDelay)
    }

    pub fn upper_threshold(&self) -> f32 {
        self.get(Register::UpperThreshold)
    }

    pub fn lower_threshold(&self) -> f32 {
        self.get(Register::LowerThreshold)
    }

    pub fn reading_id(&self) -> u32 {
        self.get(Register::ReadingId)
    }

    /// Publishes a sensor reading and bumps the reading id, wrapping at
    /// `u32::MAX`. Returns the new id.
    pub fn record_reading(&mut self, temperature: f32, humidity: f32) -> u32 {
        self.put(Register::Temperature, temperature);
        self.put(Register::Humidity, humidity);
        let id = self.reading_id().wrapping_add(1);
        self.put(Register::ReadingId, id);
        id
    }

    /// Reads one raw byte.
    pub fn read_byte(&self, addr: u16) -> Result<u8, RegisterError> {
        self.bytes
            .get(addr as usize)
            .copied()
            .ok_or(RegisterError::OutOfBounds)
    }

    /// Writes one raw byte, ignoring protection.
    pub fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), RegisterError> {
        let byte = self
            .bytes
            .get_mut(addr as usize)
            .ok_or(RegisterError::OutOfBounds)?;
        *byte = value;
        Ok(())
    }

    /// Copies `out.len()` bytes starting at `addr`.
    pub fn read_range(&self, addr: u16, out: &mut [u8]) -> Result<(), RegisterError> {
        let (offset, end) = range_span::<REGISTER_TOTAL_SIZE>(addr, out.len())?;
        out.copy_from_slice(&self.bytes[offset..end]);
        Ok(())
    }

    /// Writes `data` starting at `addr`, ignoring protection.
    pub fn write_range(&mut self, addr: u16, data: &[u8]) -> Result<(), RegisterError> {
        let (offset, end) = range_span::<REGISTER_TOTAL_SIZE>(addr, data.len())?;
        self.bytes[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Reads a register as `T`.
    ///
    /// Returns `WidthMismatch` if `T` is not as wide as the register.
    pub fn read<T: ByteCodec>(&self, reg: Register) -> Result<T, RegisterError> {
        T::decode_slice(self.register_bytes(reg))
    }

    /// Writes a register as `T`.
    ///
    /// Returns `WidthMismatch` if `T` is not as wide as the register.
    pub fn write<T: ByteCodec>(&mut self, reg: Register, value: T) -> Result<(), RegisterError> {
        if T::WIDTH != reg.width() {
            return Err(RegisterError::WidthMismatch);
        }
        self.put(reg, value);
        Ok(())
    }

    /// Raw bytes of a register.
    pub fn register_bytes(&self, reg: Register) -> &[u8] {
        let desc = reg.descriptor();
        &self.bytes[desc.offset as usize..desc.end()]
    }

    /// Overwrites a register from raw bytes, which must match its width.
    pub fn write_register_bytes(
        &mut self,
        reg: Register,
        data: &[u8],
    ) -> Result<(), RegisterError> {
        if data.len() != reg.width() {
            return Err(RegisterError::WidthMismatch);
        }
        self.write_range(reg.offset(), data)
    }

    /// Reads bit `bit` of a register; bits past the first byte address the
    /// following bytes of a multi-byte register.
    pub fn bit(&self, reg: Register, bit: u8) -> Result<bool, RegisterError> {
        let addr = bit_byte(reg, bit)?;
        Ok(self.bytes[addr] & (1 << (bit % 8)) != 0)
    }

    /// Sets or clears bit `bit` of a register.
    pub fn set_bit(&mut self, reg: Register, bit: u8, value: bool) -> Result<(), RegisterError> {
        let addr = bit_byte(reg, bit)?;
        let mask = 1 << (bit % 8);
        if value {
            self.bytes[addr] |= mask;
        } else {
            self.bytes[addr] &= !mask;
        }
        Ok(())
    }

    #[inline]
    pub fn status(&self, bit: StatusBit) -> bool {
        self.bytes[Register::Status.offset() as usize] & (1 << bit as u8) != 0
    }

    pub fn set_status(&mut self, bit: StatusBit, value: bool) {
        let addr = Register::Status.offset() as usize;
        if value {
            self.bytes[addr] |= 1 << bit as u8;
        } else {
            self.bytes[addr] &= !(1 << bit as u8);
        }
    }

    #[inline]
    pub fn config(&self, bit: ConfigBit) -> bool {
        self.bytes[Register::Config.offset() as usize] & (1 << bit as u8) != 0
    }

    pub fn set_config(&mut self, bit: ConfigBit, value: bool) {
        let addr = Register::Config.offset() as usize;
        if value {
            self.bytes[addr] |= 1 << bit as u8;
        } else {
            self.bytes[addr] &= !(1 << bit as u8);
        }
    }

    /// Protection class of byte `addr`.
    #[inline]
    pub fn protection(&self, addr: u16) -> Option<ProtectionClass> {
        REGISTER_MAP.protection(addr)
    }

    /// Current bus cursor.
    #[inline]
    pub fn cursor(&self) -> u16 {
        self.cursor
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    /// Moves the cursor to `addr`.
    pub fn set_cursor(&mut self, addr: u16) -> Result<(), RegisterError> {
        if addr as usize >= REGISTER_TOTAL_SIZE {
            return Err(RegisterError::OutOfBounds);
        }
        self.cursor = addr;
        Ok(())
    }

    /// Advances the cursor one byte, wrapping to 0 at the end of the file.
    pub fn advance_cursor(&mut self) {
        self.cursor += 1;
        if self.cursor as usize == REGISTER_TOTAL_SIZE {
            self.cursor = 0;
        }
    }

    /// Advances the cursor `count` bytes with wraparound.
    pub fn advance_cursor_by(&mut self, count: usize) {
        let next = (self.cursor as usize + count) % REGISTER_TOTAL_SIZE;
        self.cursor = next as u16;
    }

    /// Records that the bus master finished writing `reg`.
    pub fn mark_updated(&mut self, reg: Register) {
        self.updated.set(reg.index(), true);
    }

    pub fn is_updated(&self, reg: Register) -> bool {
        self.updated.get(reg.index())
    }

    /// Returns whether `reg` was updated, clearing the flag.
    pub fn take_updated(&mut self, reg: Register) -> bool {
        self.updated.set(reg.index(), false)
    }

    pub fn any_updated(&self) -> bool {
        !self.updated.is_empty()
    }

    /// Calls `f` for each updated register in declaration order.
    pub fn iter_updated<F>(&self, mut f: F)
    where
        F: FnMut(Register),
    {
        let mut idx = self.updated.first_index();
        while let Some(index) = idx {
            if let Some(reg) = Register::from_index(index) {
                f(reg);
            }
            idx = self.updated.next_index(index);
        }
    }

    pub fn clear_updated(&mut self) {
        self.updated = Bitmap::new();
    }
}

fn bit_byte(reg: Register, bit: u8) -> Result<usize, RegisterError> {
    let byte = (bit / 8) as usize;
    if byte >= reg.width() {
        return Err(RegisterError::OutOfBounds);
    }
    Ok(reg.offset() as usize + byte)
}
