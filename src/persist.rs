//! EEPROM persistence of the writable configuration registers.
//!
//! Storage holds three independent blocks, each laid out as
//! `[signature][payload][crc32 le]`:
//!
//! ```text
//! 0x00  config          interval | upper | lower | start delay | config & 0b11
//! 0x18  device address  address
//! 0x20  sensor model    model
//! ```
//!
//! A block whose signature or CRC does not match is treated as absent, and a
//! bad block never invalidates the others.

use crate::{
    RegisterError,
    helpers::Crc32,
    layout::{CONFIG_PERSIST_MASK, Register, StatusBit},
    regfile::RegisterFile,
};

/// Byte-addressable non-volatile storage, e.g. on-chip EEPROM.
pub trait NvStorage {
    type Error;

    fn read(&mut self, addr: u16) -> Result<u8, Self::Error>;

    fn write(&mut self, addr: u16, value: u8) -> Result<(), Self::Error>;

    /// Writes only if the stored byte differs, sparing write endurance.
    fn update(&mut self, addr: u16, value: u8) -> Result<(), Self::Error> {
        if self.read(addr)? != value {
            self.write(addr, value)?;
        }
        Ok(())
    }

    fn read_block(&mut self, addr: u16, out: &mut [u8]) -> Result<(), Self::Error> {
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.read(addr.wrapping_add(i as u16))?;
        }
        Ok(())
    }

    fn write_block(&mut self, addr: u16, data: &[u8]) -> Result<(), Self::Error> {
        for (i, &byte) in data.iter().enumerate() {
            self.write(addr.wrapping_add(i as u16), byte)?;
        }
        Ok(())
    }

    fn update_block(&mut self, addr: u16, data: &[u8]) -> Result<(), Self::Error> {
        for (i, &byte) in data.iter().enumerate() {
            self.update(addr.wrapping_add(i as u16), byte)?;
        }
        Ok(())
    }
}

/// Independently validated regions of persisted configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistBlock {
    Config,
    DeviceAddress,
    SensorModel,
}

const CONFIG_FIELDS: [Register; 5] = [
    Register::Interval,
    Register::UpperThreshold,
    Register::LowerThreshold,
    Register::StartDelay,
    Register::Config,
];
const DEVICE_ADDRESS_FIELDS: [Register; 1] = [Register::DeviceAddress];
const SENSOR_MODEL_FIELDS: [Register; 1] = [Register::SensorModel];

const CRC_LEN: usize = 4;

const fn payload_len(fields: &[Register]) -> usize {
    let mut len = 0;
    let mut i = 0;
    while i < fields.len() {
        len += fields[i].width();
        i += 1;
    }
    len
}

const CONFIG_PAYLOAD_LEN: usize = payload_len(&CONFIG_FIELDS);
const DEVICE_ADDRESS_PAYLOAD_LEN: usize = payload_len(&DEVICE_ADDRESS_FIELDS);
const SENSOR_MODEL_PAYLOAD_LEN: usize = payload_len(&SENSOR_MODEL_FIELDS);

/// Bytes captured by a [`ConfigSnapshot`].
pub const SNAPSHOT_LEN: usize =
    CONFIG_PAYLOAD_LEN + DEVICE_ADDRESS_PAYLOAD_LEN + SENSOR_MODEL_PAYLOAD_LEN;

/// Largest payload of any block.
const MAX_PAYLOAD_LEN: usize = CONFIG_PAYLOAD_LEN;

impl PersistBlock {
    pub const ALL: [PersistBlock; 3] = [
        PersistBlock::Config,
        PersistBlock::DeviceAddress,
        PersistBlock::SensorModel,
    ];

    /// Registers stored in this block, in storage order.
    pub const fn fields(self) -> &'static [Register] {
        match self {
            PersistBlock::Config => &CONFIG_FIELDS,
            PersistBlock::DeviceAddress => &DEVICE_ADDRESS_FIELDS,
            PersistBlock::SensorModel => &SENSOR_MODEL_FIELDS,
        }
    }

    pub const fn payload_len(self) -> usize {
        payload_len(self.fields())
    }

    /// Signature, payload and CRC.
    pub const fn storage_len(self) -> usize {
        1 + self.payload_len() + CRC_LEN
    }

    /// Position of this block's payload inside a [`ConfigSnapshot`].
    const fn snapshot_span(self) -> (usize, usize) {
        match self {
            PersistBlock::Config => (0, CONFIG_PAYLOAD_LEN),
            PersistBlock::DeviceAddress => (
                CONFIG_PAYLOAD_LEN,
                CONFIG_PAYLOAD_LEN + DEVICE_ADDRESS_PAYLOAD_LEN,
            ),
            PersistBlock::SensorModel => (
                CONFIG_PAYLOAD_LEN + DEVICE_ADDRESS_PAYLOAD_LEN,
                SNAPSHOT_LEN,
            ),
        }
    }
}

/// Where each block lives in storage and the signature that marks it valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PersistLayout {
    pub signature: u8,
    pub config_base: u16,
    pub device_address_base: u16,
    pub sensor_model_base: u16,
}

impl PersistLayout {
    pub const DEFAULT: PersistLayout = PersistLayout {
        signature: 0b1010_1010,
        config_base: 0x00,
        device_address_base: 0x18,
        sensor_model_base: 0x20,
    };

    pub const fn base(&self, block: PersistBlock) -> u16 {
        match block {
            PersistBlock::Config => self.config_base,
            PersistBlock::DeviceAddress => self.device_address_base,
            PersistBlock::SensorModel => self.sensor_model_base,
        }
    }

    /// One past the highest storage address used.
    pub fn end(&self) -> usize {
        PersistBlock::ALL
            .iter()
            .map(|&b| self.base(b) as usize + b.storage_len())
            .max()
            .unwrap_or(0)
    }

    /// True if no two blocks overlap.
    pub fn is_disjoint(&self) -> bool {
        let blocks = PersistBlock::ALL;
        for (i, &a) in blocks.iter().enumerate() {
            for &b in &blocks[i + 1..] {
                let (a0, a1) = (self.base(a) as usize, self.base(a) as usize + a.storage_len());
                let (b0, b1) = (self.base(b) as usize, self.base(b) as usize + b.storage_len());
                if a0 < b1 && b0 < a1 {
                    return false;
                }
            }
        }
        true
    }
}

impl Default for PersistLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The persisted subset of the register file, captured at one instant.
///
/// Capturing and applying are quick register-file copies, so the device can
/// hold the register file only briefly and do the slow EEPROM I/O outside
/// its critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigSnapshot {
    bytes: [u8; SNAPSHOT_LEN],
}

impl ConfigSnapshot {
    /// Copies the persisted registers out of `file`, masking the config byte.
    pub fn capture(file: &RegisterFile) -> Self {
        let mut bytes = [0u8; SNAPSHOT_LEN];
        let mut pos = 0;
        for block in PersistBlock::ALL {
            for &reg in block.fields() {
                let data = file.register_bytes(reg);
                bytes[pos..pos + data.len()].copy_from_slice(data);
                if reg == Register::Config {
                    bytes[pos] &= CONFIG_PERSIST_MASK;
                }
                pos += data.len();
            }
        }
        Self { bytes }
    }

    /// Payload bytes of one block.
    pub fn payload(&self, block: PersistBlock) -> &[u8] {
        let (start, end) = block.snapshot_span();
        &self.bytes[start..end]
    }

    fn payload_mut(&mut self, block: PersistBlock) -> &mut [u8] {
        let (start, end) = block.snapshot_span();
        &mut self.bytes[start..end]
    }

    /// Writes one block's registers back into `file` in declaration order.
    pub fn apply(&self, file: &mut RegisterFile, block: PersistBlock) -> Result<(), RegisterError> {
        let payload = self.payload(block);
        let mut pos = 0;
        for &reg in block.fields() {
            let width = reg.width();
            file.write_register_bytes(reg, &payload[pos..pos + width])?;
            pos += width;
        }
        Ok(())
    }
}

/// Which blocks passed validation on restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RestoreReport {
    pub config: bool,
    pub device_address: bool,
    pub sensor_model: bool,
}

impl RestoreReport {
    pub fn contains(&self, block: PersistBlock) -> bool {
        match block {
            PersistBlock::Config => self.config,
            PersistBlock::DeviceAddress => self.device_address,
            PersistBlock::SensorModel => self.sensor_model,
        }
    }

    fn set(&mut self, block: PersistBlock) {
        match block {
            PersistBlock::Config => self.config = true,
            PersistBlock::DeviceAddress => self.device_address = true,
            PersistBlock::SensorModel => self.sensor_model = true,
        }
    }

    pub fn any(&self) -> bool {
        self.config || self.device_address || self.sensor_model
    }
}

/// Saves, restores and erases the persisted configuration.
pub struct ConfigPersistence<E: NvStorage> {
    storage: E,
    layout: PersistLayout,
}

impl<E: NvStorage> core::fmt::Debug for ConfigPersistence<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConfigPersistence")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl<E: NvStorage> ConfigPersistence<E> {
    pub fn new(storage: E) -> Self {
        Self::with_layout(storage, PersistLayout::DEFAULT)
    }

    pub fn with_layout(storage: E, layout: PersistLayout) -> Self {
        debug_assert!(layout.is_disjoint(), "persisted blocks overlap");
        Self { storage, layout }
    }

    pub fn layout(&self) -> &PersistLayout {
        &self.layout
    }

    pub fn storage(&self) -> &E {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut E {
        &mut self.storage
    }

    pub fn into_inner(self) -> E {
        self.storage
    }

    /// Persists the configuration registers of `file` and updates its status bits.
    pub fn save(&mut self, file: &mut RegisterFile) -> Result<(), RegisterError> {
        let snapshot = ConfigSnapshot::capture(file);
        let result = self.save_snapshot(&snapshot);
        record_save(file, result)
    }

    /// Writes every block of `snapshot`, skipping bytes that already match.
    ///
    /// Payload and CRC are written before the signature.
    pub fn save_snapshot(&mut self, snapshot: &ConfigSnapshot) -> Result<(), RegisterError> {
        for block in PersistBlock::ALL {
            self.save_block(snapshot, block)?;
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("persist: configuration saved");
        Ok(())
    }

    fn save_block(
        &mut self,
        snapshot: &ConfigSnapshot,
        block: PersistBlock,
    ) -> Result<(), RegisterError> {
        let base = self.layout.base(block);
        let payload = snapshot.payload(block);

        let mut crc = Crc32::new();
        crc.update(payload);
        let crc = crc.finish().to_le_bytes();

        self.storage
            .update_block(base + 1, payload)
            .map_err(|_| RegisterError::Storage)?;
        self.storage
            .update_block(base + 1 + payload.len() as u16, &crc)
            .map_err(|_| RegisterError::Storage)?;
        self.storage
            .update(base, self.layout.signature)
            .map_err(|_| RegisterError::Storage)
    }

    /// Restores the main configuration block into `file`.
    ///
    /// Returns false and leaves `file` untouched if the block is absent or
    /// corrupt. The device-address and sensor-model blocks are left to
    /// [`restore_all`](Self::restore_all).
    pub fn restore(&mut self, file: &mut RegisterFile) -> bool {
        let mut snapshot = ConfigSnapshot {
            bytes: [0; SNAPSHOT_LEN],
        };
        if !self.load_into(PersistBlock::Config, &mut snapshot) {
            return false;
        }

        let report = RestoreReport {
            config: true,
            ..RestoreReport::default()
        };
        apply_restored(file, &snapshot, report);
        true
    }

    /// Restores every valid block into `file` and reports which were valid.
    ///
    /// Sets the config-saved status bit when the main block was restored.
    pub fn restore_all(&mut self, file: &mut RegisterFile) -> RestoreReport {
        let (snapshot, report) = self.load();
        apply_restored(file, &snapshot, report);
        report
    }

    /// Reads and validates every block without touching a register file.
    ///
    /// Payload bytes of invalid blocks are zero in the returned snapshot.
    pub fn load(&mut self) -> (ConfigSnapshot, RestoreReport) {
        let mut snapshot = ConfigSnapshot {
            bytes: [0; SNAPSHOT_LEN],
        };
        let mut report = RestoreReport::default();

        for block in PersistBlock::ALL {
            if self.load_into(block, &mut snapshot) {
                report.set(block);
            }
        }

        (snapshot, report)
    }

    /// Copies one validated block into `snapshot`; false if absent or corrupt.
    fn load_into(&mut self, block: PersistBlock, snapshot: &mut ConfigSnapshot) -> bool {
        let mut payload = [0u8; MAX_PAYLOAD_LEN];
        let payload = &mut payload[..block.payload_len()];
        if !self.load_block(block, payload) {
            #[cfg(feature = "defmt")]
            defmt::debug!("persist: {} block absent or corrupt", block);
            return false;
        }
        snapshot.payload_mut(block).copy_from_slice(payload);
        true
    }

    /// True if the block's signature and CRC match; a read failure counts as absent.
    fn load_block(&mut self, block: PersistBlock, payload: &mut [u8]) -> bool {
        let base = self.layout.base(block);

        match self.storage.read(base) {
            Ok(signature) if signature == self.layout.signature => {}
            _ => return false,
        }

        if self.storage.read_block(base + 1, payload).is_err() {
            return false;
        }

        let mut stored = [0u8; CRC_LEN];
        if self
            .storage
            .read_block(base + 1 + payload.len() as u16, &mut stored)
            .is_err()
        {
            return false;
        }

        let mut crc = Crc32::new();
        crc.update(payload);
        crc.finish() == u32::from_le_bytes(stored)
    }

    /// Zeroes every persisted block, signature and CRC included, and clears
    /// the config-saved status bit.
    pub fn reset(&mut self, file: &mut RegisterFile) -> Result<(), RegisterError> {
        let result = self.erase();
        record_reset(file, result)
    }

    /// Zeroes every persisted block in storage.
    pub fn erase(&mut self) -> Result<(), RegisterError> {
        for block in PersistBlock::ALL {
            let base = self.layout.base(block);
            for i in 0..block.storage_len() {
                self.storage
                    .update(base + i as u16, 0)
                    .map_err(|_| RegisterError::Storage)?;
            }
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("persist: configuration erased");
        Ok(())
    }
}

/// Reflects the outcome of a save in the status register.
pub(crate) fn record_save(
    file: &mut RegisterFile,
    result: Result<(), RegisterError>,
) -> Result<(), RegisterError> {
    match result {
        Ok(()) => {
            file.set_status(StatusBit::ConfigSaved, true);
            file.set_status(StatusBit::WriteError, false);
        }
        Err(_) => {
            #[cfg(feature = "defmt")]
            defmt::warn!("persist: save failed");
            file.set_status(StatusBit::ConfigSaved, false);
            file.set_status(StatusBit::WriteError, true);
        }
    }
    result
}

/// Reflects the outcome of an erase in the status register.
pub(crate) fn record_reset(
    file: &mut RegisterFile,
    result: Result<(), RegisterError>,
) -> Result<(), RegisterError> {
    file.set_status(StatusBit::ConfigSaved, false);
    if result.is_err() {
        #[cfg(feature = "defmt")]
        defmt::warn!("persist: erase failed");
        file.set_status(StatusBit::WriteError, true);
    }
    result
}

/// Copies the valid blocks of a loaded snapshot into `file`.
pub(crate) fn apply_restored(
    file: &mut RegisterFile,
    snapshot: &ConfigSnapshot,
    report: RestoreReport,
) {
    for block in PersistBlock::ALL {
        if report.contains(block) && snapshot.apply(file, block).is_err() {
            return;
        }
    }
    if report.config {
        file.set_status(StatusBit::ConfigSaved, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ConfigBit, Defaults, REGISTER_TOTAL_SIZE};
    use crate::test_support::{FailingEeprom, MemoryEeprom, TestEeprom};

    fn configured_file() -> RegisterFile {
        let mut file = RegisterFile::with_defaults(&Defaults::default());
        file.write(Register::Interval, 5000u32).unwrap();
        file.write(Register::UpperThreshold, 28.5f32).unwrap();
        file.write(Register::LowerThreshold, 12.25f32).unwrap();
        file.write(Register::StartDelay, 1500u32).unwrap();
        file.write(Register::Config, 0b0100_0111u8).unwrap();
        file.write(Register::DeviceAddress, 0x41u8).unwrap();
        file.write(Register::SensorModel, 11u8).unwrap();
        file
    }

    fn snapshot_of(file: &RegisterFile) -> [u8; REGISTER_TOTAL_SIZE] {
        let mut buf = [0u8; REGISTER_TOTAL_SIZE];
        file.read_range(0, &mut buf).unwrap();
        buf
    }

    #[test]
    fn layout_blocks_fit_and_do_not_overlap() {
        let layout = PersistLayout::DEFAULT;
        assert!(layout.is_disjoint());
        assert_eq!(PersistBlock::Config.storage_len(), 22);
        assert_eq!(PersistBlock::DeviceAddress.storage_len(), 6);
        assert_eq!(layout.end(), 0x20 + 6);
        assert!(layout.end() <= TestEeprom::CAPACITY);
    }

    #[test]
    fn interval_scenario_storage_contents() {
        let mut file = RegisterFile::with_defaults(&Defaults::default());
        file.write(Register::Interval, 5000u32).unwrap();

        let mut persistence = ConfigPersistence::new(TestEeprom::new());
        persistence.save(&mut file).unwrap();

        let eeprom = persistence.storage();
        assert_eq!(eeprom.byte(0), 0xAA);
        assert_eq!(eeprom.bytes(1, 4), &[0x88, 0x13, 0x00, 0x00]);

        let payload = eeprom.bytes(1, 17);
        let stored_crc = u32::from_le_bytes(eeprom.bytes(18, 4).try_into().unwrap());
        assert_eq!(stored_crc, crate::helpers::crc32(payload));
        assert!(file.status(StatusBit::ConfigSaved));

        let mut fresh = RegisterFile::with_defaults(&Defaults {
            interval_ms: 1,
            ..Defaults::default()
        });
        assert!(persistence.restore(&mut fresh));
        assert_eq!(fresh.read::<u32>(Register::Interval), Ok(5000));
    }

    #[test]
    fn save_reset_restore_round_trip() {
        let mut file = configured_file();
        let mut persistence = ConfigPersistence::new(TestEeprom::new());
        persistence.save(&mut file).unwrap();

        let mut restored = RegisterFile::new();
        let report = persistence.restore_all(&mut restored);

        assert_eq!(
            report,
            RestoreReport {
                config: true,
                device_address: true,
                sensor_model: true
            }
        );
        for reg in [
            Register::Interval,
            Register::UpperThreshold,
            Register::LowerThreshold,
            Register::StartDelay,
            Register::DeviceAddress,
            Register::SensorModel,
        ] {
            assert_eq!(restored.register_bytes(reg), file.register_bytes(reg), "{reg:?}");
        }
        assert!(restored.status(StatusBit::ConfigSaved));
    }

    #[test]
    fn config_byte_is_masked_on_save() {
        let mut file = configured_file();
        let mut persistence = ConfigPersistence::new(TestEeprom::new());
        persistence.save(&mut file).unwrap();

        assert_eq!(persistence.storage().byte(17), 0b0000_0011);

        let mut restored = RegisterFile::new();
        persistence.restore(&mut restored);
        assert!(restored.config(ConfigBit::SensorEnabled));
        assert!(restored.config(ConfigBit::ThresholdEnabled));
        assert!(!restored.config(ConfigBit::TriggerReading));
        assert!(!restored.config(ConfigBit::WriteConfig));
    }

    #[test]
    fn blank_storage_restores_nothing() {
        let mut file = configured_file();
        let before = snapshot_of(&file);

        let mut persistence = ConfigPersistence::new(TestEeprom::new());
        assert!(!persistence.restore(&mut file));
        assert_eq!(snapshot_of(&file), before);
    }

    #[test]
    fn any_bit_flip_in_signature_or_crc_rejects_restore() {
        let mut source = configured_file();
        let mut persistence = ConfigPersistence::new(TestEeprom::new());
        persistence.save(&mut source).unwrap();
        let pristine = persistence.storage().clone();

        // Signature, then the four CRC bytes.
        for addr in [0u16, 18, 19, 20, 21] {
            for bit in 0..8 {
                *persistence.storage_mut() = pristine.clone();
                persistence.storage_mut().flip_bit(addr, bit);

                let mut file = RegisterFile::with_defaults(&Defaults::default());
                let before = snapshot_of(&file);

                assert!(!persistence.restore(&mut file), "addr {addr} bit {bit}");
                assert_eq!(snapshot_of(&file), before, "addr {addr} bit {bit}");
                assert_eq!(file.read::<u8>(Register::DeviceAddress), Ok(0x26));
            }
        }
    }

    #[test]
    fn restore_applies_only_the_main_block() {
        let mut source = configured_file();
        let mut persistence = ConfigPersistence::new(TestEeprom::new());
        persistence.save(&mut source).unwrap();

        let mut file = RegisterFile::with_defaults(&Defaults::default());
        assert!(persistence.restore(&mut file));
        assert_eq!(file.read::<u32>(Register::Interval), Ok(5000));
        assert_eq!(file.read::<u8>(Register::DeviceAddress), Ok(0x26));
        assert_eq!(file.read::<u8>(Register::SensorModel), Ok(22));
        assert!(file.status(StatusBit::ConfigSaved));

        let report = persistence.restore_all(&mut file);
        assert!(report.device_address && report.sensor_model);
        assert_eq!(file.read::<u8>(Register::DeviceAddress), Ok(0x41));
        assert_eq!(file.read::<u8>(Register::SensorModel), Ok(11));
    }

    #[test]
    fn corrupt_payload_rejects_restore() {
        let mut source = configured_file();
        let mut persistence = ConfigPersistence::new(TestEeprom::new());
        persistence.save(&mut source).unwrap();
        persistence.storage_mut().flip_bit(3, 4);

        let mut file = RegisterFile::new();
        assert!(!persistence.restore(&mut file));
        assert_eq!(file.read::<u32>(Register::Interval), Ok(0));
        assert!(!file.status(StatusBit::ConfigSaved));
    }

    #[test]
    fn blocks_validate_independently() {
        let mut source = configured_file();
        let mut persistence = ConfigPersistence::new(TestEeprom::new());
        persistence.save(&mut source).unwrap();

        // Break the device-address CRC only.
        persistence.storage_mut().flip_bit(0x18 + 2, 0);

        let mut file = RegisterFile::new();
        let report = persistence.restore_all(&mut file);
        assert!(report.config);
        assert!(!report.device_address);
        assert!(report.sensor_model);
        assert_eq!(file.read::<u32>(Register::Interval), Ok(5000));
        assert_eq!(file.read::<u8>(Register::DeviceAddress), Ok(0));
        assert_eq!(file.read::<u8>(Register::SensorModel), Ok(11));

        // Break the main block; address block still restores once repaired.
        persistence.save(&mut source).unwrap();
        persistence.storage_mut().flip_bit(0, 7);
        let mut file = RegisterFile::new();
        let report = persistence.restore_all(&mut file);
        assert!(!report.config);
        assert!(report.device_address);
        assert_eq!(file.read::<u8>(Register::DeviceAddress), Ok(0x41));
        assert!(!file.status(StatusBit::ConfigSaved));
    }

    #[test]
    fn unchanged_save_does_not_rewrite_storage() {
        let mut file = configured_file();
        let mut persistence = ConfigPersistence::new(TestEeprom::new());

        persistence.save(&mut file).unwrap();
        let first = persistence.storage().write_count();
        assert!(first > 0);

        persistence.save(&mut file).unwrap();
        assert_eq!(persistence.storage().write_count(), first);

        // A one-byte change rewrites that byte plus the changed CRC bytes only.
        file.write(Register::SensorModel, 22u8).unwrap();
        persistence.save(&mut file).unwrap();
        let delta = persistence.storage().write_count() - first;
        assert!((1..=1 + CRC_LEN).contains(&delta), "delta {delta}");
    }

    #[test]
    fn reset_zeroes_storage_and_clears_saved_bit() {
        let mut file = configured_file();
        let mut persistence = ConfigPersistence::new(TestEeprom::new());
        persistence.save(&mut file).unwrap();

        persistence.reset(&mut file).unwrap();

        let eeprom = persistence.storage();
        assert!(eeprom.bytes(0, PersistLayout::DEFAULT.end()).iter().all(|&b| b == 0));
        assert!(!file.status(StatusBit::ConfigSaved));

        let mut other = RegisterFile::new();
        assert!(!persistence.restore(&mut other));
    }

    #[test]
    fn reset_of_blank_storage_writes_nothing() {
        let mut file = RegisterFile::new();
        let mut persistence = ConfigPersistence::new(TestEeprom::new());
        persistence.reset(&mut file).unwrap();
        assert_eq!(persistence.storage().write_count(), 0);
    }

    #[test]
    fn save_failure_sets_write_error() {
        let mut file = configured_file();
        file.set_status(StatusBit::ConfigSaved, true);

        let mut persistence = ConfigPersistence::new(FailingEeprom);
        assert_eq!(persistence.save(&mut file), Err(RegisterError::Storage));
        assert!(file.status(StatusBit::WriteError));
        assert!(!file.status(StatusBit::ConfigSaved));
    }

    #[test]
    fn read_failure_counts_as_absent() {
        let mut file = configured_file();
        let before = snapshot_of(&file);
        let mut persistence = ConfigPersistence::new(FailingEeprom);
        assert_eq!(persistence.restore_all(&mut file), RestoreReport::default());
        assert_eq!(snapshot_of(&file), before);
    }

    #[test]
    fn custom_layout_moves_blocks() {
        let layout = PersistLayout {
            signature: 0x5A,
            config_base: 0x10,
            device_address_base: 0x30,
            sensor_model_base: 0x38,
        };
        let mut file = configured_file();
        let mut persistence = ConfigPersistence::with_layout(MemoryEeprom::<64>::new(), layout);
        persistence.save(&mut file).unwrap();

        assert_eq!(persistence.storage().byte(0), 0);
        assert_eq!(persistence.storage().byte(0x10), 0x5A);
        assert_eq!(persistence.storage().byte(0x31), 0x41);

        let mut restored = RegisterFile::new();
        assert!(persistence.restore(&mut restored));
        assert_eq!(restored.read::<f32>(Register::UpperThreshold), Ok(28.5));
    }
}
