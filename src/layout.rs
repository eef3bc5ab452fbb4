//! Register layout of the temperature/humidity peripheral.
//!
//! Register ids are the byte offsets the bus master addresses; they are
//! fixed by existing masters and must not move.

use crate::map::{Declaration, RegisterDescriptor, RegisterKind, RegisterMap, total_size};

/// Value of the [`Register::Id`] register, used by masters to detect the device.
pub const DEVICE_ID: u8 = 0x2D;

pub const FIRMWARE_VERSION_MAJOR: u8 = 1;
pub const FIRMWARE_VERSION_MINOR: u8 = 1;
pub const FIRMWARE_VERSION_BUILD: u8 = 1;

/// Logical registers in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    Id,
    VersionMajor,
    VersionMinor,
    VersionBuild,
    Temperature,
    Humidity,
    Status,
    ReadingId,
    Interval,
    UpperThreshold,
    LowerThreshold,
    StartDelay,
    Config,
    DeviceAddress,
    SensorModel,
}

/// Number of declared registers.
pub const REGISTER_COUNT: usize = 15;

/// Declarations in the same order as [`Register`].
pub const DECLARATIONS: [Declaration; REGISTER_COUNT] = [
    Declaration::read_only(RegisterKind::U8),   // Id
    Declaration::read_only(RegisterKind::U8),   // VersionMajor
    Declaration::read_only(RegisterKind::U8),   // VersionMinor
    Declaration::read_only(RegisterKind::U8),   // VersionBuild
    Declaration::read_only(RegisterKind::F32),  // Temperature
    Declaration::read_only(RegisterKind::F32),  // Humidity
    Declaration::read_only(RegisterKind::U8),   // Status
    Declaration::read_only(RegisterKind::U32),  // ReadingId
    Declaration::writable(RegisterKind::U32),   // Interval
    Declaration::writable(RegisterKind::F32),   // UpperThreshold
    Declaration::writable(RegisterKind::F32),   // LowerThreshold
    Declaration::writable(RegisterKind::U32),   // StartDelay
    Declaration::writable(RegisterKind::U8),    // Config
    Declaration::writable(RegisterKind::U8),    // DeviceAddress
    Declaration::writable(RegisterKind::U8),    // SensorModel
];

/// Total size of the register file in bytes.
pub const REGISTER_TOTAL_SIZE: usize = total_size(&DECLARATIONS);

/// Widest register, which bounds a single burst read.
pub const MAX_REGISTER_WIDTH: usize = 4;

pub type DeviceRegisterMap = RegisterMap<REGISTER_TOTAL_SIZE, REGISTER_COUNT>;

/// The device's register map.
pub const REGISTER_MAP: DeviceRegisterMap = RegisterMap::new(DECLARATIONS);

impl Register {
    pub const ALL: [Register; REGISTER_COUNT] = [
        Register::Id,
        Register::VersionMajor,
        Register::VersionMinor,
        Register::VersionBuild,
        Register::Temperature,
        Register::Humidity,
        Register::Status,
        Register::ReadingId,
        Register::Interval,
        Register::UpperThreshold,
        Register::LowerThreshold,
        Register::StartDelay,
        Register::Config,
        Register::DeviceAddress,
        Register::SensorModel,
    ];

    /// Position in declaration order.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Register at declaration index `index`.
    pub fn from_index(index: usize) -> Option<Register> {
        Register::ALL.get(index).copied()
    }

    /// Register owning byte `addr`.
    pub fn at(addr: u16) -> Option<Register> {
        REGISTER_MAP.owner(addr).and_then(Register::from_index)
    }

    #[inline]
    pub const fn descriptor(self) -> RegisterDescriptor {
        REGISTER_MAP.descriptor(self.index())
    }

    /// Bus address of the register's first byte.
    #[inline]
    pub const fn offset(self) -> u16 {
        self.descriptor().offset
    }

    #[inline]
    pub const fn width(self) -> usize {
        self.descriptor().width as usize
    }
}

/// Bits of the [`Register::Config`] register, set by the bus master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ConfigBit {
    SensorEnabled = 0,
    ThresholdEnabled = 1,
    /// Self-clearing.
    TriggerReading = 2,
    Reserved1 = 3,
    Reserved2 = 4,
    Reserved3 = 5,
    /// Self-clearing.
    WriteConfig = 6,
    /// Self-clearing.
    ResetConfig = 7,
}

/// Bits of the [`Register::Status`] register, owned by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StatusBit {
    SensorEnabled = 0,
    UpperThresholdExceeded = 1,
    LowerThresholdExceeded = 2,
    Reserved1 = 3,
    Reserved2 = 4,
    ConfigSaved = 5,
    ReadError = 6,
    WriteError = 7,
}

/// Config bits that survive a save; triggers are never persisted.
pub const CONFIG_PERSIST_MASK: u8 =
    (1 << ConfigBit::SensorEnabled as u8) | (1 << ConfigBit::ThresholdEnabled as u8);

/// Factory configuration loaded before any persisted configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Defaults {
    pub interval_ms: u32,
    pub upper_threshold: f32,
    pub lower_threshold: f32,
    pub start_delay_ms: u32,
    pub config: u8,
    pub device_address: u8,
    pub sensor_model: u8,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            upper_threshold: 0.0,
            lower_threshold: 0.0,
            start_delay_ms: 0,
            config: 1 << ConfigBit::SensorEnabled as u8,
            device_address: 0x26,
            sensor_model: 22,
        }
    }
}
