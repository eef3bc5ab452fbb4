//! Main-loop side of the peripheral: sensor scheduling, threshold checks and
//! configuration triggers.
//!
//! The bus handler runs from the I2C interrupt and only touches the register
//! file. Everything slow (sensor conversions, EEPROM writes) happens here,
//! outside the register file's critical section.

use bitmaps::Bitmap;

use crate::{
    RegisterError,
    layout::{ConfigBit, REGISTER_COUNT, Register, StatusBit},
    persist::{
        ConfigPersistence, ConfigSnapshot, NvStorage, RestoreReport, apply_restored, record_reset,
        record_save,
    },
    regfile::RegisterFile,
    storage::RegisterStorage,
};

/// One conversion from the sensing element.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Relative humidity in percent.
    pub humidity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// The element did not answer in time.
    Timeout,
    /// The frame arrived but its checksum was wrong.
    Checksum,
    /// No conversion was available.
    NoReading,
}

impl core::fmt::Display for SensorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SensorError::Timeout => write!(f, "sensor timed out"),
            SensorError::Checksum => write!(f, "sensor checksum mismatch"),
            SensorError::NoReading => write!(f, "no sensor reading available"),
        }
    }
}

/// A temperature/humidity sensing element, e.g. a DHT22.
pub trait TemperatureHumiditySensor {
    fn read(&mut self) -> Result<Reading, SensorError>;
}

impl<S: TemperatureHumiditySensor + ?Sized> TemperatureHumiditySensor for &mut S {
    fn read(&mut self) -> Result<Reading, SensorError> {
        (**self).read()
    }
}

/// What one [`Device::poll`] call did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollOutcome {
    /// Result of the sensor read, if one was due.
    pub reading: Option<Result<Reading, SensorError>>,
    /// Result of a requested configuration save.
    pub saved: Option<Result<(), RegisterError>>,
    /// Result of a requested configuration reset.
    pub reset: Option<Result<(), RegisterError>>,
    updated: Bitmap<REGISTER_COUNT>,
}

impl PollOutcome {
    fn new() -> Self {
        Self {
            reading: None,
            saved: None,
            reset: None,
            updated: Bitmap::new(),
        }
    }

    /// True if the master completed a write to `reg` since the previous poll.
    pub fn was_updated(&self, reg: Register) -> bool {
        self.updated.get(reg.index())
    }

    /// Calls `f` for every register the master updated since the previous poll.
    pub fn for_each_updated<F>(&self, mut f: F)
    where
        F: FnMut(Register),
    {
        for reg in Register::ALL {
            if self.updated.get(reg.index()) {
                f(reg);
            }
        }
    }

    /// True if nothing happened.
    pub fn is_idle(&self) -> bool {
        self.reading.is_none()
            && self.saved.is_none()
            && self.reset.is_none()
            && self.updated.is_empty()
    }
}

/// Trigger bits and scheduling inputs taken from the register file in one
/// critical section.
struct Pending {
    reset: bool,
    save: Option<ConfigSnapshot>,
    sensor_enabled: bool,
    triggered: bool,
    interval_ms: u32,
    start_delay_ms: u32,
}

/// Ties the sensor and persistence to the shared register file.
pub struct Device<'a, S, E: NvStorage> {
    registers: &'a RegisterStorage,
    sensor: S,
    persistence: ConfigPersistence<E>,
    boot_ms: u32,
    last_reading_ms: Option<u32>,
}

impl<'a, S, E> Device<'a, S, E>
where
    S: TemperatureHumiditySensor,
    E: NvStorage,
{
    pub fn new(registers: &'a RegisterStorage, sensor: S, storage: E) -> Self {
        Self::with_persistence(registers, sensor, ConfigPersistence::new(storage))
    }

    pub fn with_persistence(
        registers: &'a RegisterStorage,
        sensor: S,
        persistence: ConfigPersistence<E>,
    ) -> Self {
        Self {
            registers,
            sensor,
            persistence,
            boot_ms: 0,
            last_reading_ms: None,
        }
    }

    pub fn registers(&self) -> &'a RegisterStorage {
        self.registers
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn persistence(&self) -> &ConfigPersistence<E> {
        &self.persistence
    }

    pub fn persistence_mut(&mut self) -> &mut ConfigPersistence<E> {
        &mut self.persistence
    }

    /// Restores persisted configuration and starts the start-delay clock.
    pub fn start(&mut self, now_ms: u32) -> RestoreReport {
        let (snapshot, report) = self.persistence.load();

        self.registers.with_file(|file| {
            apply_restored(file, &snapshot, report);
            mirror_sensor_enabled(file);
        });

        self.boot_ms = now_ms;
        self.last_reading_ms = None;

        #[cfg(feature = "defmt")]
        defmt::info!("device: started, restored {}", report);
        report
    }

    /// Runs one main-loop iteration at time `now_ms`.
    pub fn poll(&mut self, now_ms: u32) -> PollOutcome {
        let mut outcome = PollOutcome::new();
        let pending = self.registers.with_file(take_pending);

        if pending.reset {
            let result = self.persistence.erase();
            let result = self.registers.with_file(|file| record_reset(file, result));
            outcome.reset = Some(result);
        }

        if let Some(snapshot) = pending.save {
            let result = self.persistence.save_snapshot(&snapshot);
            let result = self.registers.with_file(|file| record_save(file, result));
            outcome.saved = Some(result);
        }

        let due = pending.triggered || self.interval_elapsed(now_ms, pending.interval_ms);
        let ready =
            pending.sensor_enabled && self.start_delay_elapsed(now_ms, pending.start_delay_ms);
        if due && ready {
            let result = self.sensor.read();
            self.last_reading_ms = Some(now_ms);
            self.registers.with_file(|file| apply_reading(file, &result));
            outcome.reading = Some(result);
        } else if pending.triggered && pending.sensor_enabled {
            // Still inside the start delay; keep it for a later poll.
            self.registers
                .with_file(|file| file.set_config(ConfigBit::TriggerReading, true));
        }

        self.registers.with_file(|file| {
            file.iter_updated(|reg| {
                outcome.updated.set(reg.index(), true);
            });
            file.clear_updated();
        });

        outcome
    }

    /// Earliest time at which [`poll`](Self::poll) may take a reading without
    /// a trigger, or `None` while the sensor is disabled.
    pub fn next_due_ms(&self) -> Option<u32> {
        let (enabled, interval_ms, start_delay_ms) = self.registers.with_file(|file| {
            (
                file.config(ConfigBit::SensorEnabled),
                file.interval_ms(),
                file.start_delay_ms(),
            )
        });
        if !enabled {
            return None;
        }

        match self.last_reading_ms {
            None => Some(self.boot_ms.wrapping_add(start_delay_ms)),
            Some(last) => Some(last.wrapping_add(interval_ms)),
        }
    }

    fn start_delay_elapsed(&self, now_ms: u32, start_delay_ms: u32) -> bool {
        now_ms.wrapping_sub(self.boot_ms) >= start_delay_ms
    }

    fn interval_elapsed(&self, now_ms: u32, interval_ms: u32) -> bool {
        match self.last_reading_ms {
            None => true,
            Some(last) => now_ms.wrapping_sub(last) >= interval_ms,
        }
    }

    /// Consumes the device, returning the sensor and persistence.
    pub fn release(self) -> (S, ConfigPersistence<E>) {
        (self.sensor, self.persistence)
    }
}

/// Clears the self-clearing config bits and captures what they ask for.
fn take_pending(file: &mut RegisterFile) -> Pending {
    let reset = file.config(ConfigBit::ResetConfig);
    let save = file.config(ConfigBit::WriteConfig);
    let triggered = file.config(ConfigBit::TriggerReading);

    file.set_config(ConfigBit::ResetConfig, false);
    file.set_config(ConfigBit::WriteConfig, false);
    file.set_config(ConfigBit::TriggerReading, false);

    mirror_sensor_enabled(file);

    Pending {
        reset,
        save: save.then(|| ConfigSnapshot::capture(file)),
        sensor_enabled: file.config(ConfigBit::SensorEnabled),
        triggered,
        interval_ms: file.interval_ms(),
        start_delay_ms: file.start_delay_ms(),
    }
}

fn mirror_sensor_enabled(file: &mut RegisterFile) {
    let enabled = file.config(ConfigBit::SensorEnabled);
    file.set_status(StatusBit::SensorEnabled, enabled);
}

/// Publishes a sensor result and re-evaluates the thresholds.
fn apply_reading(file: &mut RegisterFile, result: &Result<Reading, SensorError>) {
    let reading = match result {
        Ok(reading) => *reading,
        Err(_e) => {
            #[cfg(feature = "defmt")]
            defmt::warn!("device: sensor read failed: {}", _e);
            file.set_status(StatusBit::ReadError, true);
            return;
        }
    };

    file.record_reading(reading.temperature, reading.humidity);
    file.set_status(StatusBit::ReadError, false);

    let (upper, lower) = if file.config(ConfigBit::ThresholdEnabled) {
        (
            reading.temperature > file.upper_threshold(),
            reading.temperature < file.lower_threshold(),
        )
    } else {
        (false, false)
    };
    file.set_status(StatusBit::UpperThresholdExceeded, upper);
    file.set_status(StatusBit::LowerThresholdExceeded, lower);
}
