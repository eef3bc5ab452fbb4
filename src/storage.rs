#![allow(unsafe_code)]

use core::cell::UnsafeCell;

use crate::{layout::Defaults, regfile::RegisterFile};

/// Register file shared between the bus context and the main loop.
///
/// The bus handler typically runs from the I2C interrupt while the main loop
/// updates readings and acts on configuration triggers. All access goes
/// through [`with_file`](Self::with_file), which holds a critical section for
/// the duration of the closure, so a typed write and a burst read never
/// interleave.
pub struct RegisterStorage {
    file: UnsafeCell<RegisterFile>,
}

impl core::fmt::Debug for RegisterStorage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegisterStorage").finish_non_exhaustive()
    }
}

impl Default for RegisterStorage {
    fn default() -> Self {
        Self::new(RegisterFile::new())
    }
}

impl RegisterStorage {
    pub fn new(file: RegisterFile) -> Self {
        Self {
            file: UnsafeCell::new(file),
        }
    }

    /// Storage pre-loaded with the device identity and `defaults`.
    pub fn with_defaults(defaults: &Defaults) -> Self {
        Self::new(RegisterFile::with_defaults(defaults))
    }

    /// Runs `f` with exclusive access to the register file inside a critical section.
    ///
    /// Do not call `with_file` again from inside `f`.
    pub fn with_file<R>(&self, f: impl FnOnce(&mut RegisterFile) -> R) -> R {
        critical_section::with(|_| unsafe { self.with_file_unchecked(f) })
    }

    /// # Safety
    /// Caller must guarantee that nothing else accesses the register file for
    /// the duration of `f`. This holds inside an ISR that cannot be preempted
    /// by another user of this storage, or during boot before interrupts are
    /// enabled.
    pub unsafe fn with_file_unchecked<R>(&self, f: impl FnOnce(&mut RegisterFile) -> R) -> R {
        let file = unsafe { &mut *self.file.get() };
        f(file)
    }

    /// Consumes the storage, returning the register file.
    pub fn into_inner(self) -> RegisterFile {
        self.file.into_inner()
    }
}
