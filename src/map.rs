//! Register address layout.
//!
//! A [`RegisterMap`] is computed once, at compile time, from an ordered list
//! of [`Declaration`]s. Each register starts where the previous one ended, so
//! the declaration order *is* the wire layout: moving a declaration moves every
//! register after it.

/// Declared scalar type of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterKind {
    U8,
    U32,
    F32,
}

impl RegisterKind {
    /// Width of the register in bytes.
    pub const fn width(self) -> usize {
        match self {
            RegisterKind::U8 => 1,
            RegisterKind::U32 | RegisterKind::F32 => 4,
        }
    }
}

/// Whether the bus master may write a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Access {
    ReadOnly,
    Writable,
}

/// Per-byte protection class.
///
/// Each register contributes one `*Aligned` byte at its offset followed by
/// `width - 1` `*Continuation` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtectionClass {
    /// First byte of a writable register.
    WritableAligned,
    /// Trailing byte of a writable register.
    WritableContinuation,
    /// First byte of a read-only register.
    ReadOnlyAligned,
    /// Trailing byte of a read-only register.
    ReadOnlyContinuation,
}

impl ProtectionClass {
    /// True for the first byte of a register.
    #[inline]
    pub const fn is_aligned(self) -> bool {
        matches!(
            self,
            ProtectionClass::WritableAligned | ProtectionClass::ReadOnlyAligned
        )
    }

    /// True if the bus master may write this byte.
    #[inline]
    pub const fn is_writable(self) -> bool {
        matches!(
            self,
            ProtectionClass::WritableAligned | ProtectionClass::WritableContinuation
        )
    }
}

/// One entry of the ordered register declaration list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declaration {
    pub kind: RegisterKind,
    pub access: Access,
}

impl Declaration {
    pub const fn read_only(kind: RegisterKind) -> Self {
        Self {
            kind,
            access: Access::ReadOnly,
        }
    }

    pub const fn writable(kind: RegisterKind) -> Self {
        Self {
            kind,
            access: Access::Writable,
        }
    }
}

/// Resolved position of a register in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterDescriptor {
    pub offset: u16,
    pub width: u8,
    pub kind: RegisterKind,
    pub access: Access,
}

impl RegisterDescriptor {
    /// Protection class of the byte `index` bytes into this register.
    #[inline]
    pub const fn protection_at(&self, index: usize) -> ProtectionClass {
        match (self.access, index == 0) {
            (Access::Writable, true) => ProtectionClass::WritableAligned,
            (Access::Writable, false) => ProtectionClass::WritableContinuation,
            (Access::ReadOnly, true) => ProtectionClass::ReadOnlyAligned,
            (Access::ReadOnly, false) => ProtectionClass::ReadOnlyContinuation,
        }
    }

    /// One past the last byte of the register.
    #[inline]
    pub const fn end(&self) -> usize {
        self.offset as usize + self.width as usize
    }
}

/// Sum of all declared widths.
pub const fn total_size(declarations: &[Declaration]) -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < declarations.len() {
        total += declarations[i].kind.width();
        i += 1;
    }
    total
}

/// Static register layout.
///
/// # Const Generics
/// - `TS`: Total size of the register file in bytes
/// - `RC`: Register count
pub struct RegisterMap<const TS: usize, const RC: usize> {
    descriptors: [RegisterDescriptor; RC],
    owners: [u8; TS],
}

impl<const TS: usize, const RC: usize> RegisterMap<TS, RC> {
    /// Lays out `declarations` back to back starting at offset 0.
    ///
    /// # Panics
    /// Panics (at compile time when used in a `const`) if the declared widths
    /// do not sum to `TS` or there are more than 256 registers.
    pub const fn new(declarations: [Declaration; RC]) -> Self {
        assert!(RC <= 256, "register index must fit in one byte");

        let mut descriptors = [RegisterDescriptor {
            offset: 0,
            width: 0,
            kind: RegisterKind::U8,
            access: Access::ReadOnly,
        }; RC];
        let mut owners = [0u8; TS];

        let mut offset = 0usize;
        let mut i = 0;
        while i < RC {
            let decl = declarations[i];
            let width = decl.kind.width();
            assert!(offset + width <= TS, "declared widths exceed total size");

            descriptors[i] = RegisterDescriptor {
                offset: offset as u16,
                width: width as u8,
                kind: decl.kind,
                access: decl.access,
            };

            let mut b = 0;
            while b < width {
                owners[offset + b] = i as u8;
                b += 1;
            }

            offset += width;
            i += 1;
        }

        assert!(offset == TS, "declared widths must sum to total size");

        Self {
            descriptors,
            owners,
        }
    }

    /// Total size of the register file in bytes.
    #[inline]
    pub const fn total_size(&self) -> usize {
        TS
    }

    /// Number of registers.
    #[inline]
    pub const fn len(&self) -> usize {
        RC
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        RC == 0
    }

    /// Descriptor of the register at `index` in declaration order.
    ///
    /// # Panics
    /// Panics if `index >= RC`.
    #[inline]
    pub const fn descriptor(&self, index: usize) -> RegisterDescriptor {
        self.descriptors[index]
    }

    /// All descriptors in declaration order.
    pub fn descriptors(&self) -> &[RegisterDescriptor] {
        &self.descriptors
    }

    /// Index of the register that owns byte `addr`.
    #[inline]
    pub fn owner(&self, addr: u16) -> Option<usize> {
        self.owners.get(addr as usize).map(|&i| i as usize)
    }

    /// Protection class of byte `addr`.
    pub fn protection(&self, addr: u16) -> Option<ProtectionClass> {
        let index = self.owner(addr)?;
        let desc = &self.descriptors[index];
        Some(desc.protection_at(addr as usize - desc.offset as usize))
    }

    /// Number of bytes a burst read starting at `addr` returns: the owning
    /// register's width on an aligned byte, zero on a continuation byte.
    pub fn read_width(&self, addr: u16) -> Option<usize> {
        let index = self.owner(addr)?;
        let desc = &self.descriptors[index];
        if desc.offset == addr {
            Some(desc.width as usize)
        } else {
            Some(0)
        }
    }
}
