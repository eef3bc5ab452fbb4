/// Errors that can occur during register file operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterError {
    /// Address or length exceeds register file bounds.
    OutOfBounds,
    /// Operation attempted with zero length.
    ZeroLength,
    /// Scalar width does not match the register's declared width.
    WidthMismatch,
    /// Non-volatile storage reported a failure.
    Storage,
}

impl core::fmt::Display for RegisterError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RegisterError::OutOfBounds => write!(f, "address or length exceeds register bounds"),
            RegisterError::ZeroLength => write!(f, "operation attempted with zero length"),
            RegisterError::WidthMismatch => write!(f, "scalar width does not match register width"),
            RegisterError::Storage => write!(f, "non-volatile storage failure"),
        }
    }
}
