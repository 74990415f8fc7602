use core::fmt;

/// Reasons a slot array cannot be built with the requested capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityError {
    /// The index needs at least one slot
    Zero,
    /// Slots are addressed by shifting the hash, so the count must be a power of two
    NotPowerOfTwo(usize),
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityError::Zero => write!(f, "capacity must be at least one slot"),
            CapacityError::NotPowerOfTwo(capacity) => {
                write!(f, "capacity {} is not a power of two", capacity)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CapacityError {}
