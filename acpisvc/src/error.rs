//! Error types for the ACPI service
//!
//! Every failure in the DMAR compiler is surfaced synchronously as an
//! [`AcpiSvcError`]. Nothing is retried or skipped locally; only the caller of
//! [`crate::service::publish_iommus`] decides whether a missing table is
//! fatal.

use core::fmt;

use crate::iommu::IommuCreateError;

/// Main service error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcpiSvcError {
    /// The requested ACPI table is not present.
    NotFound { table: &'static str },

    /// The firmware table is malformed.
    IntegrityViolation(IntegrityError),

    /// A fill pass would exceed the capacity computed by its counting pass.
    /// This is an internal sizing defect, not a malformed table.
    CapacityViolation { capacity: usize, required: usize },

    /// A descriptor buffer could not be allocated.
    AllocationFailure { requested: usize },

    /// The IOMMU creation call rejected a well-formed descriptor.
    BoundaryCallFailure {
        register_base: u64,
        reason: IommuCreateError,
    },
}

/// Table corruption details
///
/// Offsets are byte offsets from the start of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityError {
    BadSignature { found: [u8; 4] },
    BadChecksum { sum: u8 },
    TruncatedTable { declared: usize, available: usize },
    EmptyRecordRegion { start: usize, end: usize },
    TableTooLong { length: usize, max: usize },
    RecordTooShort { offset: usize, length: usize },
    RecordOverrun { offset: usize, length: usize, end: usize },
    MisalignedEnd { offset: usize, end: usize },
    HardwareUnitTooShort { offset: usize, length: usize },
    ScopeTooShort { offset: usize, length: usize },
    ScopeOverrun { offset: usize, length: usize, end: usize },
    OddPathLength { offset: usize, length: usize },
    TooManyHops { offset: usize, hops: usize, max: usize },
}

/// Result type alias for service operations
pub type SvcResult<T> = Result<T, AcpiSvcError>;

impl fmt::Display for AcpiSvcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { table } => write!(f, "ACPI table {} not found", table),
            Self::IntegrityViolation(e) => write!(f, "Table integrity violation: {}", e),
            Self::CapacityViolation { capacity, required } => {
                write!(
                    f,
                    "Scope capacity exceeded: capacity {}, required {}",
                    capacity, required
                )
            }
            Self::AllocationFailure { requested } => {
                write!(f, "Allocation of {} bytes failed", requested)
            }
            Self::BoundaryCallFailure {
                register_base,
                reason,
            } => {
                write!(
                    f,
                    "IOMMU creation for unit at {:#x} failed: {:?}",
                    register_base, reason
                )
            }
        }
    }
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadSignature { found } => write!(f, "unexpected signature {:?}", found),
            Self::BadChecksum { sum } => write!(f, "checksum sums to {:#x}", sum),
            Self::TruncatedTable {
                declared,
                available,
            } => {
                write!(
                    f,
                    "table declares {} bytes but only {} are available",
                    declared, available
                )
            }
            Self::EmptyRecordRegion { start, end } => {
                write!(f, "empty or inverted record region {:#x}..{:#x}", start, end)
            }
            Self::TableTooLong { length, max } => {
                write!(f, "table suspiciously long: {} bytes (max {})", length, max)
            }
            Self::RecordTooShort { offset, length } => {
                write!(f, "record at {:#x} has invalid length {}", offset, length)
            }
            Self::RecordOverrun {
                offset,
                length,
                end,
            } => {
                write!(
                    f,
                    "record at {:#x} (length {}) runs past end {:#x}",
                    offset, length, end
                )
            }
            Self::MisalignedEnd { offset, end } => {
                write!(f, "traversal stopped at {:#x} instead of {:#x}", offset, end)
            }
            Self::HardwareUnitTooShort { offset, length } => {
                write!(f, "hardware unit at {:#x} too short: {}", offset, length)
            }
            Self::ScopeTooShort { offset, length } => {
                write!(f, "device scope at {:#x} too short: {}", offset, length)
            }
            Self::ScopeOverrun {
                offset,
                length,
                end,
            } => {
                write!(
                    f,
                    "device scope at {:#x} (length {}) runs past unit end {:#x}",
                    offset, length, end
                )
            }
            Self::OddPathLength { offset, length } => {
                write!(
                    f,
                    "device scope at {:#x} has a partial path hop (length {})",
                    offset, length
                )
            }
            Self::TooManyHops { offset, hops, max } => {
                write!(
                    f,
                    "device scope at {:#x} has {} hops (max {})",
                    offset, hops, max
                )
            }
        }
    }
}

impl From<IntegrityError> for AcpiSvcError {
    fn from(err: IntegrityError) -> Self {
        Self::IntegrityViolation(err)
    }
}
