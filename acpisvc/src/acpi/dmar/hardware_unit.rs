//! DRHD: DMA Remapping Hardware Unit Definition structure.
//!
//! ```text
//! 0   type (u16) = 0
//! 2   length (u16)
//! 4   flags (u8)
//! 5   reserved (u8)
//! 6   segment (u16)
//! 8   register base address (u64)
//! 16  device scopes (variable, through `length`)
//! ```

use bitflags::bitflags;

use super::{cursor::DmarRecord, scope::ScopeIter, RecordType};
use crate::{
    acpi::{read_u16, read_u64, read_u8},
    error::{IntegrityError, SvcResult},
};

/// Fixed part of the DRHD structure; device scopes start here.
pub const HARDWARE_UNIT_HEADER_SIZE: usize = 16;

bitflags! {
    /// DRHD flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DrhdFlags: u8 {
        /// The unit covers every PCI device on its segment except those
        /// claimed by other units on the same segment.
        const INCLUDE_PCI_ALL = 1 << 0;
    }
}

/// A decoded hardware unit record.
#[derive(Debug, Clone, Copy)]
pub struct HardwareUnit<'a> {
    offset: usize,
    length: usize,
    flags: DrhdFlags,
    segment: u16,
    register_base: u64,
    scopes: &'a [u8],
}

impl<'a> HardwareUnit<'a> {
    /// Decode the fixed fields of a DRHD record.
    ///
    /// The device scopes are not validated here; they are checked as they
    /// are walked.
    pub fn parse(record: &DmarRecord<'a>) -> SvcResult<Self> {
        debug_assert_eq!(record.record_type(), RecordType::HardwareUnit);

        let bytes = record.bytes();
        let too_short = IntegrityError::HardwareUnitTooShort {
            offset: record.offset(),
            length: bytes.len(),
        };
        if bytes.len() < HARDWARE_UNIT_HEADER_SIZE {
            return Err(too_short.into());
        }

        let (Some(flags), Some(segment), Some(register_base)) =
            (read_u8(bytes, 4), read_u16(bytes, 6), read_u64(bytes, 8))
        else {
            return Err(too_short.into());
        };

        Ok(Self {
            offset: record.offset(),
            length: bytes.len(),
            flags: DrhdFlags::from_bits_retain(flags),
            segment,
            register_base,
            scopes: &bytes[HARDWARE_UNIT_HEADER_SIZE..],
        })
    }

    /// Table offset of the record header.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Declared record length.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn flags(&self) -> DrhdFlags {
        self.flags
    }

    /// Whether this is the catch-all unit for its segment.
    pub fn is_whole_segment(&self) -> bool {
        self.flags.contains(DrhdFlags::INCLUDE_PCI_ALL)
    }

    /// PCI segment group.
    pub fn segment(&self) -> u16 {
        self.segment
    }

    /// Register base address (MMIO).
    pub fn register_base(&self) -> u64 {
        self.register_base
    }

    /// Walk the device scope sub-records.
    pub fn scopes(&self) -> ScopeIter<'a> {
        ScopeIter::new(self.scopes, self.offset + HARDWARE_UNIT_HEADER_SIZE)
    }
}
