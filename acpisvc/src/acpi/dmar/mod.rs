//! DMAR (DMA Remapping) table format
//!
//! Layout of the table, all little-endian:
//!
//! ```text
//! 0   SDT header (36 bytes, signature "DMAR")
//! 36  host address width (u8)
//! 37  flags (u8)
//! 38  reserved (10 bytes)
//! 48  remapping structures: type(u16) + length(u16) + body, packed
//! ```
//!
//! Every remapping structure carries its own length, so the table is walked
//! forward record by record with [`RecordCursor`]. Only hardware units
//! (DRHD, type 0) are interpreted; everything else is skipped by length.

pub mod cursor;
pub mod hardware_unit;
pub mod scope;

use log::warn;

pub use self::{
    cursor::{DmarRecord, RecordCursor},
    hardware_unit::{DrhdFlags, HardwareUnit},
    scope::{DeviceScope, PathHop, ScopeIter, ScopeType},
};
use super::{SdtHeader, DMAR_SIGNATURE, SDT_HEADER_SIZE};
use crate::{
    config::CompilerConfig,
    error::{IntegrityError, SvcResult},
};

/// DMAR table header size: 36-byte ACPI SDT header + 1 byte host_address_width
/// + 1 byte flags + 10 reserved bytes = 48 bytes.
pub const DMAR_HEADER_SIZE: usize = 48;

/// Remapping structure header: type(2) + length(2).
pub const RECORD_HEADER_SIZE: usize = 4;

/// DMAR remapping structure type codes.
const DMAR_TYPE_DRHD: u16 = 0;
const DMAR_TYPE_RMRR: u16 = 1;
const DMAR_TYPE_ATSR: u16 = 2;
const DMAR_TYPE_RHSA: u16 = 3;
const DMAR_TYPE_ANDD: u16 = 4;
const DMAR_TYPE_SATC: u16 = 5;
const DMAR_TYPE_SIDP: u16 = 6;

/// DMAR remapping structure types (Intel VT-d, section 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// DMA Remapping Hardware Unit Definition (DRHD).
    HardwareUnit,
    /// Reserved Memory Region Reporting (RMRR).
    ReservedMemory,
    /// Root Port ATS Capability Reporting (ATSR).
    RootPortAts,
    /// Remapping Hardware Static Affinity (RHSA).
    HardwareAffinity,
    /// ACPI Name-space Device Declaration (ANDD).
    NamespaceDevice,
    /// SoC Integrated Address Translation Cache (SATC).
    SocTranslationCache,
    /// SoC Integrated Device Property (SIDP).
    SocDeviceProperty,
    Unknown(u16),
}

impl From<u16> for RecordType {
    fn from(raw: u16) -> Self {
        match raw {
            DMAR_TYPE_DRHD => Self::HardwareUnit,
            DMAR_TYPE_RMRR => Self::ReservedMemory,
            DMAR_TYPE_ATSR => Self::RootPortAts,
            DMAR_TYPE_RHSA => Self::HardwareAffinity,
            DMAR_TYPE_ANDD => Self::NamespaceDevice,
            DMAR_TYPE_SATC => Self::SocTranslationCache,
            DMAR_TYPE_SIDP => Self::SocDeviceProperty,
            other => Self::Unknown(other),
        }
    }
}

/// A validated DMAR table borrowed from firmware memory.
///
/// Construction checks the signature and the record region bounds; records
/// themselves are validated lazily as the cursor walks them.
#[derive(Debug, Clone, Copy)]
pub struct DmarTable<'a> {
    data: &'a [u8],
    header: SdtHeader,
    host_address_width: u8,
    flags: u8,
}

impl<'a> DmarTable<'a> {
    /// Validate the table header and record region.
    ///
    /// Rejects an empty or inverted record region and any declared length
    /// above `config.max_table_length` before a single record is read.
    pub fn parse(data: &'a [u8], config: &CompilerConfig) -> SvcResult<Self> {
        let header = SdtHeader::parse(data)?;
        if &header.signature != DMAR_SIGNATURE {
            return Err(IntegrityError::BadSignature {
                found: header.signature,
            }
            .into());
        }

        let start = DMAR_HEADER_SIZE;
        let end = header.len();
        if start >= end {
            warn!("[IOMMU] DMAR record region is empty ({:#x}..{:#x})", start, end);
            return Err(IntegrityError::EmptyRecordRegion { start, end }.into());
        }
        if end > config.max_table_length {
            warn!("[IOMMU] DMAR suspiciously long: {}", end);
            return Err(IntegrityError::TableTooLong {
                length: end,
                max: config.max_table_length,
            }
            .into());
        }
        if end > data.len() {
            return Err(IntegrityError::TruncatedTable {
                declared: end,
                available: data.len(),
            }
            .into());
        }

        Ok(Self {
            data: &data[..end],
            header,
            host_address_width: data[SDT_HEADER_SIZE],
            flags: data[SDT_HEADER_SIZE + 1],
        })
    }

    pub fn header(&self) -> &SdtHeader {
        &self.header
    }

    /// Host address width (physical address bits - 1).
    pub fn host_address_width(&self) -> u8 {
        self.host_address_width
    }

    /// Global flags (bit 0: INTR_REMAP, bit 1: X2APIC_OPT_OUT).
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Offset of the first remapping structure.
    pub fn records_start(&self) -> usize {
        DMAR_HEADER_SIZE
    }

    /// Offset one past the last remapping structure (`Header.Length`).
    pub fn records_end(&self) -> usize {
        self.data.len()
    }

    /// Walk every remapping structure in the table.
    pub fn records(&self) -> RecordCursor<'a> {
        RecordCursor::new(self.data, self.records_start(), self.records_end())
    }

    /// Walk the remapping structures that precede `offset`.
    ///
    /// `offset` must be the start of a record reached by an earlier walk;
    /// otherwise the cursor reports a misaligned end.
    pub fn records_before(&self, offset: usize) -> RecordCursor<'a> {
        RecordCursor::new(self.data, self.records_start(), offset)
    }
}
