//! ACPI table access for the service.
//!
//! Tables arrive as raw byte slices handed over by the ACPI bring-up code.
//! This module validates the standard SDT header and answers signature
//! lookups; the DMAR format itself lives in [`dmar`].
//!
//! Not in scope: AML, namespace evaluation, RSDP/XSDT discovery.

pub mod dmar;

use alloc::vec::Vec;

use log::{debug, warn};

use crate::error::{IntegrityError, SvcResult};

// ---------------------------------------------------------------------------
// ACPI table signatures (4-byte ASCII)
// ---------------------------------------------------------------------------

pub const DMAR_SIGNATURE: &[u8; 4] = b"DMAR";
pub const MCFG_SIGNATURE: &[u8; 4] = b"MCFG";
pub const MADT_SIGNATURE: &[u8; 4] = b"APIC";

/// Size of the standard header present at the start of every ACPI table.
pub const SDT_HEADER_SIZE: usize = 36;

// ---------------------------------------------------------------------------
// Little-endian field readers
// ---------------------------------------------------------------------------

pub(crate) fn read_u8(data: &[u8], offset: usize) -> Option<u8> {
    data.get(offset).copied()
}

pub(crate) fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub(crate) fn read_u64(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset.checked_add(8)?)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Some(u64::from_le_bytes(raw))
}

// ---------------------------------------------------------------------------
// SDT header
// ---------------------------------------------------------------------------

/// Standard ACPI table header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdtHeader {
    pub signature: [u8; 4],
    /// Length of the whole table, header included.
    pub length: u32,
    pub revision: u8,
    pub checksum: u8,
    pub oem_id: [u8; 6],
    pub oem_table_id: [u8; 8],
    pub oem_revision: u32,
    pub creator_id: u32,
    pub creator_revision: u32,
}

impl SdtHeader {
    /// Decode the header at the start of `data`.
    ///
    /// Only the header bytes are required; the declared length is not
    /// checked against `data` here.
    pub fn parse(data: &[u8]) -> SvcResult<Self> {
        if data.len() < SDT_HEADER_SIZE {
            return Err(IntegrityError::TruncatedTable {
                declared: SDT_HEADER_SIZE,
                available: data.len(),
            }
            .into());
        }

        let mut signature = [0u8; 4];
        signature.copy_from_slice(&data[0..4]);
        let mut oem_id = [0u8; 6];
        oem_id.copy_from_slice(&data[10..16]);
        let mut oem_table_id = [0u8; 8];
        oem_table_id.copy_from_slice(&data[16..24]);

        // The length check above makes every fixed offset readable.
        Ok(Self {
            signature,
            length: read_u32(data, 4).unwrap_or(0),
            revision: data[8],
            checksum: data[9],
            oem_id,
            oem_table_id,
            oem_revision: read_u32(data, 24).unwrap_or(0),
            creator_id: read_u32(data, 28).unwrap_or(0),
            creator_revision: read_u32(data, 32).unwrap_or(0),
        })
    }

    /// Declared table length in bytes.
    pub fn len(&self) -> usize {
        self.length as usize
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Sum of all bytes, mod 256. A valid table sums to zero.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

// ---------------------------------------------------------------------------
// Table lookup
// ---------------------------------------------------------------------------

/// Source of raw ACPI tables, keyed by signature.
///
/// `instance` follows ACPI numbering and starts at 1.
pub trait AcpiTableSource {
    fn find_table(&self, signature: &[u8; 4], instance: usize) -> Option<&[u8]>;
}

/// In-memory directory of ACPI tables.
///
/// Tables are validated when registered: the header must be complete, the
/// declared length must fit the provided bytes, and the checksum over the
/// declared length must be zero. Lookups return exactly the declared length.
#[derive(Debug, Default)]
pub struct TableDirectory<'a> {
    tables: Vec<(SdtHeader, &'a [u8])>,
}

impl<'a> TableDirectory<'a> {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    /// Validate and add a table.
    pub fn register(&mut self, data: &'a [u8]) -> SvcResult<()> {
        let header = SdtHeader::parse(data)?;
        if header.len() < SDT_HEADER_SIZE || header.len() > data.len() {
            warn!(
                "[ACPI] Rejecting {:?}: declared length {} with {} bytes available",
                header.signature,
                header.length,
                data.len()
            );
            return Err(IntegrityError::TruncatedTable {
                declared: header.len(),
                available: data.len(),
            }
            .into());
        }

        let table = &data[..header.len()];
        let sum = checksum(table);
        if sum != 0 {
            warn!("[ACPI] Rejecting {:?}: bad checksum", header.signature);
            return Err(IntegrityError::BadChecksum { sum }.into());
        }

        debug!(
            "[ACPI] Registered {:?} (len {}, rev {})",
            header.signature, header.length, header.revision
        );
        self.tables.push((header, table));
        Ok(())
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl AcpiTableSource for TableDirectory<'_> {
    fn find_table(&self, signature: &[u8; 4], instance: usize) -> Option<&[u8]> {
        if instance == 0 {
            return None;
        }
        self.tables
            .iter()
            .filter(|(header, _)| &header.signature == signature)
            .nth(instance - 1)
            .map(|(_, table)| *table)
    }
}
