//! Builders for synthetic DMAR tables used by the unit tests.

use alloc::vec::Vec;

use crate::acpi::{checksum, DMAR_SIGNATURE};

pub const SCOPE_ENDPOINT: u8 = 1;
pub const SCOPE_BRIDGE: u8 = 2;
pub const SCOPE_IOAPIC: u8 = 3;

/// Encode a device scope with `(device, function)` hops.
pub fn scope(entry_type: u8, start_bus: u8, hops: &[(u8, u8)]) -> Vec<u8> {
    let len = 6 + 2 * hops.len();
    let mut out = alloc::vec![entry_type, len as u8, 0, 0, 0, start_bus];
    for &(device, function) in hops {
        let raw = ((device as u16) << 8) | function as u16;
        out.extend_from_slice(&raw.to_le_bytes());
    }
    out
}

/// Assembles a DMAR table record by record.
#[derive(Debug, Default)]
pub struct DmarBuilder {
    body: Vec<u8>,
    declared_length: Option<u32>,
}

impl DmarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hardware_unit(
        self,
        segment: u16,
        register_base: u64,
        whole_segment: bool,
        scopes: &[Vec<u8>],
    ) -> Self {
        let mut body = Vec::new();
        body.push(whole_segment as u8);
        body.push(0);
        body.extend_from_slice(&segment.to_le_bytes());
        body.extend_from_slice(&register_base.to_le_bytes());
        for scope in scopes {
            body.extend_from_slice(scope);
        }
        self.record(0, &body)
    }

    /// Append a record, adding its 4-byte type/length header.
    pub fn record(mut self, record_type: u16, body: &[u8]) -> Self {
        let len = (4 + body.len()) as u16;
        self.body.extend_from_slice(&record_type.to_le_bytes());
        self.body.extend_from_slice(&len.to_le_bytes());
        self.body.extend_from_slice(body);
        self
    }

    /// Append bytes verbatim.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(bytes);
        self
    }

    /// Override the length written into the SDT header.
    pub fn declared_length(mut self, length: u32) -> Self {
        self.declared_length = Some(length);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut data = alloc::vec![0u8; 48];
        data[0..4].copy_from_slice(DMAR_SIGNATURE);
        data[8] = 1;
        data[10..16].copy_from_slice(b"VRDNOS");
        data[36] = 39;
        data[37] = 0x01;
        data.extend_from_slice(&self.body);

        let length = self.declared_length.unwrap_or(data.len() as u32);
        data[4..8].copy_from_slice(&length.to_le_bytes());
        data[9] = 0u8.wrapping_sub(checksum(&data));
        data
    }
}
