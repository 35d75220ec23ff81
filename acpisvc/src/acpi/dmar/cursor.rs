//! Bounds-checked walker over packed DMAR remapping structures.

use core::iter::FusedIterator;

use super::{hardware_unit::HardwareUnit, RecordType, RECORD_HEADER_SIZE};
use crate::{
    acpi::read_u16,
    error::{IntegrityError, SvcResult},
};

/// One remapping structure, borrowed from the table.
#[derive(Debug, Clone, Copy)]
pub struct DmarRecord<'a> {
    offset: usize,
    record_type: RecordType,
    bytes: &'a [u8],
}

impl<'a> DmarRecord<'a> {
    /// Table offset of the record header.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Table offset of the first byte after the 4-byte record header.
    pub fn body_offset(&self) -> usize {
        self.offset + RECORD_HEADER_SIZE
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Declared length, header included.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The whole record, header included.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Forward-only cursor over the records in `start..end`.
///
/// Each step reads the record's declared length and advances by exactly that
/// much. A record that is shorter than its own header, that runs past `end`,
/// or a tail too small to hold a header yields one `Err` and then the cursor
/// stops. A cursor that runs to `None` without an error has landed exactly on
/// `end`.
#[derive(Debug, Clone)]
pub struct RecordCursor<'a> {
    data: &'a [u8],
    offset: usize,
    end: usize,
    failed: bool,
}

impl<'a> RecordCursor<'a> {
    pub fn new(data: &'a [u8], start: usize, end: usize) -> Self {
        Self {
            data,
            offset: start,
            end,
            failed: false,
        }
    }

    /// Offset of the next record to be read.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether the cursor is positioned exactly at its end offset.
    pub fn is_exhausted(&self) -> bool {
        self.offset == self.end
    }

    /// Keep only hardware unit records, decoded.
    pub fn hardware_units(self) -> impl Iterator<Item = SvcResult<HardwareUnit<'a>>> + 'a {
        self.filter_map(|record| match record {
            Ok(record) if record.record_type() == RecordType::HardwareUnit => {
                Some(HardwareUnit::parse(&record))
            }
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
    }

    fn fail(&mut self, err: IntegrityError) -> Option<SvcResult<DmarRecord<'a>>> {
        self.failed = true;
        Some(Err(err.into()))
    }
}

impl<'a> Iterator for RecordCursor<'a> {
    type Item = SvcResult<DmarRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset == self.end {
            return None;
        }

        let offset = self.offset;
        let remaining = self.end.saturating_sub(offset);
        if remaining < RECORD_HEADER_SIZE {
            return self.fail(IntegrityError::MisalignedEnd {
                offset,
                end: self.end,
            });
        }

        let (raw_type, length) = match (
            read_u16(self.data, offset),
            read_u16(self.data, offset + 2),
        ) {
            (Some(t), Some(l)) => (t, l as usize),
            _ => {
                return self.fail(IntegrityError::RecordOverrun {
                    offset,
                    length: RECORD_HEADER_SIZE,
                    end: self.data.len(),
                })
            }
        };

        if length < RECORD_HEADER_SIZE {
            return self.fail(IntegrityError::RecordTooShort { offset, length });
        }
        if length > remaining {
            return self.fail(IntegrityError::RecordOverrun {
                offset,
                length,
                end: self.end,
            });
        }
        let Some(bytes) = self.data.get(offset..offset + length) else {
            return self.fail(IntegrityError::RecordOverrun {
                offset,
                length,
                end: self.data.len(),
            });
        };

        self.offset += length;
        Some(Ok(DmarRecord {
            offset,
            record_type: RecordType::from(raw_type),
            bytes,
        }))
    }
}

impl FusedIterator for RecordCursor<'_> {}
