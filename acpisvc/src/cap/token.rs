//! Capability token implementation
//!
//! Implements the 64-bit capability token format with packed fields
//! for efficient storage and fast validation.

use bitflags::bitflags;

/// Maximum capability ID (48 bits)
pub const MAX_CAP_ID: u64 = (1 << 48) - 1;

/// 64-bit capability token with packed fields
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CapabilityToken(u64);

impl CapabilityToken {
    /// Create a new capability token
    pub fn new(id: u64, generation: u8, cap_type: ObjectType, flags: u8) -> Self {
        debug_assert!(id <= MAX_CAP_ID, "ID exceeds 48 bits");
        debug_assert!(flags <= 0xF, "Flags exceed 4 bits");

        let value = (id & MAX_CAP_ID)
            | ((generation as u64) << 48)
            | (((cap_type as u64) & 0xF) << 56)
            | (((flags as u64) & 0xF) << 60);

        Self(value)
    }

    /// Get the capability ID (48 bits)
    #[inline]
    pub fn id(&self) -> u64 {
        self.0 & MAX_CAP_ID
    }

    /// Get the generation counter (8 bits)
    #[inline]
    pub fn generation(&self) -> u8 {
        ((self.0 >> 48) & 0xFF) as u8
    }

    /// Get the object type code (4 bits)
    #[inline]
    pub fn cap_type(&self) -> u8 {
        ((self.0 >> 56) & 0xF) as u8
    }

    /// Get the flags (4 bits)
    #[inline]
    pub fn flags(&self) -> u8 {
        ((self.0 >> 60) & 0xF) as u8
    }

    /// Convert to raw u64 value
    #[inline]
    pub fn to_u64(self) -> u64 {
        self.0
    }

    /// Create from raw u64 value
    #[inline]
    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Check if this is a null capability
    #[inline]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Create a null capability
    #[inline]
    pub const fn null() -> Self {
        Self(0)
    }
}

/// Kernel object kinds a token can name (4 bits)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    /// Root resource: authority over platform hardware
    Resource = 0,
    /// IOMMU hardware unit
    Iommu = 1,
}

bitflags! {
    /// Rights held alongside a token.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Rights: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const GRANT = 1 << 3;
        /// May register IOMMU hardware units.
        const CREATE_IOMMU = 1 << 8;
    }
}

impl Rights {
    /// Convert to capability flags (4-bit)
    #[inline]
    pub fn to_flags(self) -> u8 {
        (self.bits() & 0xF) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_token_creation() {
        let cap = CapabilityToken::new(0x1234_5678_9ABC, 0x42, ObjectType::Iommu, 0x3);

        assert_eq!(cap.id(), 0x1234_5678_9ABC);
        assert_eq!(cap.generation(), 0x42);
        assert_eq!(cap.cap_type(), ObjectType::Iommu as u8);
        assert_eq!(cap.flags(), 0x3);
        assert_eq!(CapabilityToken::from_u64(cap.to_u64()), cap);
    }

    #[test]
    fn test_null_capability() {
        let cap = CapabilityToken::null();
        assert!(cap.is_null());
        assert_eq!(cap.to_u64(), 0);
    }

    #[test]
    fn test_rights_flags() {
        let rights = Rights::READ | Rights::CREATE_IOMMU;
        assert!(rights.contains(Rights::CREATE_IOMMU));
        assert!(!rights.contains(Rights::WRITE));
        assert_eq!(rights.to_flags(), 0x1);
        assert_eq!(Rights::all().to_flags(), 0xB);
    }
}
