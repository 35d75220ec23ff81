//! Intel IOMMU publication
//!
//! Compiles DMAR hardware units into [`desc::IntelIommuDesc`] descriptors and
//! hands each one to an [`IommuFactory`], the boundary at which a descriptor
//! becomes a live IOMMU object:
//!
//! - [`extract`]: two-pass scope extraction (count, then fill)
//! - [`builder`]: per-unit descriptor builders
//! - [`compiler`]: the table walk that dispatches units to builders
//! - [`registry`]: an in-process factory backing the object table

pub mod builder;
pub mod compiler;
pub mod desc;
pub mod extract;
pub mod registry;

#[cfg(test)]
mod tests;

use crate::cap::{CapabilityToken, RootResource};

/// IOMMU descriptor formats understood by the creation call.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IommuKind {
    Dummy = 0,
    Intel = 1,
}

/// Handle to a live IOMMU object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IommuHandle(pub CapabilityToken);

impl IommuHandle {
    pub fn token(&self) -> CapabilityToken {
        self.0
    }
}

/// Reasons the IOMMU creation call rejects a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IommuCreateError {
    /// The authority lacks the right to create IOMMUs.
    AccessDenied,
    /// The descriptor bytes do not decode.
    InvalidDescriptor,
    /// The descriptor kind is not supported.
    NotSupported,
    /// Another IOMMU already claims this hardware unit.
    AlreadyExists,
    NoMemory,
}

/// Boundary call that turns an encoded descriptor into an IOMMU object.
///
/// Called once per hardware unit with the packed descriptor bytes; the bytes
/// are released by the caller as soon as this returns.
pub trait IommuFactory {
    fn create_iommu(
        &self,
        authority: &RootResource,
        kind: IommuKind,
        desc: &[u8],
    ) -> Result<IommuHandle, IommuCreateError>;
}

impl<F: IommuFactory + ?Sized> IommuFactory for &F {
    fn create_iommu(
        &self,
        authority: &RootResource,
        kind: IommuKind,
        desc: &[u8],
    ) -> Result<IommuHandle, IommuCreateError> {
        (**self).create_iommu(authority, kind, desc)
    }
}
