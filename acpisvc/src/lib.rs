//! VeridianOS ACPI service library
//!
//! Brings the firmware-described DMA remapping topology into the capability
//! model. The ACPI DMAR table is compiled into one Intel IOMMU descriptor per
//! hardware unit, and each descriptor is handed to the IOMMU creation call
//! together with the root resource authority.
//!
//! The crate is `no_std` + `alloc` so it can be linked into the bare-metal
//! service; unit tests build it against `std`.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod acpi;
pub mod cap;
pub mod config;
pub mod error;
pub mod iommu;
pub mod service;

#[cfg(test)]
mod test_support;

pub use config::CompilerConfig;
pub use error::{AcpiSvcError, IntegrityError, SvcResult};
pub use iommu::{
    compiler::{compile_dmar, DmarCompiler},
    desc::{IntelIommuDesc, IommuScopeKind, PathHop, ScopeEntry},
    registry::IommuRegistry,
    IommuCreateError, IommuFactory, IommuHandle, IommuKind,
};
pub use service::{publish_iommus, IommuReport};
