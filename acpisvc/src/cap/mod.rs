//! Capability values used by the ACPI service
//!
//! The service receives the root resource as a startup handle and threads it
//! explicitly into every call that needs hardware authority. There is no
//! process-wide copy of it.

pub mod token;

pub use token::{CapabilityToken, ObjectType, Rights};

/// Authority over platform resources, passed to the IOMMU creation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootResource {
    token: CapabilityToken,
    rights: Rights,
}

impl RootResource {
    pub fn new(token: CapabilityToken, rights: Rights) -> Self {
        Self { token, rights }
    }

    /// Root resource holding every right, as handed out by the device
    /// manager at startup.
    pub fn root() -> Self {
        let rights = Rights::all();
        Self::new(
            CapabilityToken::new(1, 0, ObjectType::Resource, rights.to_flags()),
            rights,
        )
    }

    pub fn token(&self) -> CapabilityToken {
        self.token
    }

    pub fn rights(&self) -> Rights {
        self.rights
    }

    /// Check that this authority holds every right in `required`.
    pub fn has_rights(&self, required: Rights) -> bool {
        !self.token.is_null() && self.rights.contains(required)
    }

    /// Derive a weaker authority.
    pub fn restrict(&self, rights: Rights) -> Self {
        let rights = self.rights & rights;
        Self::new(
            CapabilityToken::new(
                self.token.id(),
                self.token.generation(),
                ObjectType::Resource,
                rights.to_flags(),
            ),
            rights,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_resource_rights() {
        let root = RootResource::root();
        assert_eq!(root.token().id(), 1);
        assert!(root.has_rights(Rights::CREATE_IOMMU));

        let read_only = root.restrict(Rights::READ);
        assert!(read_only.has_rights(Rights::READ));
        assert!(!read_only.has_rights(Rights::CREATE_IOMMU));
        assert_eq!(read_only.token().id(), 1);
    }

    #[test]
    fn test_null_token_has_no_authority() {
        let resource = RootResource::new(CapabilityToken::null(), Rights::all());
        assert!(!resource.has_rights(Rights::CREATE_IOMMU));
    }
}
