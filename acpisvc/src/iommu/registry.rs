//! In-process IOMMU object table
//!
//! Implements the creation call on top of a register-base keyed map. Each
//! hardware unit can be claimed once; a second descriptor for the same
//! register base is rejected. The map lives behind a [`spin::Mutex`] so the
//! registry can be shared by reference.

use alloc::{collections::BTreeMap, vec::Vec};
use core::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};
use spin::Mutex;

use super::{desc::IntelIommuDesc, IommuCreateError, IommuFactory, IommuHandle, IommuKind};
use crate::cap::{
    token::{ObjectType, MAX_CAP_ID},
    CapabilityToken, RootResource, Rights,
};

/// A registered IOMMU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IommuObject {
    pub handle: IommuHandle,
    pub kind: IommuKind,
    pub desc: IntelIommuDesc,
}

/// Table of live IOMMU objects.
#[derive(Debug)]
pub struct IommuRegistry {
    objects: Mutex<BTreeMap<u64, IommuObject>>,
    next_id: AtomicU64,
}

impl IommuRegistry {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of live IOMMU objects.
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// Look up the object registered for a hardware unit.
    pub fn get(&self, register_base: u64) -> Option<IommuObject> {
        self.objects.lock().get(&register_base).cloned()
    }

    /// Find an object by its handle.
    pub fn find(&self, handle: IommuHandle) -> Option<IommuObject> {
        self.objects
            .lock()
            .values()
            .find(|obj| obj.handle == handle)
            .cloned()
    }

    /// All live objects, ordered by register base.
    pub fn objects(&self) -> Vec<IommuObject> {
        self.objects.lock().values().cloned().collect()
    }

    fn mint_handle(&self) -> Result<IommuHandle, IommuCreateError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if id > MAX_CAP_ID {
            return Err(IommuCreateError::NoMemory);
        }
        let flags = (Rights::READ | Rights::WRITE).to_flags();
        Ok(IommuHandle(CapabilityToken::new(id, 0, ObjectType::Iommu, flags)))
    }
}

impl Default for IommuRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IommuFactory for IommuRegistry {
    fn create_iommu(
        &self,
        authority: &RootResource,
        kind: IommuKind,
        desc: &[u8],
    ) -> Result<IommuHandle, IommuCreateError> {
        if !authority.has_rights(Rights::CREATE_IOMMU) {
            warn!(
                "[IOMMU] Authority {:#x} may not create IOMMUs",
                authority.token().id()
            );
            return Err(IommuCreateError::AccessDenied);
        }
        if kind != IommuKind::Intel {
            return Err(IommuCreateError::NotSupported);
        }

        let desc = IntelIommuDesc::decode(desc)?;
        let register_base = desc.register_base();

        let mut objects = self.objects.lock();
        if objects.contains_key(&register_base) {
            warn!(
                "[IOMMU] Unit at {:#x} is already claimed",
                register_base
            );
            return Err(IommuCreateError::AlreadyExists);
        }

        let handle = self.mint_handle()?;
        debug!(
            "[IOMMU] Registered {:#x}: seg={}, whole_segment={}, scopes={}",
            register_base,
            desc.pci_segment(),
            desc.whole_segment(),
            desc.num_scopes()
        );
        objects.insert(register_base, IommuObject { handle, kind, desc });
        Ok(handle)
    }
}
