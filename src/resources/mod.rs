//! Composite resource table
//!
//! Every window, pixmap, GC, colormap and picture a client creates exists once
//! per physical screen. The table maps the logical id the client uses to the
//! per-screen ids. Screen 0's physical id is the logical id itself and is the
//! key of the table; the other screens receive ids from the server's private
//! range.

use crate::protocol::*;
use crate::screens::ScreenIndex;
use crate::security::{Access, ClientId, SecurityPolicy};
use std::collections::{BTreeMap, HashMap};

/// Bit marking ids allocated by the server rather than by a client
pub const SERVER_BIT: u32 = 0x4000_0000;

/// Ids below this value fit in the server range
const RESOURCE_ID_MASK: u32 = 0x3FFF_FFFF;

/// Kind of a composite resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Picture,
    Gc,
    Window,
    Pixmap,
    Colormap,
}

impl ResourceKind {
    /// Error reported when a lookup of this kind fails
    pub fn not_found(&self, id: XID) -> X11Error {
        match self {
            ResourceKind::Window => X11Error::bad_window(id),
            ResourceKind::Pixmap => X11Error::bad_pixmap(id),
            ResourceKind::Gc => X11Error::bad_gc(id),
            ResourceKind::Colormap => X11Error::bad_colormap(id),
            ResourceKind::Picture => X11Error::bad_picture(id),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Window => "window",
            ResourceKind::Pixmap => "pixmap",
            ResourceKind::Gc => "gc",
            ResourceKind::Colormap => "colormap",
            ResourceKind::Picture => "picture",
        }
    }
}

/// Per-kind flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindData {
    Window { is_root: bool, class: WindowClass },
    Pixmap { shared: bool },
    Gc,
    Colormap,
    Picture { is_root: bool },
}

impl KindData {
    pub fn kind(&self) -> ResourceKind {
        match self {
            KindData::Window { .. } => ResourceKind::Window,
            KindData::Pixmap { .. } => ResourceKind::Pixmap,
            KindData::Gc => ResourceKind::Gc,
            KindData::Colormap => ResourceKind::Colormap,
            KindData::Picture { .. } => ResourceKind::Picture,
        }
    }
}

/// One logical resource and its physical counterparts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeResource {
    pub logical_id: XID,
    pub owner: ClientId,
    /// A screen without an entry holds no physical resource
    pub per_screen: BTreeMap<ScreenIndex, XID>,
    pub data: KindData,
}

impl CompositeResource {
    pub fn kind(&self) -> ResourceKind {
        self.data.kind()
    }

    /// Physical id on `screen`
    pub fn physical(&self, screen: ScreenIndex) -> Option<XID> {
        self.per_screen.get(&screen).copied()
    }

    /// Physical id on `screen`, or the kind's lookup error when the screen
    /// holds no counterpart
    pub fn physical_on(&self, screen: ScreenIndex) -> X11Result<XID> {
        self.physical(screen)
            .ok_or_else(|| self.kind().not_found(self.logical_id))
    }

    /// Table key
    pub fn key(&self) -> XID {
        self.logical_id
    }

    /// The logical root window, or a picture drawn on it
    pub fn is_root(&self) -> bool {
        matches!(
            self.data,
            KindData::Window { is_root: true, .. } | KindData::Picture { is_root: true }
        )
    }

    /// A pixmap whose storage is shared by every screen
    pub fn is_shared(&self) -> bool {
        matches!(self.data, KindData::Pixmap { shared: true })
    }

    pub fn is_window(&self) -> bool {
        self.kind() == ResourceKind::Window
    }

    pub fn window_class(&self) -> Option<WindowClass> {
        match self.data {
            KindData::Window { class, .. } => Some(class),
            _ => None,
        }
    }
}

/// Allocator for server-private resource ids
#[derive(Debug)]
pub struct IdAllocator {
    next: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        IdAllocator { next: 1 }
    }
}

impl IdAllocator {
    pub fn allocate(&mut self) -> X11Result<XID> {
        if self.next > RESOURCE_ID_MASK {
            return Err(X11Error::bad_alloc());
        }
        let id = XID(SERVER_BIT | self.next);
        self.next += 1;
        Ok(id)
    }
}

/// Logical id to per-screen ids
#[derive(Debug)]
pub struct CompositeTable {
    entries: HashMap<XID, CompositeResource>,
    /// Physical id on a screen other than 0 to its logical id
    physical: HashMap<(ScreenIndex, XID), XID>,
    ids: IdAllocator,
    screens: usize,
    policy: SecurityPolicy,
}

impl CompositeTable {
    pub fn new(screens: usize, policy: SecurityPolicy) -> Self {
        CompositeTable {
            entries: HashMap::new(),
            physical: HashMap::new(),
            ids: IdAllocator::default(),
            screens,
            policy,
        }
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// A fresh id from the server range
    pub fn allocate_id(&mut self) -> X11Result<XID> {
        self.ids.allocate()
    }

    /// Allocate a record for a new resource. Screen 0 gets the logical id,
    /// the other screens get fresh server ids. The record is not registered.
    pub fn create(
        &mut self,
        logical_id: XID,
        owner: ClientId,
        data: KindData,
    ) -> X11Result<CompositeResource> {
        if !self.policy.may_create(self.count_owned(owner)) {
            log::warn!("Client {} reached its resource limit", owner);
            return Err(X11Error::bad_alloc());
        }

        let mut per_screen = BTreeMap::new();
        per_screen.insert(ScreenIndex::PRIMARY, logical_id);
        for index in 1..self.screens {
            per_screen.insert(ScreenIndex(index), self.ids.allocate()?);
        }

        Ok(CompositeResource {
            logical_id,
            owner,
            per_screen,
            data,
        })
    }

    /// Insert a record; a record already present under the key is an
    /// allocation failure and leaves the table untouched
    pub fn register(&mut self, resource: CompositeResource) -> X11Result<()> {
        let key = resource.key();
        if self.entries.contains_key(&key) {
            return Err(X11Error::bad_alloc());
        }
        log::debug!(
            "Registered {} {} for client {} ({} screens)",
            resource.kind().as_str(),
            key,
            resource.owner,
            resource.per_screen.len()
        );
        for (screen, id) in &resource.per_screen {
            if !screen.is_primary() {
                self.physical.insert((*screen, *id), key);
            }
        }
        self.entries.insert(key, resource);
        Ok(())
    }

    /// Look up a resource of one kind on behalf of `client`
    pub fn lookup(
        &self,
        id: XID,
        kind: ResourceKind,
        client: ClientId,
        access: Access,
    ) -> X11Result<&CompositeResource> {
        let resource = self
            .entries
            .get(&id)
            .filter(|r| r.kind() == kind)
            .ok_or_else(|| kind.not_found(id))?;
        self.check_access(resource, client, access)?;
        Ok(resource)
    }

    /// Look up a window or a pixmap. A miss is reported as `BadValue`, which
    /// drawable-taking requests turn into `BadDrawable`.
    pub fn lookup_drawable(
        &self,
        id: XID,
        client: ClientId,
        access: Access,
    ) -> X11Result<&CompositeResource> {
        let resource = self
            .entries
            .get(&id)
            .filter(|r| matches!(r.kind(), ResourceKind::Window | ResourceKind::Pixmap))
            .ok_or_else(|| X11Error::bad_value(id.get()))?;
        self.check_access(resource, client, access)?;
        Ok(resource)
    }

    fn check_access(
        &self,
        resource: &CompositeResource,
        client: ClientId,
        access: Access,
    ) -> X11Result<()> {
        if !self.policy.permits(client, resource.owner, access) {
            log::debug!(
                "Client {} denied {:?} on {} {}",
                client,
                access,
                resource.kind().as_str(),
                resource.logical_id
            );
            return Err(X11Error::bad_access(resource.logical_id.get()));
        }
        Ok(())
    }

    pub fn get(&self, id: XID) -> Option<&CompositeResource> {
        self.entries.get(&id)
    }

    /// Replace the per-kind flags of a resource of the same kind
    pub fn set_data(&mut self, id: XID, data: KindData) -> X11Result<()> {
        let resource = self
            .entries
            .get_mut(&id)
            .filter(|r| r.kind() == data.kind())
            .ok_or_else(|| data.kind().not_found(id))?;
        resource.data = data;
        Ok(())
    }

    pub fn contains(&self, id: XID) -> bool {
        self.entries.contains_key(&id)
    }

    /// Drop the record of a resource whose screen-0 counterpart is gone
    pub fn release(&mut self, id: XID) -> Option<CompositeResource> {
        let released = self.entries.remove(&id);
        if let Some(resource) = &released {
            for (screen, physical) in &resource.per_screen {
                self.physical.remove(&(*screen, *physical));
            }
            log::debug!("Released {} {}", resource.kind().as_str(), id);
        }
        released
    }

    /// A screen freed one of its physical resources. The screen is removed
    /// from the composite holding it, and the composite is dropped once no
    /// screen holds it any more. Returns the dropped record.
    pub fn release_physical(
        &mut self,
        screen: ScreenIndex,
        id: XID,
    ) -> Option<CompositeResource> {
        if screen.is_primary() {
            return self.release(id);
        }
        let logical = self.physical.remove(&(screen, id))?;
        let resource = self.entries.get_mut(&logical)?;
        resource.per_screen.remove(&screen);
        if resource.per_screen.is_empty() {
            return self.release(logical);
        }
        None
    }

    /// Resources owned by `client`, pictures and GCs first, colormaps last
    pub fn owned_by(&self, client: ClientId) -> Vec<(ResourceKind, XID)> {
        let mut owned: Vec<(ResourceKind, XID)> = self
            .entries
            .values()
            .filter(|r| r.owner == client)
            .map(|r| (r.kind(), r.logical_id))
            .collect();
        owned.sort();
        owned
    }

    pub fn count_owned(&self, client: ClientId) -> usize {
        self.entries.values().filter(|r| r.owner == client).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
