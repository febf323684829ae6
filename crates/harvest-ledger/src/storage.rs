//! Storage primitive: enumerable containers of tagged, massed items.
//!
//! Storages belong to the host simulation and may be mutated by unrelated
//! code at any time. Each storage owns its observer list; every mutation
//! returns a [`Mutation`] carrying a *copy* of that list, so the host can
//! dispatch notifications while observers subscribe or unsubscribe.
//!
//! # Example
//!
//! ```
//! use harvest_ledger::{EntityId, StorageArena, Tag};
//!
//! let mut storages = StorageArena::new();
//! let tank = storages.create(None);
//! storages.subscribe(tank, EntityId::new(1));
//!
//! storages.deposit(tank, Tag::new("Water"), 10.0);
//! let mutation = storages.withdraw(tank, &Tag::new("Water"), 4.0).unwrap();
//!
//! assert!((mutation.moved_kg - 4.0).abs() < 1e-12);
//! assert_eq!(mutation.observers, vec![EntityId::new(1)]);
//! assert!((storages.get(tank).unwrap().mass_of(&Tag::new("Water")) - 6.0).abs() < 1e-12);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, SiteId, StorageId};
use crate::material::Tag;

/// A discrete item inside a storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Type tag.
    pub tag: Tag,
    /// Mass (kg).
    pub mass_kg: f64,
}

/// Result of a storage mutation, to be dispatched to `observers`.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    /// The storage that changed.
    pub storage: StorageId,
    /// Mass added or removed (kg, always non-negative).
    pub moved_kg: f64,
    /// Observers subscribed at the time of the mutation.
    pub observers: Vec<EntityId>,
}

/// A single mutable container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Storage {
    owner: Option<SiteId>,
    items: Vec<Item>,
    observers: Vec<EntityId>,
}

impl Storage {
    /// Creates an empty storage, optionally owned by a planting site.
    #[must_use]
    pub fn new(owner: Option<SiteId>) -> Self {
        Self {
            owner,
            items: Vec::new(),
            observers: Vec::new(),
        }
    }

    /// Planting site that directly owns this storage, if any.
    #[must_use]
    pub fn owner(&self) -> Option<SiteId> {
        self.owner
    }

    /// Items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Summed mass of every item carrying `tag`.
    #[must_use]
    pub fn mass_of(&self, tag: &Tag) -> f64 {
        self.items
            .iter()
            .filter(|item| &item.tag == tag)
            .map(|item| item.mass_kg)
            .sum()
    }

    /// Summed mass of every item.
    #[must_use]
    pub fn total_mass(&self) -> f64 {
        self.items.iter().map(|item| item.mass_kg).sum()
    }

    /// Returns a copy of the observer list.
    ///
    /// Iterate the copy, never the live list: a notified observer may
    /// unsubscribe while the notification is still being dispatched.
    #[must_use]
    pub fn observers_snapshot(&self) -> Vec<EntityId> {
        self.observers.clone()
    }

    /// Returns true if `observer` is subscribed.
    #[must_use]
    pub fn is_observed_by(&self, observer: EntityId) -> bool {
        self.observers.contains(&observer)
    }

    fn add(&mut self, tag: Tag, mass_kg: f64) {
        self.items.push(Item { tag, mass_kg });
    }

    /// Removes up to `mass_kg` of `tag`, front to back, dropping emptied items.
    fn take(&mut self, tag: &Tag, mass_kg: f64) -> f64 {
        let mut remaining = mass_kg;
        for item in self.items.iter_mut().filter(|item| &item.tag == tag) {
            if remaining <= 0.0 {
                break;
            }
            let taken = item.mass_kg.min(remaining);
            item.mass_kg -= taken;
            remaining -= taken;
        }
        self.items.retain(|item| item.mass_kg > 0.0);
        mass_kg - remaining
    }
}

/// All storages known to the host, keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageArena {
    next_id: u64,
    storages: BTreeMap<StorageId, Storage>,
}

impl StorageArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage and returns its id.
    pub fn create(&mut self, owner: Option<SiteId>) -> StorageId {
        let id = StorageId::new(self.next_id);
        self.next_id += 1;
        self.storages.insert(id, Storage::new(owner));
        id
    }

    /// Removes a storage entirely. Returns the removed storage.
    pub fn destroy(&mut self, id: StorageId) -> Option<Storage> {
        self.storages.remove(&id)
    }

    /// Looks up a storage.
    #[must_use]
    pub fn get(&self, id: StorageId) -> Option<&Storage> {
        self.storages.get(&id)
    }

    /// Storages directly owned by `site`, in id order.
    #[must_use]
    pub fn owned_by(&self, site: SiteId) -> Vec<StorageId> {
        self.storages
            .iter()
            .filter(|(_, storage)| storage.owner == Some(site))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Number of storages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storages.len()
    }

    /// Returns true if there are no storages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storages.is_empty()
    }

    /// Adds an item. Returns `None` for an unknown storage or a non-positive mass.
    pub fn deposit(&mut self, id: StorageId, tag: Tag, mass_kg: f64) -> Option<Mutation> {
        if !mass_kg.is_finite() || mass_kg <= 0.0 {
            return None;
        }
        let storage = self.storages.get_mut(&id)?;
        storage.add(tag, mass_kg);
        Some(Mutation {
            storage: id,
            moved_kg: mass_kg,
            observers: storage.observers_snapshot(),
        })
    }

    /// Removes up to `mass_kg` of `tag`. Returns `None` if nothing was removed.
    pub fn withdraw(&mut self, id: StorageId, tag: &Tag, mass_kg: f64) -> Option<Mutation> {
        if mass_kg.is_nan() || mass_kg <= 0.0 {
            return None;
        }
        let storage = self.storages.get_mut(&id)?;
        let moved_kg = storage.take(tag, mass_kg);
        if moved_kg <= 0.0 {
            return None;
        }
        Some(Mutation {
            storage: id,
            moved_kg,
            observers: storage.observers_snapshot(),
        })
    }

    /// Subscribes `observer` to mutations. Returns false if already subscribed.
    pub fn subscribe(&mut self, id: StorageId, observer: EntityId) -> bool {
        match self.storages.get_mut(&id) {
            Some(storage) if !storage.observers.contains(&observer) => {
                storage.observers.push(observer);
                true
            }
            _ => false,
        }
    }

    /// Unsubscribes `observer`. Returns false if it was not subscribed.
    pub fn unsubscribe(&mut self, id: StorageId, observer: EntityId) -> bool {
        let Some(storage) = self.storages.get_mut(&id) else {
            return false;
        };
        let before = storage.observers.len();
        storage.observers.retain(|o| *o != observer);
        storage.observers.len() != before
    }
}
