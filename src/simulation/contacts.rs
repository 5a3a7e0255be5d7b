//! Contact records between entity pairs and the pair filter used by the broad phase.

use std::collections::{HashSet, VecDeque};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::collision::contact::ContactManifold;
use crate::config::CollisionFilterMode;
use crate::utils::allocator::{Arena, ContactId, EntityId};

/// One observed touch between the two entities of a [`Contact`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactEvent {
    pub time: f64,
    /// Mean contact point in world coordinates.
    pub point: Vec3,
    /// Normal pointing from the record's second entity towards its first.
    pub normal: Vec3,
    /// Total normal impulse of the manifold.
    pub impulse: f32,
}

/// Monitored pair of entities with a bounded event history.
#[derive(Debug, Clone)]
pub struct Contact {
    a: EntityId,
    b: EntityId,
    capacity: usize,
    history: VecDeque<ContactEvent>,
}

impl Contact {
    fn new(a: EntityId, b: EntityId, history_length: usize) -> Self {
        let capacity = history_length.max(1);
        Self {
            a,
            b,
            capacity,
            history: VecDeque::with_capacity(capacity),
        }
    }

    pub fn entities(&self) -> (EntityId, EntityId) {
        (self.a, self.b)
    }

    pub fn involves(&self, a: EntityId, b: EntityId) -> bool {
        (self.a == a && self.b == b) || (self.a == b && self.b == a)
    }

    pub fn history(&self) -> impl Iterator<Item = &ContactEvent> + '_ {
        self.history.iter()
    }

    pub fn last_event(&self) -> Option<&ContactEvent> {
        self.history.back()
    }

    /// True when the last recorded event happened at `time`.
    pub fn is_active_at(&self, time: f64) -> bool {
        self.last_event().is_some_and(|e| e.time == time)
    }

    fn record(&mut self, event: ContactEvent) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(event);
    }
}

/// At most one [`Contact`] per unordered entity pair.
#[derive(Default)]
pub struct ContactRegistry {
    contacts: Arena<Contact, ContactId>,
}

impl ContactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing record for the pair, or creates one.
    pub fn add_contact(&mut self, a: EntityId, b: EntityId, history_length: usize) -> ContactId {
        if let Some(id) = self.find(a, b) {
            return id;
        }
        self.contacts.insert(Contact::new(a, b, history_length))
    }

    pub fn find(&self, a: EntityId, b: EntityId) -> Option<ContactId> {
        self.contacts
            .iter()
            .find(|(_, c)| c.involves(a, b))
            .map(|(id, _)| id)
    }

    pub fn check_contact(&self, a: EntityId, b: EntityId) -> bool {
        self.find(a, b).is_some()
    }

    pub fn contact(&self, a: EntityId, b: EntityId) -> Option<&Contact> {
        self.find(a, b).and_then(|id| self.contacts.get(id))
    }

    pub fn get(&self, id: ContactId) -> Option<&Contact> {
        self.contacts.get(id)
    }

    pub fn nth(&self, index: usize) -> Option<&Contact> {
        self.contacts.nth(index).map(|(_, c)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContactId, &Contact)> + '_ {
        self.contacts.iter()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn clear(&mut self) {
        self.contacts.clear();
    }

    /// Appends an event for a manifold between entities `a` (collider A) and `b`.
    pub fn record_manifold(&mut self, a: EntityId, b: EntityId, manifold: &ContactManifold, time: f64) {
        if manifold.points.is_empty() {
            return;
        }
        let Some(id) = self.find(a, b) else {
            return;
        };
        let Some(contact) = self.contacts.get_mut(id) else {
            return;
        };
        let count = manifold.points.len() as f32;
        let point = manifold
            .points
            .iter()
            .map(|p| p.contact.world_on_a)
            .sum::<Vec3>()
            / count;
        let normal = manifold.points[0].contact.normal;
        let impulse = manifold.points.iter().map(|p| p.normal_impulse).sum();
        contact.record(ContactEvent {
            time,
            point,
            normal: if contact.a == a { normal } else { -normal },
            impulse,
        });
    }
}

/// Entity pairs singled out by inclusive or exclusive filtering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollisionFilter {
    pub mode: CollisionFilterMode,
    pairs: HashSet<(EntityId, EntityId)>,
}

impl CollisionFilter {
    pub fn new(mode: CollisionFilterMode) -> Self {
        Self {
            mode,
            pairs: HashSet::new(),
        }
    }

    fn key(a: EntityId, b: EntityId) -> (EntityId, EntityId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Marks a pair: enabled under inclusive filtering, disabled under exclusive.
    pub fn insert_pair(&mut self, a: EntityId, b: EntityId) {
        self.pairs.insert(Self::key(a, b));
    }

    pub fn remove_pair(&mut self, a: EntityId, b: EntityId) -> bool {
        self.pairs.remove(&Self::key(a, b))
    }

    pub fn contains_pair(&self, a: EntityId, b: EntityId) -> bool {
        self.pairs.contains(&Self::key(a, b))
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    /// Whether colliders of `a` and `b` should reach the narrow phase.
    pub fn allows(&self, a: Option<EntityId>, b: Option<EntityId>, has_contact: bool) -> bool {
        let (Some(a), Some(b)) = (a, b) else {
            return self.mode != CollisionFilterMode::Inclusive;
        };
        if a == b {
            return false;
        }
        match self.mode {
            CollisionFilterMode::Standard => true,
            CollisionFilterMode::Inclusive => has_contact || self.contains_pair(a, b),
            CollisionFilterMode::Exclusive => !self.contains_pair(a, b),
        }
    }
}
