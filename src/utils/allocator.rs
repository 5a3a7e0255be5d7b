use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Slot index with generation tracking to prevent stale references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct GenerationalId {
    pub index: usize,
    pub generation: u32,
}

impl GenerationalId {
    pub fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Typed handle handed out by an [`Arena`].
pub trait ArenaId: Copy + Eq {
    fn from_raw(raw: GenerationalId) -> Self;
    fn raw(&self) -> GenerationalId;

    fn index(&self) -> usize {
        self.raw().index
    }

    fn generation(&self) -> u32 {
        self.raw().generation
    }
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
        pub struct $name(pub GenerationalId);

        impl ArenaId for $name {
            fn from_raw(raw: GenerationalId) -> Self {
                Self(raw)
            }

            fn raw(&self) -> GenerationalId {
                self.0
            }
        }

        impl $name {
            pub fn new(index: usize, generation: u32) -> Self {
                Self(GenerationalId::new(index, generation))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}v{}", $label, self.0.index, self.0.generation)
            }
        }
    };
}

define_id!(
    /// Handle of an entity owned by the simulation manager.
    EntityId,
    "entity"
);
define_id!(
    /// Handle of a rigid body inside the dynamics world.
    BodyHandle,
    "body"
);
define_id!(
    /// Handle of a reduced-coordinate multibody inside the dynamics world.
    MultibodyHandle,
    "multibody"
);
define_id!(
    /// Handle of a collider inside the dynamics world.
    ColliderHandle,
    "collider"
);
define_id!(
    /// Handle of a maximal-coordinate constraint inside the dynamics world.
    ConstraintHandle,
    "constraint"
);
define_id!(JointId, "joint");
define_id!(SensorId, "sensor");
define_id!(ActuatorId, "actuator");
define_id!(ControllerId, "controller");
define_id!(ContactId, "contact");

/// Generational arena that hands out stable IDs while preventing use-after-free.
pub struct Arena<T, I: ArenaId> {
    items: Vec<Option<T>>,
    generations: Vec<u32>,
    free_list: VecDeque<usize>,
    _id: std::marker::PhantomData<I>,
}

impl<T, I: ArenaId> Default for Arena<T, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, I: ArenaId> Arena<T, I> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            generations: Vec::new(),
            free_list: VecDeque::new(),
            _id: std::marker::PhantomData,
        }
    }

    pub fn insert(&mut self, item: T) -> I {
        if let Some(index) = self.free_list.pop_front() {
            let generation = self.generations[index];
            self.items[index] = Some(item);
            return I::from_raw(GenerationalId::new(index, generation));
        }

        let index = self.items.len();
        self.items.push(Some(item));
        self.generations.push(0);
        I::from_raw(GenerationalId::new(index, 0))
    }

    /// Reserves the handle the next `insert` will return.
    pub fn next_id(&self) -> I {
        match self.free_list.front() {
            Some(&index) => I::from_raw(GenerationalId::new(index, self.generations[index])),
            None => I::from_raw(GenerationalId::new(self.items.len(), 0)),
        }
    }

    pub fn get(&self, id: I) -> Option<&T> {
        if self.is_valid(id) {
            self.items.get(id.index()).and_then(|slot| slot.as_ref())
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        if self.is_valid(id) {
            self.items.get_mut(id.index()).and_then(|slot| slot.as_mut())
        } else {
            None
        }
    }

    pub fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: I) -> Option<T> {
        if !self.is_valid(id) {
            return None;
        }
        let slot = self.items.get_mut(id.index())?;
        if slot.is_some() {
            self.generations[id.index()] = self.generations[id.index()].wrapping_add(1);
            self.free_list.push_back(id.index());
        }
        slot.take()
    }

    /// Drops every item in reverse insertion order and forgets all handles.
    pub fn clear(&mut self) {
        while let Some(slot) = self.items.pop() {
            drop(slot);
        }
        self.generations.clear();
        self.free_list.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> + '_ {
        self.items.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref()
                .map(|item| (I::from_raw(GenerationalId::new(index, self.generations[index])), item))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (I, &mut T)> + '_ {
        let generations = &self.generations;
        self.items.iter_mut().enumerate().filter_map(move |(index, slot)| {
            slot.as_mut()
                .map(|item| (I::from_raw(GenerationalId::new(index, generations[index])), item))
        })
    }

    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.items.iter().filter_map(|slot| slot.as_ref())
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.items.iter_mut().filter_map(|slot| slot.as_mut())
    }

    pub fn ids(&self) -> impl Iterator<Item = I> + '_ {
        self.items.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref()
                .map(|_| I::from_raw(GenerationalId::new(index, self.generations[index])))
        })
    }

    /// Returns the `n`-th live item in insertion-slot order.
    pub fn nth(&self, n: usize) -> Option<(I, &T)> {
        self.iter().nth(n)
    }

    pub fn len(&self) -> usize {
        self.items.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_valid(&self, id: I) -> bool {
        self.generations
            .get(id.index())
            .copied()
            .map(|gen| gen == id.generation())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_handles_become_stale() {
        let mut arena: Arena<&str, EntityId> = Arena::new();
        let a = arena.insert("a");
        assert_eq!(arena.remove(a), Some("a"));

        let b = arena.insert("b");
        assert_eq!(a.index(), b.index());
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b), Some(&"b"));
    }

    #[test]
    fn next_id_predicts_insert() {
        let mut arena: Arena<u32, BodyHandle> = Arena::new();
        let first = arena.insert(1);
        arena.remove(first);
        let predicted = arena.next_id();
        assert_eq!(arena.insert(2), predicted);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut arena: Arena<u32, SensorId> = Arena::new();
        let id = arena.insert(7);
        arena.clear();
        assert!(arena.is_empty());
        assert!(arena.get(id).is_none());
    }
}
