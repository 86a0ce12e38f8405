//! Handle types for arena-owned IR entities.
//!
//! Blocks, statements, terms, registers and callees are all `u32`
//! newtypes pointing into an owning `EntityVec`. Analyses store handles,
//! never references, so results like the live set have no lifetime ties
//! to the function they describe.

use std::hash::Hash;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

pub trait EntityRef: Clone + Copy + PartialEq + Eq + PartialOrd + Ord + Hash {
    fn new(value: usize) -> Self;
    fn index(self) -> usize;
    /// The reserved sentinel handle; never points into any arena.
    fn invalid() -> Self;
    fn is_valid(self) -> bool {
        self != Self::invalid()
    }
    fn is_invalid(self) -> bool {
        self == Self::invalid()
    }
}

/// Declares a handle type with a display prefix, e.g.
/// `declare_entity!(Block, "block")` prints as `block0`, `block1`, ...
#[macro_export]
macro_rules! declare_entity {
    ($name:tt, $prefix:tt) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $crate::entity::EntityRef for $name {
            fn new(value: usize) -> Self {
                use std::convert::TryFrom;
                let raw = u32::try_from(value).unwrap();
                debug_assert!(raw != u32::MAX);
                $name(raw)
            }
            fn index(self) -> usize {
                self.0 as usize
            }
            fn invalid() -> Self {
                $name(u32::MAX)
            }
        }

        impl std::convert::From<u32> for $name {
            fn from(raw: u32) -> Self {
                <$name as $crate::entity::EntityRef>::new(raw as usize)
            }
        }

        impl std::default::Default for $name {
            fn default() -> Self {
                <$name as $crate::entity::EntityRef>::invalid()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::Display::fmt(self, f)
            }
        }
    };
}

/// Owning arena: entities are appended once and addressed densely by
/// their handles thereafter.
#[derive(Clone, Debug)]
pub struct EntityVec<Idx: EntityRef, T> {
    items: Vec<T>,
    _idx: PhantomData<Idx>,
}

impl<Idx: EntityRef, T> Default for EntityVec<Idx, T> {
    fn default() -> Self {
        EntityVec {
            items: vec![],
            _idx: PhantomData,
        }
    }
}

impl<Idx: EntityRef, T> EntityVec<Idx, T> {
    pub fn push(&mut self, t: T) -> Idx {
        let idx = Idx::new(self.items.len());
        self.items.push(t);
        idx
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn contains(&self, idx: Idx) -> bool {
        idx.index() < self.items.len()
    }

    /// All handles, in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = Idx> {
        (0..self.items.len()).map(Idx::new)
    }

    pub fn entries(&self) -> impl Iterator<Item = (Idx, &T)> {
        self.items.iter().enumerate().map(|(i, t)| (Idx::new(i), t))
    }
}

impl<Idx: EntityRef, T> Index<Idx> for EntityVec<Idx, T> {
    type Output = T;
    fn index(&self, idx: Idx) -> &T {
        &self.items[idx.index()]
    }
}

impl<Idx: EntityRef, T> IndexMut<Idx> for EntityVec<Idx, T> {
    fn index_mut(&mut self, idx: Idx) -> &mut T {
        &mut self.items[idx.index()]
    }
}

/// Side-table keyed by a handle. Grows on write; reading an entry that
/// was never written yields the default value, so consumers need not
/// care how much of the table is materialized.
#[derive(Clone, Debug, Default)]
pub struct PerEntity<Idx: EntityRef, T: Clone + Default> {
    table: Vec<T>,
    default: T,
    _idx: PhantomData<Idx>,
}

impl<Idx: EntityRef, T: Clone + Default> Index<Idx> for PerEntity<Idx, T> {
    type Output = T;
    fn index(&self, idx: Idx) -> &T {
        debug_assert!(idx.is_valid());
        self.table.get(idx.index()).unwrap_or(&self.default)
    }
}

impl<Idx: EntityRef, T: Clone + Default> IndexMut<Idx> for PerEntity<Idx, T> {
    fn index_mut(&mut self, idx: Idx) -> &mut T {
        debug_assert!(idx.is_valid());
        if idx.index() >= self.table.len() {
            self.table.resize(idx.index() + 1, T::default());
        }
        &mut self.table[idx.index()]
    }
}
