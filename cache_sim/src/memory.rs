use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub const MEMORY_SIZE: usize = 32usize;

/// word address into the backing memory
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Addr(usize);

impl Addr {
    pub const fn new(v: usize) -> Self {
        Self(v)
    }
    pub const fn inner(self) -> usize {
        self.0
    }
}

impl From<usize> for Addr {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

impl Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address space of the backing memory.
///
/// Only the front end consults this, to bound what it draws; the cache
/// itself never looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpace {
    size: usize,
}

impl AddressSpace {
    pub fn new(size: usize) -> Self {
        Self { size }
    }
    pub fn size(&self) -> usize {
        self.size
    }
    pub fn contains(&self, addr: Addr) -> bool {
        addr.inner() < self.size
    }
    pub fn iter(&self) -> impl Iterator<Item = Addr> {
        (0..self.size).map(Addr::new)
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new(MEMORY_SIZE)
    }
}
