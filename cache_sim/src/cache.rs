use std::fmt;

use serde::Serialize;

use crate::memory::Addr;

pub const CACHE_NUM_LINES: usize = 8usize;

/// direct mapping: the only line `addr` may live in.
#[inline]
pub const fn line_index(addr: Addr, num_lines: usize) -> usize {
    addr.inner() % num_lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Hit,
    Miss,
}

impl Outcome {
    /// Returns `true` if the outcome is [`Hit`].
    ///
    /// [`Hit`]: Outcome::Hit
    #[must_use]
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Hit => write!(f, "HIT"),
            Outcome::Miss => write!(f, "MISS"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheLine {
    /// `None` while nothing has been loaded into the line
    tag: Option<Addr>,
}

impl CacheLine {
    pub fn tag(&self) -> Option<Addr> {
        self.tag
    }
    pub fn is_empty(&self) -> bool {
        self.tag.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cache {
    inner: Vec<CacheLine>,
}

impl Cache {
    /// `num_lines` must be non-zero; the simulator checks this before building one.
    pub(crate) fn new(num_lines: usize) -> Self {
        debug_assert!(num_lines > 0);
        Self {
            inner: vec![CacheLine::default(); num_lines],
        }
    }
    pub fn num_lines(&self) -> usize {
        self.inner.len()
    }
    pub fn lines(&self) -> &[CacheLine] {
        &self.inner
    }
    pub fn line(&self, index: usize) -> Option<&CacheLine> {
        self.inner.get(index)
    }
    /// looks `addr` up, loading it over whatever the line held on a miss.
    pub(crate) fn access_cache(&mut self, addr: Addr) -> (usize, Outcome) {
        let line = line_index(addr, self.num_lines());
        let slot = &mut self.inner[line];
        if slot.tag == Some(addr) {
            (line, Outcome::Hit)
        } else {
            slot.tag = Some(addr);
            (line, Outcome::Miss)
        }
    }
    pub(crate) fn clear(&mut self) {
        self.inner.fill(CacheLine::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index() {
        assert_eq!(5, line_index(Addr::new(5), 8));
        assert_eq!(2, line_index(Addr::new(10), 8));
        assert_eq!(0, line_index(Addr::new(40), 8));
        assert_eq!(0, line_index(Addr::new(123), 1));
    }
    #[test]
    fn test_access_overwrites_on_conflict() {
        let mut c = Cache::new(8);
        assert_eq!((5, Outcome::Miss), c.access_cache(Addr::new(5)));
        assert_eq!((5, Outcome::Hit), c.access_cache(Addr::new(5)));
        assert_eq!((5, Outcome::Miss), c.access_cache(Addr::new(13)));
        assert_eq!(Some(Addr::new(13)), c.line(5).unwrap().tag());
        assert_eq!((5, Outcome::Miss), c.access_cache(Addr::new(5)));
    }
    #[test]
    fn test_clear() {
        let mut c = Cache::new(4);
        c.access_cache(Addr::new(1));
        c.access_cache(Addr::new(2));
        c.clear();
        assert!(c.lines().iter().all(CacheLine::is_empty));
        assert_eq!(Cache::new(4), c);
    }
}
