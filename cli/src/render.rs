use std::fmt;

use cache_sim::{
    cache::Outcome,
    memory::{Addr, AddressSpace},
    sim::{AccessResult, Simulator},
};

const MEMORY_COLUMNS: usize = 8;

/// Accesses seen since the last reset, oldest first.
#[derive(Default)]
pub struct AccessLog {
    entries: Vec<AccessResult>,
}

impl AccessLog {
    pub fn push(&mut self, r: AccessResult) {
        self.entries.push(r)
    }
    pub fn clear(&mut self) {
        self.entries.clear()
    }
    pub fn last(&self) -> Option<&AccessResult> {
        self.entries.last()
    }
    /// outcome of the most recent access that landed on `line`
    pub fn last_outcome_of(&self, line: usize) -> Option<Outcome> {
        self.entries
            .iter()
            .rev()
            .find(|r| r.line == line)
            .map(|r| r.outcome)
    }
}

/// newest entry first
impl fmt::Display for AccessLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return write!(f, "Simulation not started. Type `step` to begin.");
        }
        for (i, r) in self.entries.iter().rev().enumerate() {
            if i != 0 {
                writeln!(f)?;
            }
            write!(f, "{r}")?;
        }
        Ok(())
    }
}

pub struct CacheGrid<'a> {
    sim: &'a Simulator,
    log: &'a AccessLog,
}

impl<'a> CacheGrid<'a> {
    pub fn new(sim: &'a Simulator, log: &'a AccessLog) -> Self {
        Self { sim, log }
    }
}

impl fmt::Display for CacheGrid<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.sim.last_result().map(|r| r.line);
        for (i, line) in self.sim.lines().iter().enumerate() {
            if i != 0 {
                writeln!(f)?;
            }
            let marker = if current == Some(i) { "->" } else { "  " };
            match line.tag() {
                Some(addr) => {
                    write!(f, "{marker} Block {i}: Address {addr}")?;
                    if let Some(outcome) = self.log.last_outcome_of(i) {
                        write!(f, " ({outcome})")?;
                    }
                }
                None => write!(f, "{marker} Block {i}: Empty")?,
            }
        }
        Ok(())
    }
}

pub struct MemoryGrid {
    space: AddressSpace,
    highlight: Option<Addr>,
}

impl MemoryGrid {
    pub fn new(space: AddressSpace, highlight: Option<Addr>) -> Self {
        Self { space, highlight }
    }
}

impl fmt::Display for MemoryGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = format!("Address {}", self.space.size().saturating_sub(1)).len() + 2;
        for (i, addr) in self.space.iter().enumerate() {
            if i != 0 {
                if i % MEMORY_COLUMNS == 0 {
                    writeln!(f)?;
                } else {
                    write!(f, " ")?;
                }
            }
            let cell = if self.highlight == Some(addr) {
                format!("[Address {addr}]")
            } else {
                format!(" Address {addr} ")
            };
            write!(f, "{cell:<width$}")?;
        }
        if let Some(addr) = self.highlight.filter(|a| !self.space.contains(*a)) {
            if self.space.size() > 0 {
                writeln!(f)?;
            }
            write!(f, "(address {addr} is outside the {}-word memory)", self.space.size())?;
        }
        Ok(())
    }
}

pub fn hit_rate(sim: &Simulator) -> String {
    if sim.accesses() == 0 {
        "0%".to_string()
    } else {
        format!("{:.1}%", sim.hit_rate())
    }
}

pub fn summary(sim: &Simulator) -> String {
    format!(
        "Hits: {}  Misses: {}  Hit Rate: {}",
        sim.hits(),
        sim.misses(),
        hit_rate(sim)
    )
}

pub fn completion_notice(sim: &Simulator) -> String {
    format!(
        "Simulation complete! All {} memory accesses have been processed.",
        sim.trace().len()
    )
}

#[cfg(test)]
mod tests {
    use cache_sim::trace::AccessTrace;

    use super::*;

    fn run(sim: &mut Simulator, log: &mut AccessLog, n: usize) {
        for _ in 0..n {
            if let Some(r) = sim.step().access() {
                log.push(*r);
            }
        }
    }

    #[test]
    fn test_cache_grid() {
        let mut sim = Simulator::new(AccessTrace::default(), 8).unwrap();
        let mut log = AccessLog::default();
        run(&mut sim, &mut log, 3);
        let grid = CacheGrid::new(&sim, &log).to_string();
        let lines: Vec<_> = grid.lines().collect();
        assert_eq!(8, lines.len());
        assert_eq!("   Block 0: Empty", lines[0]);
        assert_eq!("   Block 2: Address 10 (MISS)", lines[2]);
        assert_eq!("-> Block 5: Address 5 (HIT)", lines[5]);
    }
    #[test]
    fn test_access_log_newest_first() {
        let mut sim = Simulator::new(AccessTrace::default(), 8).unwrap();
        let mut log = AccessLog::default();
        assert!(log.to_string().starts_with("Simulation not started"));
        run(&mut sim, &mut log, 2);
        assert_eq!(
            "Step 2: Access Address 10 -> MISS (Block 2)\nStep 1: Access Address 5 -> MISS (Block 5)",
            log.to_string()
        );
        assert_eq!(Some(Outcome::Miss), log.last_outcome_of(5));
        assert_eq!(None, log.last_outcome_of(0));
    }
    #[test]
    fn test_memory_grid() {
        let grid = MemoryGrid::new(AddressSpace::new(10), Some(Addr::new(9))).to_string();
        let rows: Vec<_> = grid.lines().collect();
        assert_eq!(2, rows.len());
        assert!(rows[0].starts_with(" Address 0 "));
        assert_eq!("[Address 9]", rows[1].split_at(rows[1].len() - 11).1);
        let grid = MemoryGrid::new(AddressSpace::new(4), Some(Addr::new(40))).to_string();
        assert!(grid.ends_with("(address 40 is outside the 4-word memory)"));
    }
    #[test]
    fn test_hit_rate_text() {
        let mut sim = Simulator::new(AccessTrace::default(), 8).unwrap();
        assert_eq!("0%", hit_rate(&sim));
        sim.run_to_completion(|_| ());
        assert_eq!("46.7%", hit_rate(&sim));
        assert_eq!("Hits: 7  Misses: 8  Hit Rate: 46.7%", summary(&sim));
        assert_eq!(
            "Simulation complete! All 15 memory accesses have been processed.",
            completion_notice(&sim)
        );
    }
}
