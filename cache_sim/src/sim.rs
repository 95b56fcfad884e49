use std::fmt;

use serde::Serialize;

use crate::{
    cache::{Cache, CacheLine, Outcome},
    config::{ConfigurationError, SimConfig},
    memory::Addr,
    trace::AccessTrace,
};

#[cfg(feature = "stat")]
use crate::stat::{AddStats, Stats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    NotStarted,
    InProgress,
    Complete,
}

impl fmt::Display for SimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimState::NotStarted => write!(f, "not started"),
            SimState::InProgress => write!(f, "in progress"),
            SimState::Complete => write!(f, "complete"),
        }
    }
}

/// What a single step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessResult {
    /// 1-based ordinal of the access within the trace
    pub step: usize,
    pub address: Addr,
    pub line: usize,
    pub outcome: Outcome,
}

impl fmt::Display for AccessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            step,
            address,
            line,
            outcome,
        } = self;
        write!(
            f,
            "Step {step}: Access Address {address} -> {outcome} (Block {line})"
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Access(AccessResult),
    /// the trace is exhausted; nothing changed
    Terminal,
}

impl StepResult {
    pub fn access(&self) -> Option<&AccessResult> {
        match self {
            StepResult::Access(r) => Some(r),
            StepResult::Terminal => None,
        }
    }
    /// Returns `true` if the step result is [`Terminal`].
    ///
    /// [`Terminal`]: StepResult::Terminal
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }
}

/// Direct-mapped cache simulator replaying a fixed trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Simulator {
    trace: AccessTrace,
    cache: Cache,
    cursor: usize,
    hits: usize,
    misses: usize,
    last_result: Option<AccessResult>,
}

impl Simulator {
    pub fn new(trace: AccessTrace, cache_size: usize) -> Result<Self, ConfigurationError> {
        if cache_size < 1 {
            return Err(ConfigurationError::ZeroCacheSize);
        }
        log::info!(
            "simulating {} accesses over a {cache_size}-line direct-mapped cache.",
            trace.len()
        );
        Ok(Self {
            trace,
            cache: Cache::new(cache_size),
            cursor: 0,
            hits: 0,
            misses: 0,
            last_result: None,
        })
    }

    pub fn from_config(config: &SimConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Self::new(config.trace.clone(), config.cache_size)
    }

    /// Replays the next access of the trace.
    ///
    /// Once the trace is exhausted this keeps returning [`StepResult::Terminal`]
    /// and leaves the state untouched.
    pub fn step(&mut self) -> StepResult {
        let Some(address) = self.trace.get(self.cursor) else {
            return StepResult::Terminal;
        };
        let (line, outcome) = self.cache.access_cache(address);
        match outcome {
            Outcome::Hit => self.hits += 1,
            Outcome::Miss => self.misses += 1,
        }
        self.cursor += 1;
        let r = AccessResult {
            step: self.cursor,
            address,
            line,
            outcome,
        };
        log::debug!("{r}");
        if self.cursor == self.trace.len() {
            log::info!(
                "all {} accesses processed. hits: {}, misses: {}",
                self.cursor,
                self.hits,
                self.misses
            );
        }
        self.last_result = Some(r);
        StepResult::Access(r)
    }

    pub fn reset(&mut self) {
        self.cache.clear();
        self.cursor = 0;
        self.hits = 0;
        self.misses = 0;
        self.last_result = None;
        log::info!("simulation reset.");
    }

    /// Steps until the trace is exhausted, handing every access to `on_step`.
    /// Returns the number of accesses performed.
    pub fn run_to_completion(&mut self, mut on_step: impl FnMut(&AccessResult)) -> usize {
        let mut count = 0;
        while let StepResult::Access(r) = self.step() {
            on_step(&r);
            count += 1;
        }
        count
    }

    pub fn state(&self) -> SimState {
        if self.cursor >= self.trace.len() {
            SimState::Complete
        } else if self.cursor == 0 {
            SimState::NotStarted
        } else {
            SimState::InProgress
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state() == SimState::Complete
    }

    /// hit rate in percent; 0 before any access.
    pub fn hit_rate(&self) -> f64 {
        percentage(self.hits, self.accesses())
    }

    pub fn miss_rate(&self) -> f64 {
        percentage(self.misses, self.accesses())
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn accesses(&self) -> usize {
        self.hits + self.misses
    }

    pub fn current_step(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.trace.len() - self.cursor
    }

    pub fn lines(&self) -> &[CacheLine] {
        self.cache.lines()
    }

    pub fn line(&self, index: usize) -> Option<&CacheLine> {
        self.cache.line(index)
    }

    pub fn cache_size(&self) -> usize {
        self.cache.num_lines()
    }

    pub fn trace(&self) -> &AccessTrace {
        &self.trace
    }

    pub fn last_result(&self) -> Option<&AccessResult> {
        self.last_result.as_ref()
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.
    } else {
        100. * part as f64 / total as f64
    }
}

impl Simulator {
    #[cfg(feature = "stat")]
    pub fn collect_stat(&self) -> Stats {
        let mut ss = Stats::default();
        self.add_stats(&mut ss);
        ss
    }
}

#[cfg(feature = "stat")]
impl AddStats for Simulator {
    fn add_stats(&self, buf: &mut Stats) {
        buf.push(Box::new(stat::CacheStat::new(self)));
        buf.push(Box::new(stat::LineStat::new(self)));
    }
}

#[cfg(feature = "stat")]
mod stat {
    use crate::stat::*;

    use super::*;

    #[derive(Clone, Copy)]
    pub struct CacheStat {
        hit_count: usize,
        miss_count: usize,
        remaining: usize,
    }

    impl CacheStat {
        pub fn new(sim: &Simulator) -> Self {
            Self {
                hit_count: sim.hits(),
                miss_count: sim.misses(),
                remaining: sim.remaining(),
            }
        }
    }

    impl Stat for CacheStat {
        fn view(&self, _: usize) -> Box<dyn StatView + '_> {
            Box::new(self)
        }
    }

    impl StatView for &'_ CacheStat {
        fn header(&self) -> &'static str {
            "cache stat"
        }
        fn width(&self) -> usize {
            33
        }
    }

    impl fmt::Display for &'_ CacheStat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let hit = self.hit_count;
            let miss = self.miss_count;
            let total = hit + miss;
            let hit_pct = format!("{:.1}", percentage(hit, total));
            let miss_pct = format!("{:.1}", percentage(miss, total));
            let remaining = self.remaining;
            writeln!(f, "       hit: {hit:>10} ({hit_pct:>5}%)")?;
            writeln!(f, "      miss: {miss:>10} ({miss_pct:>5}%)")?;
            write!(f, "  pending: {remaining:>11}")
        }
    }

    /// resident tag of every line
    pub struct LineStat {
        tags: Vec<Option<Addr>>,
    }

    impl LineStat {
        pub fn new(sim: &Simulator) -> Self {
            Self {
                tags: sim.lines().iter().map(CacheLine::tag).collect(),
            }
        }
    }

    impl Stat for LineStat {
        fn view(&self, max_width: usize) -> Box<dyn StatView + '_> {
            Box::new(LineStatView::new(self, max_width))
        }
    }

    pub struct LineStatView<'a> {
        stat: &'a LineStat,
        chunk_size: usize,
    }

    impl<'a> LineStatView<'a> {
        pub fn new(stat: &'a LineStat, max_width: usize) -> Self {
            Self {
                stat,
                chunk_size: Self::chunk_size(max_width),
            }
        }
    }

    const CELL_WIDTH: usize = 16;

    impl Width for LineStatView<'_> {
        fn width_by_chunk_size(chunk_size: usize) -> usize {
            CELL_WIDTH * chunk_size
        }
    }

    impl StatView for LineStatView<'_> {
        fn header(&self) -> &'static str {
            "cache lines"
        }
        fn width(&self) -> usize {
            Self::width_by_chunk_size(self.chunk_size.min(self.stat.tags.len()))
        }
    }

    impl fmt::Display for LineStatView<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            for (row, chunk) in self.stat.tags.chunks(self.chunk_size).enumerate() {
                if row != 0 {
                    writeln!(f)?;
                }
                for (col, tag) in chunk.iter().enumerate() {
                    let index = row * self.chunk_size + col;
                    let tag = match tag {
                        Some(a) => a.to_string(),
                        None => "-".to_string(),
                    };
                    let cell = format!("[{index}] {tag}");
                    write!(f, "  {cell:<w$}", w = CELL_WIDTH - 2)?;
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_sim() -> Simulator {
        Simulator::new(AccessTrace::default(), 8).unwrap()
    }

    fn assert_invariants(sim: &Simulator) {
        assert_eq!(sim.current_step(), sim.hits() + sim.misses());
        for (i, l) in sim.lines().iter().enumerate() {
            if let Some(tag) = l.tag() {
                assert_eq!(i, tag.inner() % sim.cache_size());
            }
        }
    }

    fn expect_access(sim: &mut Simulator) -> AccessResult {
        *sim.step().access().unwrap()
    }

    #[test]
    fn test_zero_cache_size() {
        assert_eq!(
            Err(ConfigurationError::ZeroCacheSize),
            Simulator::new(AccessTrace::default(), 0)
        );
    }
    #[test]
    fn test_scenario() {
        let mut sim = default_sim();
        assert_eq!(SimState::NotStarted, sim.state());
        let r = expect_access(&mut sim);
        assert_eq!(
            AccessResult {
                step: 1,
                address: Addr::new(5),
                line: 5,
                outcome: Outcome::Miss
            },
            r
        );
        assert_eq!((0, 1), (sim.hits(), sim.misses()));
        assert_eq!(SimState::InProgress, sim.state());

        let r = expect_access(&mut sim);
        assert_eq!((2, Outcome::Miss), (r.line, r.outcome));
        let r = expect_access(&mut sim);
        assert_eq!((5, Outcome::Hit), (r.line, r.outcome));
        assert_eq!((1, 2), (sim.hits(), sim.misses()));
        let r = expect_access(&mut sim);
        assert_eq!((7, Outcome::Miss), (r.line, r.outcome));
        assert_eq!((1, 3), (sim.hits(), sim.misses()));

        for _ in 0..4 {
            expect_access(&mut sim);
            assert_invariants(&sim);
        }
        assert!(sim.line(6).unwrap().is_empty());
        let r = expect_access(&mut sim);
        assert_eq!(
            AccessResult {
                step: 9,
                address: Addr::new(30),
                line: 6,
                outcome: Outcome::Miss
            },
            r
        );
        assert_eq!((3, 6), (sim.hits(), sim.misses()));

        while !sim.step().is_terminal() {
            assert_invariants(&sim);
        }
        assert_eq!(SimState::Complete, sim.state());
        // every distinct address owns its line, so only first touches miss
        assert_eq!((7, 8), (sim.hits(), sim.misses()));
        assert_eq!("46.7", format!("{:.1}", sim.hit_rate()));
        assert_eq!("53.3", format!("{:.1}", sim.miss_rate()));
    }
    #[test]
    fn test_conflicting_lines() {
        let mut sim = Simulator::new(AccessTrace::default(), 4).unwrap();
        let mut outcomes = String::new();
        sim.run_to_completion(|r| outcomes.push(if r.outcome.is_hit() { 'H' } else { 'M' }));
        assert_eq!("MMHMMHMHMMHMHMM", outcomes);
        assert_eq!((5, 10), (sim.hits(), sim.misses()));
        assert_eq!("33.3", format!("{:.1}", sim.hit_rate()));
        let tags: Vec<_> = sim.lines().iter().map(|l| l.tag().map(Addr::inner)).collect();
        assert_eq!(vec![Some(40), Some(5), Some(10), Some(35)], tags);
    }
    #[test]
    fn test_terminal_is_idempotent() {
        let mut sim = default_sim();
        assert_eq!(15, sim.run_to_completion(|_| ()));
        let snapshot = sim.clone();
        for _ in 0..3 {
            assert_eq!(StepResult::Terminal, sim.step());
            assert_eq!(snapshot, sim);
        }
        assert_eq!(0, sim.run_to_completion(|_| panic!("no access expected")));
    }
    #[test]
    fn test_run_to_completion_order() {
        let mut stepped = default_sim();
        let mut expected = Vec::new();
        while let StepResult::Access(r) = stepped.step() {
            expected.push(r);
        }
        let mut sim = default_sim();
        let mut seen = Vec::new();
        sim.run_to_completion(|r| seen.push(*r));
        assert_eq!(expected, seen);
        assert_eq!(
            (1..=15).collect::<Vec<_>>(),
            seen.iter().map(|r| r.step).collect::<Vec<_>>()
        );
        assert_eq!(stepped, sim);
        assert_eq!(seen.last(), sim.last_result());
    }
    #[test]
    fn test_reset() {
        let fresh = default_sim();
        let mut sim = default_sim();
        for _ in 0..6 {
            sim.step();
        }
        sim.reset();
        assert_eq!(fresh, sim);
        assert_eq!(SimState::NotStarted, sim.state());

        let mut first = Vec::new();
        sim.run_to_completion(|r| first.push(*r));
        sim.reset();
        let mut second = Vec::new();
        sim.run_to_completion(|r| second.push(*r));
        assert_eq!(first, second);
        assert_eq!((7, 8), (sim.hits(), sim.misses()));
    }
    #[test]
    fn test_empty_trace() {
        let mut sim = Simulator::new(AccessTrace::new(Vec::new()), 8).unwrap();
        assert_eq!(SimState::Complete, sim.state());
        assert_eq!(0., sim.hit_rate());
        assert_eq!(StepResult::Terminal, sim.step());
        assert_eq!((0, 0), (sim.hits(), sim.misses()));
    }
    #[test]
    fn test_single_line_cache() {
        let trace: AccessTrace = [3usize, 3, 4, 3, 3, 3, 0].into_iter().collect();
        let mut sim = Simulator::new(trace, 1).unwrap();
        let mut outcomes = Vec::new();
        sim.run_to_completion(|r| {
            assert_eq!(0, r.line);
            outcomes.push(r.outcome.is_hit());
        });
        assert_eq!(vec![false, true, false, false, true, true, false], outcomes);
        assert_eq!(Some(Addr::new(0)), sim.line(0).unwrap().tag());
    }
    #[test]
    fn test_independent_simulators() {
        let mut a = default_sim();
        let b = default_sim();
        a.step();
        assert_eq!(1, a.current_step());
        assert_eq!(0, b.current_step());
    }
    #[test]
    fn test_from_config() {
        let config = SimConfig {
            cache_size: 0,
            ..Default::default()
        };
        assert_eq!(
            Err(ConfigurationError::ZeroCacheSize),
            Simulator::from_config(&config)
        );
        let sim = Simulator::from_config(&SimConfig::default()).unwrap();
        assert_eq!(default_sim(), sim);
    }
    #[test]
    fn test_access_result_display() {
        let mut sim = default_sim();
        let r = expect_access(&mut sim);
        assert_eq!("Step 1: Access Address 5 -> MISS (Block 5)", r.to_string());
        assert_eq!(
            r#"{"step":1,"address":5,"line":5,"outcome":"miss"}"#,
            serde_json::to_string(&r).unwrap()
        );
    }
    #[cfg(feature = "stat")]
    #[test]
    fn test_collect_stat() {
        let mut sim = Simulator::new([1usize, 1, 2].into_iter().collect(), 4).unwrap();
        sim.run_to_completion(|_| ());
        let stats = sim.collect_stat();
        assert_eq!(2, stats.len());
        let s = stats.view(80).to_string();
        assert!(s.contains("       hit:          1 ( 33.3%)"), "{s}");
        assert!(s.contains("[1] 1"), "{s}");
        assert!(s.contains("[3] -"), "{s}");
    }
}
