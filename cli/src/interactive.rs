use std::{
    fmt,
    io::{stdin, stdout, Write},
    thread,
    time::Duration,
};

use anyhow::Result;
use bitmask_enum::bitmask;
use cache_sim::{
    memory::AddressSpace,
    sim::{Simulator, StepResult},
};

#[cfg(feature = "stat")]
use cache_sim::stat::AddStats;

#[cfg(feature = "stat")]
use terminal_size::terminal_size;

use crate::render::{self, AccessLog, CacheGrid, MemoryGrid};

peg::parser!(grammar command() for str {
    rule usize() -> usize
        = n:$(quiet!{['0'..='9']+}) {? n.parse().or(Err("usize")) }
        / expected!("usize")
    rule radix() -> usize
        = quiet!{"0" ['x' | 'X']} n:$(quiet!{['0'..='9'|'a'..='f'|'A'..='F']+}) {? usize::from_str_radix(n, 16).or(Err("hex")) }
    rule watch_kind() -> Watch
        = ("cache" / "lines") { Watch::Cache }
        / ("memory" / "mem") { Watch::Memory }
        / "stat" "s"? { Watch::Stat }
        / "all" { Watch::all() }
        / expected!("one of `cache`, `memory`, `stat`, `all`")
    rule dyn_command() -> ExecuteMode
        = "run" { ExecuteMode::Run }
        / ("step" / "next") step:(__ s:(radix() / usize()) { s })? { ExecuteMode::RunStep(step.unwrap_or(1)) }
    rule static_command() -> StaticCommand
        = "reset" { StaticCommand::Reset }
        / "delay" __ ms:usize() { StaticCommand::Delay(ms as u64) }
        / "watch" __ w:watch_kind() { StaticCommand::Watch(Operation::Add, w) }
        / "unwatch" __ w:watch_kind() { StaticCommand::Watch(Operation::Remove, w) }
        / "show" __ s:show_kind() { StaticCommand::Show(s) }
    rule show_kind() -> ShowKind
        = ("cache" / "lines") { ShowKind::Cache }
        / ("memory" / "mem") { ShowKind::Memory }
        / "log" { ShowKind::Log }
        / "state" { ShowKind::State }
        / "stat" "s"? { ShowKind::Stat }
        / "trace" { ShowKind::Trace }
        / "watch" "ing"? "s"? { ShowKind::Watchings }
    pub(crate) rule parse_command() -> Command
        = _ s:static_command() _ { Command::Static(s) }
        / _ ("exit" / "quit") _ { Command::Exit }
        / _ d:dyn_command()? _ { Command::Dynamic(d) }
        / expected!("command")

    rule ws() = quiet!{[' ' | '\t' | '\r' | '\n']}
        / expected!("whitespace")
    rule _() = ws()*
    rule __() = ws()+
});

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Command {
    /// `None` repeats the current mode
    Dynamic(Option<ExecuteMode>),
    Static(StaticCommand),
    Exit,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StaticCommand {
    Reset,
    Delay(u64),
    Show(ShowKind),
    Watch(Operation, Watch),
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Operation {
    Add,
    Remove,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ShowKind {
    Cache,
    Memory,
    Log,
    Stat,
    State,
    Trace,
    Watchings,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ExecuteMode {
    Run,
    RunStep(usize),
}

impl Default for ExecuteMode {
    fn default() -> Self {
        Self::RunStep(1)
    }
}

impl fmt::Display for ExecuteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecuteMode::Run => write!(f, "running to the end"),
            ExecuteMode::RunStep(n) => write!(f, "step execution by {n}"),
        }
    }
}

/// views redrawn after every access
#[bitmask(u8)]
pub(crate) enum Watch {
    Cache,
    Memory,
    Stat,
}

#[cfg(feature = "stat")]
fn get_terminal_width() -> Option<u16> {
    terminal_size().map(|(w, _)| w.0.saturating_sub(20))
}

struct Session<'a> {
    sim: &'a mut Simulator,
    space: AddressSpace,
    log: AccessLog,
    watching: Watch,
    delay: Duration,
}

impl Session<'_> {
    fn show(&self, kind: ShowKind) {
        match kind {
            ShowKind::Cache => println!("{}", CacheGrid::new(self.sim, &self.log)),
            ShowKind::Memory => {
                let highlight = self.log.last().map(|r| r.address);
                println!("{}", MemoryGrid::new(self.space, highlight));
            }
            ShowKind::Log => println!("{}", self.log),
            ShowKind::Stat => self.show_stat(),
            ShowKind::State => {
                println!(
                    "{} at step {} of {}",
                    self.sim.state(),
                    self.sim.current_step(),
                    self.sim.trace().len()
                );
            }
            ShowKind::Trace => println!("{}", self.sim.trace()),
            ShowKind::Watchings => {
                if self.watching.is_none() {
                    println!("nothing to watch.");
                    return;
                }
                let mut names = Vec::new();
                if self.watching.contains(Watch::Cache) {
                    names.push("cache");
                }
                if self.watching.contains(Watch::Memory) {
                    names.push("memory");
                }
                if self.watching.contains(Watch::Stat) {
                    names.push("stat");
                }
                println!("watching: {}", names.join(", "));
            }
        }
    }

    #[cfg(feature = "stat")]
    fn show_stat(&self) {
        let mut stats = Default::default();
        self.sim.add_stats(&mut stats);
        let width = get_terminal_width().unwrap_or(60) as usize;
        println!("{}", stats.view(width));
        println!("{}", render::summary(self.sim));
    }

    #[cfg(not(feature = "stat"))]
    fn show_stat(&self) {
        println!("{}", render::summary(self.sim));
    }

    fn show_watchings(&self) {
        if self.watching.contains(Watch::Cache) {
            self.show(ShowKind::Cache);
        }
        if self.watching.contains(Watch::Memory) {
            self.show(ShowKind::Memory);
        }
        if self.watching.contains(Watch::Stat) {
            println!("{}", render::summary(self.sim));
        }
    }

    /// Returns `false` once the trace is exhausted.
    fn step(&mut self) -> bool {
        match self.sim.step() {
            StepResult::Access(r) => {
                println!("{r}");
                self.log.push(r);
                true
            }
            StepResult::Terminal => {
                println!("{}", render::completion_notice(self.sim));
                false
            }
        }
    }

    fn execute(&mut self, mode: &ExecuteMode) {
        match mode {
            ExecuteMode::RunStep(n) => {
                for _ in 0..*n {
                    if !self.step() {
                        return;
                    }
                }
                self.show_watchings();
            }
            ExecuteMode::Run => loop {
                if !self.step() {
                    break;
                }
                self.show_watchings();
                if !self.delay.is_zero() && !self.sim.is_complete() {
                    thread::sleep(self.delay);
                }
            },
        }
    }

    fn apply(&mut self, command: StaticCommand) {
        use Operation::*;
        match command {
            StaticCommand::Reset => {
                self.sim.reset();
                self.log.clear();
                self.show(ShowKind::Log);
            }
            StaticCommand::Delay(ms) => {
                self.delay = Duration::from_millis(ms);
                println!("delay between accesses: {ms} ms");
            }
            StaticCommand::Show(s) => self.show(s),
            StaticCommand::Watch(Add, w) => {
                self.watching |= w;
                self.show(ShowKind::Watchings);
            }
            StaticCommand::Watch(Remove, w) => {
                self.watching &= !w;
                self.show(ShowKind::Watchings);
            }
        }
    }
}

pub fn execute_interactive(
    sim: &mut Simulator,
    space: AddressSpace,
    delay: Duration,
) -> Result<()> {
    let mut session = Session {
        sim,
        space,
        log: AccessLog::default(),
        watching: Watch::Cache,
        delay,
    };
    let mut mode = ExecuteMode::default();
    println!("entering interactive.");
    session.show(ShowKind::Cache);
    loop {
        // prompt string
        match &mode {
            ExecuteMode::Run => print!("run "),
            ExecuteMode::RunStep(n) => print!("step {n} "),
        }
        print!("[{}/{}] > ", session.sim.current_step(), session.sim.trace().len());
        stdout().flush()?;
        let mut str = String::new();
        if stdin().read_line(&mut str)? == 0 {
            // EOF
            println!();
            break;
        }
        let parsed = match command::parse_command(&str) {
            Ok(p) => p,
            Err(e) => {
                println!("parse error: expected {}", e.expected);
                continue;
            }
        };
        match parsed {
            Command::Dynamic(d) => {
                if let Some(d) = d {
                    println!("mode: {d}");
                    mode = d;
                }
                session.execute(&mode);
            }
            Command::Static(s) => session.apply(s),
            Command::Exit => break,
        }
    }
    println!("exiting interactive.");
    Ok(())
}
