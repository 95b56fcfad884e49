mod interactive;
mod render;

use std::{
    fs::File,
    io::{stdout, Read, Write},
    path::PathBuf,
    thread,
    time::Duration,
};

use anyhow::Result;
use cache_sim::{
    config::SimConfig,
    memory::Addr,
    sim::{AccessResult, Simulator},
    trace::AccessTrace,
};
use clap::{Args, Parser, Subcommand};
use render::{AccessLog, CacheGrid, MemoryGrid};

#[cfg(feature = "stat")]
use terminal_size::terminal_size;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// replay the whole trace at once
    Run(RunArgs),
    /// step through the trace by hand
    Interactive(InteractiveArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// File path to a JSON config (`cache_size`, `memory_size`, `trace`)
    #[arg(long)]
    config: Option<PathBuf>,
    /// File path to a trace (addresses separated by whitespace or commas)
    #[arg(short, long, conflicts_with = "addresses")]
    trace: Option<PathBuf>,
    /// Addresses to access, e.g. `5,10,5`
    #[arg(short, long, value_delimiter = ',')]
    addresses: Option<Vec<usize>>,
    /// Number of cache lines
    #[arg(short, long)]
    cache_size: Option<usize>,
    /// Number of addressable words shown in the memory view
    #[arg(short, long)]
    memory_size: Option<usize>,
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    delegate: CommonArgs,
    /// Milliseconds to wait between accesses
    #[arg(long, default_value_t = 0)]
    delay: u64,
    /// Print each access as a JSON line instead of a log line
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct InteractiveArgs {
    #[command(flatten)]
    delegate: CommonArgs,
    /// Milliseconds to wait between accesses of `run`
    #[arg(long, default_value_t = 800)]
    delay: u64,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    match args.command {
        Command::Run(RunArgs {
            delegate,
            delay,
            json,
        }) => {
            init_logger(delegate.verbose);
            let config = read_config(delegate)?;
            let mut sim = Simulator::from_config(&config)?;
            log::info!("trace: {}", sim.trace());
            let delay = Duration::from_millis(delay);
            let mut log = AccessLog::default();
            let mut out = stdout().lock();
            let mut failed = None;
            sim.run_to_completion(|r| {
                if failed.is_none() {
                    if let Err(e) = report(&mut out, r, json) {
                        failed = Some(e);
                    }
                }
                log.push(*r);
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
            });
            if let Some(e) = failed {
                return Err(e);
            }
            if !json {
                writeln!(out)?;
                writeln!(out, "{}", CacheGrid::new(&sim, &log))?;
                writeln!(out)?;
                let highlight = sim.last_result().map(|r| r.address);
                writeln!(out, "{}", MemoryGrid::new(config.address_space(), highlight))?;
                writeln!(out)?;
                writeln!(out, "{}", render::summary(&sim))?;
                writeln!(out, "{}", render::completion_notice(&sim))?;
            }
            output_stat(&sim);
            Ok(())
        }
        Command::Interactive(InteractiveArgs { delegate, delay }) => {
            init_logger(delegate.verbose);
            let config = read_config(delegate)?;
            let mut sim = Simulator::from_config(&config)?;
            interactive::execute_interactive(
                &mut sim,
                config.address_space(),
                Duration::from_millis(delay),
            )
        }
    }
}

fn init_logger(verbose: bool) {
    if verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::init();
    }
}

fn report(out: &mut impl Write, r: &AccessResult, json: bool) -> Result<()> {
    if json {
        serde_json::to_writer(&mut *out, r)?;
        writeln!(out)?;
    } else {
        writeln!(out, "{r}")?;
    }
    Ok(())
}

#[cfg(not(feature = "stat"))]
fn output_stat(_: &Simulator) {}

#[cfg(feature = "stat")]
fn output_stat(sim: &Simulator) {
    let max_width = get_terminal_width().unwrap_or(120) as usize;
    log::info!("statistics:\n{}", sim.collect_stat().view(max_width));
}

#[cfg(feature = "stat")]
fn get_terminal_width() -> Option<u16> {
    terminal_size().map(|(w, _)| w.0.saturating_sub(20))
}

/// layers the command line over the config file (or the built-in defaults).
fn read_config(args: CommonArgs) -> Result<SimConfig> {
    let mut config = match args.config {
        Some(p) => {
            let file = File::open(p)?;
            SimConfig::deser(file)?
        }
        None => Default::default(),
    };
    if let Some(p) = args.trace {
        config.trace = read_trace(p)?;
    }
    if let Some(addresses) = args.addresses {
        config.trace = addresses.into_iter().map(Addr::new).collect();
    }
    if let Some(n) = args.cache_size {
        config.cache_size = n;
    }
    if let Some(n) = args.memory_size {
        config.memory_size = n;
    }
    Ok(config)
}

fn read_trace(input: PathBuf) -> Result<AccessTrace> {
    let mut buf = String::new();
    let mut file = File::open(&input)?;
    file.read_to_string(&mut buf)?;
    let trace = AccessTrace::parse(&buf)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", input.display()))?;
    log::info!("read {} addresses from {}.", trace.len(), input.display());
    Ok(trace)
}
