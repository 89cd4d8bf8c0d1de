//!
//! This is the command shell for the object runtime.
//!
#![warn(missing_docs)]

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;

#[cfg(feature = "jemalloc")]
use jemallocator::Jemalloc;

mod shell;

use objkit_runtime::universe::Universe;

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Debug, Clone, PartialEq, Parser)]
#[clap(about, author)]
struct Options {
    /// Command script to execute instead of the interactive shell.
    file: Option<PathBuf>,

    /// Enable verbose output (with timing information).
    #[clap(short = 'v')]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let opts: Options = Options::parse();

    let mut universe = Universe::new(Rc::new(shell::EchoHost));

    match opts.file {
        Some(file) => {
            let source = std::fs::read_to_string(&file)
                .with_context(|| format!("could not read '{}'", file.display()))?;
            shell::script(&mut universe, &source)
        }
        None => shell::interactive(&mut universe, opts.verbose),
    }
}
