//! Command-line driver for `i386_ld`: reads object files and `ar` archives,
//! links them, and writes a single ELF32 executable.
//!
//! This is `main()` from the source linker, split from the library the way
//! a teacher-style project separates its CLI surface from its core logic.

use anyhow::{Context, Result};
use clap::Parser;
use i386_ld::image::Linker;
use i386_ld::layout::LayoutConfig;
use log::{debug, error, trace};
use std::fs;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// A minimal static linker for i386 ELF32 relocatable objects and archives
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Relocatable objects and `.a` archives to link, in load order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output executable path
    #[arg(short = 'o', long = "output", default_value = "a.out")]
    output: PathBuf,

    /// Accepted for compatibility, has no effect
    #[arg(short = 'g')]
    debug_info: bool,
}

/// An input file is an archive if its path ends in `.a`, matching `is_ar`
fn is_archive(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("a")
}

fn run(args: &Args) -> Result<()> {
    let buffers: Vec<Vec<u8>> = args
        .inputs
        .iter()
        .map(|path| {
            fs::read(path).with_context(|| format!("cannot open {}", path.display()))
        })
        .collect::<Result<_>>()?;

    let mut linker = Linker::new();
    for (path, bytes) in args.inputs.iter().zip(&buffers) {
        if is_archive(path) {
            debug!("linking archive {}", path.display());
            linker
                .add_archive(bytes)
                .with_context(|| format!("linking archive {}", path.display()))?;
        } else {
            trace!("adding object {}", path.display());
            linker
                .add_object(bytes)
                .with_context(|| format!("adding object {}", path.display()))?;
        }
    }
    debug!("{} objects loaded", linker.objects().len());

    let config = LayoutConfig::default();
    let (layout, got) = linker.link(&config).context("linking objects")?;
    debug!(
        "layout: text@{:#x} bss@{:#x} data@{:#x} got@{:#x}",
        config.text_vaddr, layout.bss.vaddr, config.data_vaddr, layout.got_vaddr
    );

    let mut file = fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .mode(0o700)
        .open(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    match linker.write_to(&layout, &got, &mut file) {
        Ok(()) => Ok(()),
        Err(e) => {
            drop(file);
            let _ = fs::remove_file(&args.output);
            Err(e).with_context(|| format!("writing {}", args.output.display()))
        }
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        error!("{e:#}");
        std::process::exit(1);
    }
}
