//! `colony <pool-path> <int|oid> <block-capacity>`
//!
//! Opens (or creates) a pool file, attaches to the colony at its root
//! (or creates one), and runs one insert/remove/shrink cycle before
//! destroying the colony again.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use colony_core::{ColonyError, Element, ElementKind, Oid, TransactionalStore};
use colony_engine::{Colony, ColonyConfig};
use colony_pool::{Pool, PoolConfig};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "COLONY_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";
const SAMPLE_SCALAR: i32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    pool_path: PathBuf,
    kind: ElementKind,
    block_capacity: u64,
    show_help: bool,
}

fn main() {
    init_tracing();
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let exit_code = run(std::env::args_os(), &mut stdout, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run<I, W, E>(args: I, out: &mut W, err: &mut E) -> i32
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let options = match parse_args(args) {
        Ok(options) => options,
        Err(message) => {
            let _ = writeln!(err, "error: {message}");
            let _ = write_usage(err);
            return 2;
        }
    };

    if options.show_help {
        if write_usage(out).is_err() {
            return 1;
        }
        return 0;
    }

    let pool = match open_pool(&options.pool_path) {
        Ok(pool) => pool,
        Err(message) => {
            let _ = writeln!(err, "error: {message}");
            return 1;
        }
    };

    let config = ColonyConfig::new(options.block_capacity);
    let result = match options.kind {
        ElementKind::Scalar => exercise::<i32, _>(pool, config, |_| SAMPLE_SCALAR, out),
        // Store a reference to the colony's own record.
        ElementKind::OpaqueRef => exercise::<Oid, _>(pool, config, |c| c.root_oid(), out),
    };
    match result {
        Ok(()) => 0,
        Err(error) => {
            let _ = writeln!(err, "error: {error}");
            1
        }
    }
}

fn parse_args<I>(args: I) -> Result<CliOptions, String>
where
    I: IntoIterator<Item = OsString>,
{
    let mut iter = args.into_iter();
    let _argv0 = iter.next();

    let mut positional: Vec<String> = Vec::with_capacity(3);
    let mut show_help = false;
    for argument in iter {
        let arg = argument.to_string_lossy();
        match arg.as_ref() {
            "-h" | "--help" => show_help = true,
            other if other.starts_with('-') && other.len() > 1 => {
                return Err(format!("unknown option `{other}`"));
            }
            other => positional.push(other.to_owned()),
        }
    }

    if show_help {
        return Ok(CliOptions {
            pool_path: PathBuf::new(),
            kind: ElementKind::Scalar,
            block_capacity: 0,
            show_help,
        });
    }

    let [path, kind, capacity]: [String; 3] = positional
        .try_into()
        .map_err(|given: Vec<String>| format!("expected 3 arguments, got {}", given.len()))?;
    let kind = ElementKind::from_name(&kind)
        .ok_or_else(|| format!("unknown element type `{kind}` (expected `int` or `oid`)"))?;
    let block_capacity = capacity
        .parse::<u64>()
        .map_err(|_| format!("invalid block capacity `{capacity}`"))?;

    Ok(CliOptions {
        pool_path: PathBuf::from(path),
        kind,
        block_capacity,
        show_help,
    })
}

fn open_pool(path: &Path) -> Result<Pool, String> {
    if path.exists() {
        Pool::open(path, PoolConfig::DEFAULT_LAYOUT)
            .map_err(|e| format!("failed to open pool {}: {e}", path.display()))
    } else {
        Pool::create(path, PoolConfig::default())
            .map_err(|e| format!("failed to create pool {}: {e}", path.display()))
    }
}

/// One insert/remove/shrink cycle, then tear the colony down.
fn exercise<E: Element, W: Write>(
    pool: Pool,
    config: ColonyConfig,
    sample: impl FnOnce(&Colony<E, Pool>) -> E,
    out: &mut W,
) -> Result<(), ColonyError> {
    let existed = !pool.root().is_null();
    let mut colony = Colony::<E, Pool>::open_or_create(pool, config)?;
    let verb = if existed { "opened" } else { "created" };
    let _ = writeln!(
        out,
        "{verb} colony ({}, block capacity {})",
        E::KIND,
        colony.block_capacity()
    );

    let value = sample(&colony);
    let index = colony.insert(value)?;
    let _ = writeln!(out, "inserted at index {index}");
    colony.remove(index)?;
    let _ = writeln!(out, "removed index {index}");

    let stats = colony.stats()?;
    let _ = writeln!(
        out,
        "size={} capacity={} blocks={} free_indices={} free_blocks={}",
        stats.size, stats.capacity, stats.block_count, stats.free_idx_count, stats.free_block_count
    );

    let remap = colony.shrink()?;
    let _ = writeln!(out, "shrink retired {} block(s)", remap.retired_blocks().len());

    colony.destroy()?;
    let _ = writeln!(out, "destroyed colony");
    Ok(())
}

fn write_usage<W>(out: &mut W) -> io::Result<()>
where
    W: Write,
{
    writeln!(
        out,
        "Usage: colony <pool-path> <int|oid> <block-capacity>\n\
         \n\
         Creates the pool file if it does not exist, attaches to (or\n\
         creates) the colony at its root, inserts and removes a sample\n\
         element, shrinks, and destroys the colony.\n\
         \n\
         Logging is controlled by {LOG_ENV} (default `{DEFAULT_LOG_FILTER}`).\n",
    )
}
