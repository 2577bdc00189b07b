use anyhow::{Context, Result};
use clap::Parser;
use depth_replay::reader::SnapshotReader;
use depth_replay::record::Snapshot;
use depth_replay::source::CsvSource;
use dotenvy::dotenv;
use env_logger::{Builder, Env};
use std::fs::File;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about = "Replay a per-level depth dump and print merged book snapshots")]
struct Args {
    /// Input dump file (delimited text with a header row, one level per line)
    #[arg(long, short = 'i', env = "DUMP_FILE")]
    input: PathBuf,

    /// Level index of the first level in each snapshot (dump variants use 0 or 1)
    #[arg(long, env = "BASE_LEVEL", default_value_t = 1)]
    base_level: u32,

    /// Print each snapshot as one JSON object instead of the text layout
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Stop after this many snapshots
    #[arg(long)]
    limit: Option<usize>,

    /// Suppress per-snapshot output, keep the final summary
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn print_text(snap: &Snapshot) {
    let sym = snap.fields.get("sym").map(String::as_str).unwrap_or("?");
    let time = snap
        .fields
        .get("time")
        .or_else(|| snap.fields.get("exchTime"))
        .map(String::as_str)
        .unwrap_or("-");
    println!("{} {} ({} levels)", sym, time, snap.levels.len());
    for (i, lvl) in snap.levels.iter().enumerate() {
        println!(
            "{:>3}: {:>10} x {:>8} ({:>3}) | {:>10} x {:>8} ({:>3})",
            snap.base_level() + i as u32,
            lvl.bid.price,
            lvl.bid.size,
            lvl.bid.count,
            lvl.ask.price,
            lvl.ask.size,
            lvl.ask.count,
        );
    }
    println!("---");
}

fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();
    Builder::from_env(Env::default()).init();
    let args = Args::parse();

    let file = File::open(&args.input).with_context(|| format!("open {:?}", args.input))?;
    let source =
        CsvSource::new(file).with_context(|| format!("detect dialect of {:?}", args.input))?;
    let mut reader = SnapshotReader::new(source).with_base_level(args.base_level);

    let mut count = 0usize;
    while let Some(snap) = reader.next_snapshot()? {
        if !args.quiet {
            if args.json {
                println!("{}", serde_json::to_string(&snap)?);
            } else {
                print_text(&snap);
            }
        }
        count += 1;
        if args.limit.is_some_and(|n| count >= n) {
            break;
        }
    }
    eprintln!("Read {} snapshots.", count);
    Ok(())
}
