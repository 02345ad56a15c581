//! replay-dump — inspect record/replay logs

use clap::{Parser, Subcommand};
use replay_log::{LogError, LogReader, Record};
use snafu::Snafu;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// CLI errors for the dump binary.
#[derive(Debug, Snafu)]
enum CliError {
    #[snafu(display("Log error: {source}"), context(false))]
    Log { source: LogError },
    #[snafu(display("I/O error: {source}"), context(false))]
    Io { source: std::io::Error },
}

#[derive(Parser)]
#[command(name = "replay-dump")]
#[command(about = "Inspect deterministic record/replay logs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every record with its offset and cumulative icount
    Dump {
        /// Path to the replay log
        #[arg(short, long)]
        log: PathBuf,
    },

    /// Count records per kind
    Summary {
        /// Path to the replay log
        #[arg(short, long)]
        log: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Dump { log } => cmd_dump(&log),
        Commands::Summary { log } => cmd_summary(&log),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// One decoded record with where it sits in the log.
struct Entry {
    offset: u64,
    icount: u64,
    record: Record,
}

/// Walk the whole log. Returns the entries and whether it ended with END.
fn read_log(path: &Path) -> Result<(Vec<Entry>, bool), CliError> {
    let mut reader = LogReader::open(BufReader::new(File::open(path)?))?;
    let mut entries = Vec::new();
    let mut icount = 0u64;
    loop {
        let offset = reader.position();
        let record = match Record::decode(&mut reader) {
            Ok(record) => record,
            Err(LogError::UnexpectedEof { offset: at }) if at == offset => {
                return Ok((entries, false));
            }
            Err(e) => return Err(e.into()),
        };
        if let Record::Instruction(delta) = record {
            icount += u64::from(delta);
        }
        let end = record == Record::End;
        entries.push(Entry {
            offset,
            icount,
            record,
        });
        if end {
            return Ok((entries, true));
        }
    }
}

fn describe(record: &Record) -> String {
    match record {
        Record::Instruction(delta) => format!("{} +{delta}", record.kind()),
        Record::Async(event) => match event.id() {
            Some(id) => format!("async {} id={id}", event.kind()),
            None => format!("async {}", event.kind()),
        },
        Record::Shutdown(cause) => format!("shutdown {cause}"),
        Record::CharWrite { result, offset } => {
            format!("{} result={result} offset={offset}", record.kind())
        }
        Record::CharReadAll(data) => format!("{} {} bytes", record.kind(), data.len()),
        Record::CharReadAllError(result) => format!("{} {result}", record.kind()),
        Record::AudioOut { played } => format!("{} played={played}", record.kind()),
        Record::AudioIn { recorded, wpos, .. } => {
            format!("{} recorded={recorded} wpos={wpos}", record.kind())
        }
        Record::Random { ret, data } => format!("{} ret={ret} {} bytes", record.kind(), data.len()),
        Record::Clock { kind, value } => format!("clock {kind} = {value}"),
        Record::Checkpoint(id) => format!("checkpoint {id}"),
        Record::Interrupt | Record::Exception | Record::End => record.kind().to_string(),
    }
}

fn cmd_dump(path: &Path) -> Result<(), CliError> {
    let (entries, complete) = read_log(path)?;
    println!("{:>10}  {:>14}  record", "offset", "icount");
    for entry in &entries {
        println!(
            "{:>10}  {:>14}  {}",
            entry.offset,
            entry.icount,
            describe(&entry.record)
        );
    }
    if !complete {
        println!("(log ends without END record)");
    }
    Ok(())
}

fn cmd_summary(path: &Path) -> Result<(), CliError> {
    let (entries, complete) = read_log(path)?;
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for entry in &entries {
        *counts.entry(entry.record.kind().to_string()).or_default() += 1;
    }

    println!("=== Replay Log ===");
    println!("File:          {}", path.display());
    println!("Records:       {}", entries.len());
    println!(
        "Instructions:  {}",
        entries.last().map_or(0, |entry| entry.icount)
    );
    println!("Complete:      {}", if complete { "yes" } else { "no" });
    println!();
    for (kind, count) in &counts {
        println!("  {kind:<28} {count}");
    }
    Ok(())
}
