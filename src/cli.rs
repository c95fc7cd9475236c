//! CLI interface for Compsim
//!
//! Provides command-line interface for:
//! - Comparing two files with a compression metric
//! - Single-buffer estimates (Kolmogorov, Bennett, entropy)
//! - All-pairs comparison of a directory
//! - Listing, filling and querying a signature database

use crate::engine::{EngineConfig, SimilarityEngine};
use crate::oracle::{CodecOracle, MetricKind};
use crate::signature_db::{SignatureDb, SignatureElement};
use crate::CompressionBackend;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "compsim")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compression-based similarity and fuzzy signature matching")]
#[command(
    long_about = "Compsim - compression-distance similarity between arbitrary byte sequences\n\n\
    Scores are computed from compressed sizes (NCD, NCS, CMID) with per-backend caching,\n\
    so all-pairs comparisons compress each input only once.\n\n\
    Examples:\n\
      compsim compare -a app1.bin -b app2.bin --metric ncd\n\
      compsim matrix -i ./blocks --backend zstd --level 3\n\
      compsim db match -d signatures.json 17 4242 bb:9f"
)]
pub struct Cli {
    /// Compression backend (zlib, zstd, lz4, bzip2, lzma, xz, snappy)
    #[arg(long, global = true, value_name = "NAME")]
    pub backend: Option<CompressionBackend>,

    /// Compression effort level, 0-9
    #[arg(long, global = true, value_name = "LEVEL")]
    pub level: Option<u32>,

    /// JSON engine configuration; --backend and --level override it
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Metrics selectable from the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMetric {
    Ncd,
    Ncs,
    Cmid,
    Levenshtein,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score two files against each other
    Compare {
        #[arg(short, value_name = "FILE")]
        a: PathBuf,

        #[arg(short, value_name = "FILE")]
        b: PathBuf,

        #[arg(short, long, value_enum, default_value = "ncd")]
        metric: CompareMetric,
    },

    /// Single-file estimates: compressed size, Kolmogorov, Bennett, entropy
    Measure {
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },

    /// Score every pair of files under a directory
    Matrix {
        #[arg(short, long, value_name = "DIR")]
        input: PathBuf,

        #[arg(short, long, value_enum, default_value = "ncd")]
        metric: CompareMetric,
    },

    /// Signature database operations
    Db {
        #[command(subcommand)]
        action: DbCommand,
    },
}

#[derive(Subcommand)]
pub enum DbCommand {
    /// List every name / sub-name with its element count
    List {
        #[arg(short, long, value_name = "FILE")]
        database: PathBuf,
    },

    /// Add elements to a sub-signature and save
    Add {
        #[arg(short, long, value_name = "FILE")]
        database: PathBuf,

        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        sub_name: String,

        /// Elements; numbers and true/false are stored as JSON scalars, anything else as text
        #[arg(required = true)]
        elements: Vec<String>,
    },

    /// Report the first name containing an element
    Lookup {
        #[arg(short, long, value_name = "FILE")]
        database: PathBuf,

        element: String,
    },

    /// Fuzzy-match a set of elements against every sub-signature
    Match {
        #[arg(short, long, value_name = "FILE")]
        database: PathBuf,

        /// Also report sub-signatures below the match threshold
        #[arg(long)]
        all: bool,

        #[arg(required = true)]
        elements: Vec<String>,
    },
}

#[derive(Serialize)]
struct PairScore<'a> {
    a: &'a str,
    b: &'a str,
    metric: CompareMetric,
    value: f64,
    status: i32,
}

#[derive(Serialize)]
struct FileMeasures<'a> {
    file: &'a str,
    compressed_size: u64,
    kolmogorov: u64,
    bennett: f64,
    entropy: f64,
}

impl Cli {
    /// Effective engine configuration after applying overrides.
    pub fn engine_config(&self) -> io::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::default(),
        };
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(level) = self.level {
            config.level = level;
        }
        Ok(config)
    }
}

pub fn execute(cli: Cli) -> io::Result<()> {
    let config = cli.engine_config()?;
    debug!(?config, "engine configuration");

    match &cli.command {
        Commands::Compare { a, b, metric } => {
            let mut engine = SimilarityEngine::with_config(CodecOracle::default(), config);
            let data_a = fs::read(a)?;
            let data_b = fs::read(b)?;
            let (value, status) = score(&mut engine, *metric, &data_a, &data_b);

            let a = a.display().to_string();
            let b = b.display().to_string();
            let row = PairScore {
                a: &a,
                b: &b,
                metric: *metric,
                value,
                status,
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&row)?);
            } else {
                println!("{:?} {} <-> {}: {:.6} (status {})", row.metric, row.a, row.b, row.value, row.status);
            }
            Ok(())
        }

        Commands::Measure { input } => {
            let mut engine = SimilarityEngine::with_config(CodecOracle::default(), config);
            let data = fs::read(input)?;
            let file = input.display().to_string();
            let measures = FileMeasures {
                file: &file,
                compressed_size: engine.compress(&data)?,
                kolmogorov: engine.kolmogorov(&data)?.value,
                bennett: engine.bennett(&data)?.value,
                entropy: engine.entropy(&data).value,
            };

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&measures)?);
            } else {
                println!("File: {}", measures.file);
                println!("  Size: {} bytes", data.len());
                println!("  Compressed ({}): {} bytes", config.backend, measures.compressed_size);
                println!("  Kolmogorov estimate: {}", measures.kolmogorov);
                println!("  Bennett depth estimate: {:.9} s", measures.bennett);
                println!("  Entropy: {:.4} bits/byte", measures.entropy);
            }
            Ok(())
        }

        Commands::Matrix { input, metric } => {
            let mut engine = SimilarityEngine::with_config(CodecOracle::default(), config);
            let files = collect_files(input)?;
            let names: Vec<String> = files
                .iter()
                .map(|(path, _)| {
                    path.strip_prefix(input)
                        .unwrap_or(path.as_path())
                        .display()
                        .to_string()
                })
                .collect();

            let mut rows = Vec::new();
            for i in 0..files.len() {
                for j in (i + 1)..files.len() {
                    let (value, status) = score(&mut engine, *metric, &files[i].1, &files[j].1);
                    rows.push(PairScore {
                        a: &names[i],
                        b: &names[j],
                        metric: *metric,
                        value,
                        status,
                    });
                }
            }

            let stats = engine.cache_stats();
            if cli.json {
                let report = serde_json::json!({ "pairs": rows, "cache": stats });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for row in &rows {
                    println!("{:.6}  {} <-> {}  (status {})", row.value, row.a, row.b, row.status);
                }
                println!();
                println!("Files: {}  Pairs: {}", files.len(), rows.len());
                println!(
                    "Cache entries: sizes {}  results {}  entropy {}",
                    stats.sizes, stats.results, stats.entropy
                );
            }
            Ok(())
        }

        Commands::Db { action } => run_db(action, cli.json),
    }
}

fn run_db(action: &DbCommand, json: bool) -> io::Result<()> {
    match action {
        DbCommand::List { database } => {
            let db: SignatureDb = SignatureDb::open(database)?;
            if json {
                let listing: Vec<_> = db
                    .summary()
                    .map(|(name, sub_name, count)| {
                        serde_json::json!({ "name": name, "sub_name": sub_name, "elements": count })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&listing)?);
                return Ok(());
            }

            let mut current = None;
            for (name, sub_name, count) in db.summary() {
                if current != Some(name) {
                    println!("{} :", name);
                    current = Some(name);
                }
                println!("\t{} {}", sub_name, count);
            }
            Ok(())
        }

        DbCommand::Add {
            database,
            name,
            sub_name,
            elements,
        } => {
            let mut db: SignatureDb = SignatureDb::open(database)?;
            let added = elements
                .iter()
                .filter(|raw| db.add_element(name, sub_name, SignatureElement::parse(raw)))
                .count();
            db.save()?;
            println!("Added {} of {} elements to {} / {}", added, elements.len(), name, sub_name);
            Ok(())
        }

        DbCommand::Lookup { database, element } => {
            let db: SignatureDb = SignatureDb::open(database)?;
            let found = db.is_present(&SignatureElement::parse(element));
            if json {
                let report = serde_json::json!({ "found": found.is_some(), "name": found });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                match found {
                    Some(name) => println!("{} found in {}", element, name),
                    None => println!("{} not found", element),
                }
            }
            Ok(())
        }

        DbCommand::Match {
            database,
            all,
            elements,
        } => {
            let db: SignatureDb = SignatureDb::open(database)?;
            let candidates: HashSet<SignatureElement> =
                elements.iter().map(|raw| SignatureElement::parse(raw)).collect();
            let mut matches = db.match_elements(&candidates);
            if !*all {
                matches.retain(|_, m| m.is_match);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&matches)?);
                return Ok(());
            }

            for (sub_name, m) in &matches {
                println!(
                    "{} / {}: {} of {} ({:.1}%) {}",
                    m.name,
                    sub_name,
                    m.intersection.len(),
                    m.total,
                    m.ratio,
                    if m.is_match { "MATCH" } else { "-" }
                );
            }
            let hits = matches.values().filter(|m| m.is_match).count();
            println!("Matched sub-signatures: {}", hits);
            Ok(())
        }
    }
}

fn score(
    engine: &mut SimilarityEngine,
    metric: CompareMetric,
    a: &[u8],
    b: &[u8],
) -> (f64, i32) {
    let measured = match metric {
        CompareMetric::Ncd => engine.metric(MetricKind::Ncd, a, b),
        CompareMetric::Ncs => engine.metric(MetricKind::Ncs, a, b),
        CompareMetric::Cmid => engine.metric(MetricKind::Cmid, a, b),
        CompareMetric::Levenshtein => {
            let m = engine.levenshtein(a, b);
            return (m.value as f64, m.status.0);
        }
    };
    (measured.value, measured.status.0)
}

/// Every regular file under `dir`, sorted by path, with its contents.
fn collect_files(dir: &Path) -> io::Result<Vec<(PathBuf, Vec<u8>)>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            paths.push(entry.path().to_path_buf());
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let data = fs::read(&path)?;
            Ok((path, data))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_defaults() {
        let cli = Cli::parse_from(["compsim", "--level", "3", "measure", "-i", "x.bin"]);
        let config = cli.engine_config().unwrap();
        assert_eq!(config.level, 3);
        assert_eq!(config.backend, CompressionBackend::Zlib);
    }

    #[test]
    fn backend_names_are_parsed() {
        let cli = Cli::parse_from(["compsim", "compare", "-a", "x", "-b", "y", "--backend", "ZLIB"]);
        assert_eq!(cli.backend, Some(CompressionBackend::Zlib));
        assert!(Cli::try_parse_from(["compsim", "--backend", "smaz", "measure", "-i", "x"]).is_err());
    }

    #[test]
    fn execute_adds_then_matches_unsigned_elements() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db.json");
        let db = db.to_str().unwrap();

        let add = ["compsim", "db", "add", "-d", db, "-n", "app", "-s", "m", "18446744073709551615", "7"];
        execute(Cli::parse_from(add)).unwrap();
        execute(Cli::parse_from(["compsim", "db", "match", "-d", db, "18446744073709551615"])).unwrap();

        let stored: SignatureDb = SignatureDb::open(db).unwrap();
        assert_eq!(stored.is_present(&SignatureElement::UInt(u64::MAX)), Some("app"));
    }
}
