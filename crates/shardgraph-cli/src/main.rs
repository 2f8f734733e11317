//! Shardgraph CLI
//!
//! Inspect and query the attribute indexes of one shard:
//! - `info`: list loaded indexes
//! - `search`: run a predicate and print or sample the matches
//! - `build-range`: write a range index partial from CSV

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use shardgraph_index::{
    DataType, F32Value, IndexKind, IndexManager, IndexMeta, LoaderConfig, MergeableIndex,
    RangeSampleIndex, SampleIndex, SearchOp,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shardgraph")]
#[command(author, version, about = "Shardgraph: sharded weighted index inspection")]
struct Cli {
    /// Log at debug level unless RUST_LOG is set.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    loader: LoaderArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct LoaderArgs {
    /// Loader config JSON (`shard_index`, `shard_number`, `parallel`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Shard owned by this process. Overrides the config file.
    #[arg(long, global = true)]
    shard_index: Option<u32>,

    /// Total number of shards. Overrides the config file.
    #[arg(long, global = true)]
    shard_number: Option<u32>,

    /// Load indexes one at a time.
    #[arg(long, global = true)]
    sequential: bool,
}

impl LoaderArgs {
    fn resolve(&self) -> Result<LoaderConfig> {
        let mut config = match &self.config {
            Some(path) => LoaderConfig::from_json_file(path)?,
            None => LoaderConfig::default(),
        };
        if let Some(index) = self.shard_index {
            config.shard_index = index;
        }
        if let Some(number) = self.shard_number {
            config.shard_number = number;
        }
        if self.sequential {
            config.parallel = false;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List every index under a root with its kind, types and size.
    Info {
        /// Index root directory
        root: PathBuf,
    },

    /// Evaluate a predicate against one index.
    Search {
        /// Index root directory
        root: PathBuf,
        /// Index name
        #[arg(long)]
        index: String,
        /// Operator name (`GREATER_EQ`) or mnemonic (`ge`)
        #[arg(long)]
        op: String,
        /// Operand; lists and hash-range keys use `::`
        #[arg(long)]
        value: String,
        /// Draw N weighted samples instead of listing every match
        #[arg(long)]
        sample: Option<usize>,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a range index partial from `id,value,weight` lines.
    BuildRange {
        /// Index root directory
        dir: PathBuf,
        /// Index name
        #[arg(long)]
        name: String,
        /// Input CSV
        #[arg(long)]
        csv: PathBuf,
        /// Partial number
        #[arg(long, default_value_t = 0)]
        part: u32,
    },
}

#[derive(Serialize)]
struct Match {
    id: u64,
    weight: f32,
}

#[derive(Serialize)]
struct SearchReport<'a> {
    index: &'a str,
    op: SearchOp,
    value: &'a str,
    count: usize,
    sum_weight: f32,
    matches: Vec<Match>,
}

fn log_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info { root } => cmd_info(&root, &cli.loader.resolve()?),
        Commands::Search {
            root,
            index,
            op,
            value,
            sample,
            json,
        } => cmd_search(&root, &cli.loader.resolve()?, &index, &op, &value, sample, json),
        Commands::BuildRange {
            dir,
            name,
            csv,
            part,
        } => cmd_build_range(&dir, &name, &csv, part),
    }
}

fn cmd_info(root: &Path, config: &LoaderConfig) -> Result<()> {
    let manager = IndexManager::load(root, config)
        .with_context(|| format!("loading indexes under {}", root.display()))?;
    println!(
        "{} {} indexes (shard {}/{})",
        "Loaded".green().bold(),
        manager.len(),
        config.shard_index,
        config.shard_number
    );
    for name in manager.names() {
        let Some(loaded) = manager.loaded(name) else {
            continue;
        };
        let index = &loaded.index;
        println!(
            "  {} {} id={} value={} files={} rows={} keys={} bytes={}",
            name.bold(),
            loaded.meta.kind.to_string().cyan(),
            loaded.meta.id_type,
            loaded.meta.value_type,
            loaded.files.len(),
            index.row_count(),
            index.keys().len(),
            index.serialized_size()
        );
    }
    Ok(())
}

fn cmd_search(
    root: &Path,
    config: &LoaderConfig,
    name: &str,
    op: &str,
    value: &str,
    sample: Option<usize>,
    json: bool,
) -> Result<()> {
    let op: SearchOp = op.parse()?;
    let manager = IndexManager::load(root, config)
        .with_context(|| format!("loading indexes under {}", root.display()))?;
    let index = manager
        .get(name)
        .ok_or_else(|| anyhow!("no index named `{name}` under {}", root.display()))?;
    tracing::debug!(index = name, %op, value, "search");
    let result = index.search(op, value)?;

    let matches: Vec<Match> = match sample {
        Some(n) => result.sample(n),
        None => result.ids().into_iter().zip(result.weights()).collect(),
    }
    .into_iter()
    .map(|(id, weight)| Match { id, weight })
    .collect();

    if json {
        let report = SearchReport {
            index: name,
            op,
            value,
            count: result.len(),
            sum_weight: result.sum_weight(),
            matches,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} {} {} {} -> {} matches, weight {}",
        "Search".green().bold(),
        name.bold(),
        op,
        value,
        result.len(),
        result.sum_weight()
    );
    if sample.is_some() {
        println!("  {} {} samples", "→".yellow(), matches.len());
    }
    for m in &matches {
        println!("  {} {}", m.id, format!("{:.4}", m.weight).cyan());
    }
    Ok(())
}

fn parse_row(line: &str, lineno: usize) -> Result<(u64, F32Value, f32)> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [id, value, weight] = fields.as_slice() else {
        bail!("line {lineno}: expected `id,value,weight`, got `{line}`");
    };
    let id = id
        .parse::<u64>()
        .with_context(|| format!("line {lineno}: bad id `{id}`"))?;
    let value = value
        .parse::<f32>()
        .with_context(|| format!("line {lineno}: bad value `{value}`"))?;
    let weight = weight
        .parse::<f32>()
        .with_context(|| format!("line {lineno}: bad weight `{weight}`"))?;
    Ok((id, F32Value(value), weight))
}

fn cmd_build_range(dir: &Path, name: &str, csv: &Path, part: u32) -> Result<()> {
    let text = fs::read_to_string(csv).with_context(|| format!("reading {}", csv.display()))?;
    let mut ids = Vec::new();
    let mut values = Vec::new();
    let mut weights = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (id, value, weight) = parse_row(line, i + 1)?;
        ids.push(id);
        values.push(value);
        weights.push(weight);
    }

    let index = RangeSampleIndex::<u64, F32Value>::build(name, ids, values, weights)?;
    let index_dir = dir.join(name);
    IndexMeta::new(IndexKind::Range, DataType::UInt64, DataType::Float).write(&index_dir)?;
    let out = index_dir.join(format!("part_{part}.dat"));
    fs::write(&out, index.serialize()?).with_context(|| format!("writing {}", out.display()))?;

    // reload to catch layout mistakes before anyone loads the shard
    let check = RangeSampleIndex::<u64, F32Value>::deserialize(name, &fs::read(&out)?)?;
    if check.len() != index.len() {
        bail!("wrote {} rows but read back {}", index.len(), check.len());
    }
    eprintln!(
        "{} {} ({} rows)",
        "wrote".green().bold(),
        out.display().to_string().bold(),
        index.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_row() {
        let (id, value, weight) = parse_row(" 7, 2.5 ,1", 1).unwrap();
        assert_eq!((id, value, weight), (7, F32Value(2.5), 1.0));
        assert!(parse_row("7,2.5", 2).is_err());
        assert!(parse_row("x,2.5,1", 3).is_err());
    }

    #[test]
    fn test_build_range_then_search() {
        let dir = TempDir::new().unwrap();
        let csv = dir.path().join("age.csv");
        fs::write(&csv, "# id,value,weight\n0,1,2\n1,2,4\n2,2,8\n\n3,3,8\n4,4,16\n").unwrap();
        let root = dir.path().join("root");
        cmd_build_range(&root, "age", &csv, 0).unwrap();

        let manager = IndexManager::load(&root, &LoaderConfig::default()).unwrap();
        let index = manager.get("age").unwrap();
        let eq = index.search_str("eq", "2").unwrap();
        assert_eq!(eq.sorted_ids(), vec![1, 2]);
        assert_eq!(eq.sum_weight(), 12.0);
        cmd_search(&root, &LoaderConfig::default(), "age", "gt", "2", Some(5), true).unwrap();
    }

    #[test]
    fn test_loader_flags_override_config() {
        let args = LoaderArgs {
            config: None,
            shard_index: Some(1),
            shard_number: Some(4),
            sequential: true,
        };
        let config = args.resolve().unwrap();
        assert_eq!((config.shard_index, config.shard_number, config.parallel), (1, 4, false));

        let bad = LoaderArgs {
            shard_index: Some(4),
            ..args
        };
        assert!(bad.resolve().is_err());
    }

    #[test]
    fn test_unknown_index_is_reported() {
        let dir = TempDir::new().unwrap();
        let err = cmd_search(dir.path(), &LoaderConfig::default(), "nope", "eq", "1", None, false)
            .unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
