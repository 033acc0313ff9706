use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use ssaha_lib::builder::parse::{count_sequences, read_sequences};
use ssaha_lib::{
    check_datastore, BuildConfiguration, DataStore, DataStoreBuilder, FastxDatabase, Packing,
    Searcher,
};
use std::io::{BufWriter, Write};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "ssaha")]
#[command(version = "0.1.0")]
#[command(about = "SSAHA: k-mer DataStore construction and seed search", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum PackingArg {
    /// A, C, G, T
    Dna,
    /// The 20 standard amino acids
    Protein,
}

impl PackingArg {
    fn packing(self) -> Packing {
        match self {
            PackingArg::Dna => Packing::dna(),
            PackingArg::Protein => Packing::protein(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build a DataStore from a sequence file
    Build {
        /// Input FASTA/FASTQ file (may be gzipped)
        #[arg(short, long)]
        input: String,

        /// Output DataStore file
        #[arg(short, long)]
        output: String,

        /// Word length
        #[arg(short = 'k', long, default_value = "12")]
        word_length: usize,

        /// Index every step-th window
        #[arg(long, default_value = "1")]
        step: usize,

        /// Leave out words occurring this many times or more
        #[arg(long, default_value = "1000")]
        threshold: u32,

        /// Residue alphabet
        #[arg(long, value_enum, default_value = "dna")]
        packing: PackingArg,

        /// Fail on names longer than 65535 bytes instead of truncating them
        #[arg(long, default_value = "false")]
        no_truncate_names: bool,
    },

    /// Search query sequences against a DataStore
    Search {
        /// DataStore file
        #[arg(short = 'x', long)]
        index: String,

        /// Query FASTA/FASTQ file
        #[arg(short, long)]
        query: String,

        /// Shortest merged hit to report (defaults to the word length)
        #[arg(long)]
        min_length: Option<u32>,

        /// Look up every step-th query window
        #[arg(long, default_value = "1")]
        step: usize,

        /// Number of threads (0 = all available cores)
        #[arg(short = 't', long, default_value = "0")]
        threads: usize,
    },

    /// Check a DataStore against the file it was built from
    Check {
        /// DataStore file
        #[arg(short = 'x', long)]
        index: String,

        /// Input file used to build the DataStore
        #[arg(short, long)]
        input: String,
    },

    /// Print DataStore parameters and space breakdown
    Stats {
        /// DataStore file
        #[arg(short = 'x', long)]
        index: String,
    },

    /// Time random word lookups
    Bench {
        /// DataStore file
        #[arg(short = 'x', long)]
        index: String,

        /// Number of lookups per run
        #[arg(short = 'n', long, default_value = "1000000")]
        lookups: usize,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing: use RUST_LOG if set, otherwise default to info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            word_length,
            step,
            threshold,
            packing,
            no_truncate_names,
        } => {
            let config = BuildConfiguration {
                word_length,
                step,
                threshold,
                packing: packing.packing(),
                truncate_long_names: !no_truncate_names,
                ..BuildConfiguration::default()
            };
            build_command(&input, &output, config)?;
        }
        Commands::Search {
            index,
            query,
            min_length,
            step,
            threads,
        } => {
            search_command(&index, &query, min_length, step, threads)?;
        }
        Commands::Check { index, input } => {
            check_command(&index, &input)?;
        }
        Commands::Stats { index } => {
            stats_command(&index)?;
        }
        Commands::Bench { index, lookups } => {
            bench_command(&index, lookups)?;
        }
    }

    Ok(())
}

fn open_store(index: &str) -> anyhow::Result<DataStore> {
    info!("Loading DataStore from {}...", index);
    let store =
        DataStore::open(index).with_context(|| format!("Failed to open DataStore {index}"))?;
    info!(
        "DataStore loaded (word_length={}, packing={}, sequences={})",
        store.word_length(),
        store.packing(),
        store.num_sequences()
    );
    Ok(store)
}

/// Build a DataStore from FASTA/FASTQ input
fn build_command(input: &str, output: &str, config: BuildConfiguration) -> anyhow::Result<()> {
    info!("Building SSAHA DataStore...");
    info!("  Input: {}", input);
    info!("  Output: {}", output);

    let (num_sequences, total_residues) = count_sequences(input)
        .with_context(|| format!("Failed to read sequence file {input}"))?;
    info!("  Found {} sequences ({} residues)", num_sequences, total_residues);

    let builder = DataStoreBuilder::new(config)?;
    let (store, _report) = builder
        .build(output, &FastxDatabase::new(input))
        .with_context(|| format!("Failed to build DataStore {output}"))?;

    info!("DataStore built successfully!");
    store.print_summary();
    Ok(())
}

/// Search every query and print merged hits as tab-separated lines
fn search_command(
    index: &str,
    query: &str,
    min_length: Option<u32>,
    step: usize,
    threads: usize,
) -> anyhow::Result<()> {
    let store = open_store(index)?;
    let min_length = min_length.unwrap_or(store.word_length() as u32);

    let queries =
        read_sequences(query).with_context(|| format!("Failed to read query file {query}"))?;
    info!("Searching {} queries (min_length={}, step={})...", queries.len(), min_length, step);

    // Build a rayon thread pool sized to --threads.
    // threads == 0 means "all cores" (rayon default).
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("Failed to create thread pool")?;
    let searcher = Searcher::new(&store).with_step(step)?;
    let results = pool.install(|| searcher.search_batch(&queries, min_length))?;

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut total_hits = 0usize;
    for result in &results {
        for hit in &result.hits {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}",
                result.query_id,
                store.name_for_id(hit.target_id)?,
                hit.query_offset,
                hit.target_offset,
                hit.length
            )?;
        }
        debug!("  {} -> {} hits", result.query_id, result.hits.len());
        total_hits += result.hits.len();
    }
    out.flush()?;

    info!("Reported {} merged hits for {} queries", total_hits, results.len());
    Ok(())
}

/// Verify a DataStore against its source file
fn check_command(index: &str, input: &str) -> anyhow::Result<()> {
    let store = open_store(index)?;
    let report = check_datastore(&store, &FastxDatabase::new(input))
        .with_context(|| format!("Failed to check {index} against {input}"))?;

    println!("\nResults:");
    println!("  Words checked: {}", report.words_checked);
    println!("  Occurrences verified: {}", report.occurrences_verified);
    println!("  Mismatched words: {}", report.mismatched_words);
    for mismatch in &report.mismatches {
        println!("    {}", mismatch);
    }

    if !report.is_ok() {
        anyhow::bail!("DataStore {index} does not match {input}");
    }
    info!("Check passed");
    Ok(())
}

fn stats_command(index: &str) -> anyhow::Result<()> {
    let store = open_store(index)?;
    store.print_summary();
    Ok(())
}

/// Time lookups of random words
fn bench_command(index: &str, lookups: usize) -> anyhow::Result<()> {
    use std::hint::black_box;
    use std::time::Instant;

    let store = open_store(index)?;
    let runs: usize = 5;

    info!("Generating {} random words...", lookups);
    let space = store.word_space();
    let mut rng_state: u64 = 42;
    let words: Vec<u64> = (0..lookups)
        .map(|_| {
            // Simple LCG random
            rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
            (rng_state >> 16) % space
        })
        .collect();

    let start = Instant::now();
    let mut total_hits = 0usize;
    for _ in 0..runs {
        for &word in &words {
            let hits = store.lookup(word)?;
            total_hits += black_box(hits.count());
        }
    }
    let elapsed = start.elapsed();
    let ns_per_lookup = elapsed.as_nanos() as f64 / (runs * words.len().max(1)) as f64;
    println!("random lookup (avg_nanosec_per_word) = {:.3}", ns_per_lookup);
    println!(
        "  avg hits per word = {:.3}",
        total_hits as f64 / (runs * words.len().max(1)) as f64
    );
    Ok(())
}
