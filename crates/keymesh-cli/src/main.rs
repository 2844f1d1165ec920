//! keymesh CLI - split LS-DYNA keyfiles into per-part node/element tables.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use keymesh::{
    extract_part, read_keyfiles, renumber, writer, Document, DuplicateNodePolicy, Lexer,
    ParseMode, ParseOptions, PartId,
};

mod confirm;

#[derive(Parser)]
#[command(name = "keymesh")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract per-part meshes from LS-DYNA keyfiles", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ParseArgs {
    /// Raise an error on unexpected tokens inside blocks
    #[arg(long)]
    strict: bool,
    /// Raise an error when a node id is defined twice
    #[arg(long)]
    reject_duplicate_nodes: bool,
    /// TOML file with parse options
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write node and element tables for each part
    Extract {
        /// Input keyfiles, read in order into one mesh
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Base name of the output files (<base>-<part>-nodes.txt, <base>-<part>-elements.txt)
        #[arg(short, long)]
        output: PathBuf,
        /// Part ids to extract (default: all parts)
        #[arg(short, long = "part")]
        parts: Vec<PartId>,
        /// Keep original node and element ids instead of renumbering
        #[arg(long)]
        keep_ids: bool,
        /// Overwrite existing output files without asking
        #[arg(short, long)]
        yes: bool,
        #[command(flatten)]
        parse: ParseArgs,
    },
    /// Display mesh and part counts
    Info {
        /// Input keyfiles
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        parse: ParseArgs,
    },
    /// Print the token stream of a keyfile
    Tokens {
        /// Input keyfile
        input: PathBuf,
        /// Show comment lines as tokens
        #[arg(long)]
        comments: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Extract {
            inputs,
            output,
            parts,
            keep_ids,
            yes,
            parse,
        } => {
            let options = parse_options(&parse)?;
            extract_parts(&inputs, &output, &parts, keep_ids, yes, &options)?;
        }
        Commands::Info {
            inputs,
            json,
            parse,
        } => {
            let options = parse_options(&parse)?;
            show_info(&inputs, json, &options)?;
        }
        Commands::Tokens { input, comments } => {
            show_tokens(&input, comments)?;
        }
    }

    Ok(())
}

fn parse_options(args: &ParseArgs) -> Result<ParseOptions> {
    let mut options = match &args.config {
        Some(path) => ParseOptions::load(path)
            .with_context(|| format!("loading options from {}", path.display()))?,
        None => ParseOptions::default(),
    };
    if args.strict {
        options.mode = ParseMode::Strict;
    }
    if args.reject_duplicate_nodes {
        options.duplicate_nodes = DuplicateNodePolicy::Reject;
    }
    Ok(options)
}

fn read_inputs(inputs: &[PathBuf], options: &ParseOptions) -> Result<Document> {
    let doc = read_keyfiles(inputs, options).context("reading keyfiles, no output written")?;
    doc.check_references()?;
    Ok(doc)
}

fn extract_parts(
    inputs: &[PathBuf],
    output: &Path,
    requested: &[PartId],
    keep_ids: bool,
    yes: bool,
    options: &ParseOptions,
) -> Result<()> {
    let doc = read_inputs(inputs, options)?;

    let part_ids = if requested.is_empty() {
        doc.part_ids()
    } else {
        let mut seen = HashSet::new();
        requested.iter().copied().filter(|id| seen.insert(*id)).collect()
    };
    if part_ids.is_empty() {
        anyhow::bail!("No parts found in input");
    }
    let labels = writer::part_labels(&doc, &part_ids);

    let mut written = 0;
    for (part_id, label) in part_ids.into_iter().zip(labels) {
        let part = extract_part(&doc, part_id)?;
        if part.element_count() == 0 {
            println!("Part {part_id} has no elements, skipped");
            continue;
        }
        let part = if keep_ids { part } else { renumber(&part)? };

        let (nodes_path, elements_path) = writer::output_paths(output, &label);
        if !yes && !confirm::overwrite_allowed(&[nodes_path.as_path(), elements_path.as_path()])? {
            println!("Part {part_id} skipped");
            continue;
        }

        writer::write_part(&part, output, &label)?;
        info!(
            part = part_id,
            nodes = part.node_count(),
            elements = part.element_count(),
            "part written"
        );
        println!(
            "Wrote part {} ({} nodes, {} elements) to {} and {}",
            part_id,
            part.node_count(),
            part.element_count(),
            nodes_path.display(),
            elements_path.display()
        );
        written += 1;
    }

    println!("{written} part(s) written");
    Ok(())
}

/// Print counts, then fail if any element references an undefined node.
fn show_info(inputs: &[PathBuf], json: bool, options: &ParseOptions) -> Result<()> {
    let doc = read_keyfiles(inputs, options)?;
    let stats = doc.stats();

    if json {
        println!("{}", stats.to_json()?);
        return check_mesh(&doc);
    }

    println!("Nodes: {}", stats.nodes);
    println!("Elements: {}", stats.elements);
    println!("Parts: {}", stats.parts.len());
    for part in &stats.parts {
        println!(
            "  {}: {} ({} elements, {} nodes)",
            part.id,
            part.name.as_deref().map(str::trim).unwrap_or("unnamed"),
            part.elements,
            part.nodes
        );
    }

    check_mesh(&doc)
}

fn check_mesh(doc: &Document) -> Result<()> {
    doc.check_references().context("mesh is incomplete")?;
    Ok(())
}

fn show_tokens(input: &Path, comments: bool) -> Result<()> {
    use std::fs::File;
    use std::io::BufReader;

    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let lexer = Lexer::new(BufReader::new(file)).keep_comments(comments);

    let mut count = 0;
    for tok in lexer {
        let tok = tok?;
        count += 1;
        println!("{:>6}  {:?}", tok.line, tok.token);
    }
    println!("Total number of tokens: {count}");
    Ok(())
}
