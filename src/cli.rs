use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};

/// Genomic-index-driven balanced partitioning for parallel alignment
/// workflows.
#[derive(Parser)]
#[command(name = "indextools", author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Partition a genome into N approximately-equal-volume BED regions,
    /// using a BAI's coarse-grained coverage signal.
    Partition(PartitionArgs),
}

#[derive(Parser, Debug)]
#[clap(group = ArgGroup::new("contig_source").required(true).args(&["bam", "sizes"]))]
pub struct PartitionArgs {
    /// BAI input file [path]
    #[clap(short = 'I', long = "bai", value_parser, required = true, help_heading = "Core")]
    pub bai: PathBuf,

    /// Indexed BAM file to read contig sizes from (mutually exclusive
    /// with `-z`) [path]
    #[clap(short = 'i', long = "bam", value_parser, group = "contig_source", help_heading = "Core")]
    pub bam: Option<PathBuf>,

    /// Tab-separated contig-sizes file: `name<TAB>length_bp` per line [path]
    #[clap(short = 'z', long = "sizes", value_parser, group = "contig_source", help_heading = "Core")]
    pub sizes: Option<PathBuf>,

    /// Optional target BED restricting volume to these regions [path]
    #[clap(short = 't', long = "targets", value_parser, help_heading = "Filtering")]
    pub targets: Option<PathBuf>,

    /// Number of partitions to produce (>= 1) [integer]
    #[clap(short = 'n', long = "num-partitions", required = true, help_heading = "Core")]
    pub num_partitions: usize,

    /// Output BED path [path]
    #[clap(short = 'o', long = "output", value_parser, required = true, help_heading = "Core")]
    pub output: PathBuf,
}

impl PartitionArgs {
    pub fn contig_source(&self) -> crate::contigs::ContigSource {
        match (&self.bam, &self.sizes) {
            (Some(bam), None) => crate::contigs::ContigSource::Bam(bam.clone()),
            (None, Some(sizes)) => crate::contigs::ContigSource::SizesFile(sizes.clone()),
            // clap's ArgGroup guarantees exactly one of these is set.
            _ => unreachable!("contig_source ArgGroup enforces exactly one of -i/-z"),
        }
    }
}
