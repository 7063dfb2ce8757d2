//! Driver: validates inputs, wires the pipeline stages
//! together, and writes output atomically.

use std::fs::File;
use std::io::BufReader;

use log::info;

use crate::bai;
use crate::bed_writer;
use crate::cancel::CancellationToken;
use crate::cli::PartitionArgs;
use crate::contigs;
use crate::error::IndexToolsError;
use crate::partition;
use crate::target;
use crate::volume;

pub fn run(args: &PartitionArgs, cancel: &CancellationToken) -> Result<(), IndexToolsError> {
    if args.num_partitions == 0 {
        return Err(IndexToolsError::UsageError(
            "-n/--num-partitions must be >= 1".to_string(),
        ));
    }
    cancel.check()?;

    info!("reading BAI {:?}", args.bai);
    let bai_file = File::open(&args.bai).map_err(|e| IndexToolsError::io(&args.bai, e))?;
    let index = bai::read_bai(BufReader::new(bai_file))?;
    info!("parsed {} references from BAI", index.references.len());
    cancel.check()?;

    let contig_source = args.contig_source();
    let contigs = contigs::load(&contig_source)?;
    contigs::validate_against_bai(&contigs, index.references.len())?;
    cancel.check()?;

    let contig_names: Vec<String> = contigs.iter().map(|(name, _)| name.clone()).collect();
    let lengths_bp: Vec<u64> = contigs.iter().map(|(_, len)| *len).collect();

    let windows = volume::estimate_all(&lengths_bp, &index.references);
    info!(
        "estimated volume over {} windows across {} references",
        windows.len(),
        contigs.len()
    );
    cancel.check()?;

    let targets = match &args.targets {
        Some(path) => target::load_targets(path, &contig_names)?,
        None => Vec::new(),
    };
    if let Some(path) = &args.targets {
        info!("loaded {} merged target regions from {:?}", targets.len(), path);
    }
    cancel.check()?;

    let tagged = target::intersect(&windows, &targets);
    // An empty (or all-contigs-unknown) target file loads zero targets,
    // which per spec §8 is equivalent to "no targets" — the BED writer's
    // feature_count column should not appear in that case either.
    let targets_active = !targets.is_empty();
    cancel.check()?;

    let partitions = partition::partition(&tagged, args.num_partitions, targets_active)?;
    info!("emitted {} partitions", partitions.len());
    cancel.check()?;

    bed_writer::write_bed(&partitions, &contig_names, &args.output)?;
    info!("wrote {:?}", args.output);

    Ok(())
}
