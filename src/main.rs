//! Entry point for the satbands application.
//! Handles CLI parsing, logging setup, and dispatches inspection or product generation.

use clap::Parser;
use satbands::metadata::{describe_band, extract_metadata, print_band_listing};
use satbands::netcdf_io::{NetCdfBandSource, NetCdfRasterWriter};
use satbands::config::RasterFormat;
use satbands::geotiff_io::GeoTiffRasterWriter;
use satbands::output::{ArchivePackager, RasterSink, ZipPackager};
use satbands::parallel::{get_parallel_info, ParallelConfig};
use satbands::pipeline::{Pipeline, RunReport};
use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Args;

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "satbands=debug"
    } else {
        "satbands=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .init();
}

fn print_report(report: &RunReport) {
    println!("\n Run summary for {}", report.source);
    println!("==============================");
    if let Some(level) = report.level {
        println!(" Product level: {level}");
    }
    println!(" Outputs ({}):", report.outputs.len());
    for path in &report.outputs {
        println!("    {}", path.display());
    }
    if report.skipped.is_empty() {
        println!(" Skipped: none");
    } else {
        println!(" Skipped ({}):", report.skipped.len());
        for s in &report.skipped {
            println!("    {}: {}", s.name, s.reason);
        }
    }
    if let Some(archive) = &report.archive {
        println!(" Archive: {}", archive.display());
    }
}

fn run(args: &Args) -> satbands::Result<()> {
    let source = NetCdfBandSource::open(&args.file)?;

    if args.inspect_only() {
        if args.list_bands {
            print_band_listing(&source)?;
        }
        if let Some(band) = &args.describe {
            describe_band(&source, band)?;
        }
        if let Some(path) = &args.metadata_json {
            let metadata = extract_metadata(&source)?;
            serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), &metadata)?;
            println!("Saved metadata to {}", path.display());
        }
        return Ok(());
    }

    let config = args.resolve_config()?;
    ParallelConfig::new(config.threads).setup_global_pool()?;
    get_parallel_info().log();

    let packager = ZipPackager::new(&config.output_dir);
    let packager: Option<&dyn ArchivePackager> = if args.no_archive {
        None
    } else {
        Some(&packager)
    };

    let netcdf_writer = NetCdfRasterWriter::default();
    let sink: &dyn RasterSink = match config.format {
        RasterFormat::GeoTiff => &GeoTiffRasterWriter,
        RasterFormat::NetCdf => &netcdf_writer,
    };

    let pipeline = Pipeline::new(config)?;
    let report = pipeline.run(&source, sink, packager)?;
    print_report(&report);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, fatal = e.is_fatal(), "run failed");
            ExitCode::FAILURE
        }
    }
}
