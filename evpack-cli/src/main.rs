//! evpack CLI - Command-line tool for repacking gzip event logs
//!
//! This binary provides command-line interfaces for:
//! - run: expand the input archive, transform every fragment and write
//!   size-bounded numbered batches
//! - ls: list the numbered output files of a previous run

use clap::{Parser, Subcommand, ValueEnum};
use evpack_io::{
    inspect_output, CancellationToken, EvpackError, FlushPolicy, Limits, OutputFileInfo, Pipeline,
    PipelineOptions, PipelinePaths, PipelineRequest, PipelineSummary, ProgressEvent,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(name = "evpack")]
#[command(about = "Repack gzip event-log fragments into size-bounded JSON batches")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand, transform and batch event-log fragments
    Run {
        /// Zip archive holding the fragments
        #[arg(long, default_value = evpack_io::DEFAULT_ARCHIVE_PATH)]
        archive: PathBuf,
        /// Directory the archive is expanded into
        #[arg(long, default_value = evpack_io::DEFAULT_EXTRACT_DIR)]
        extract_dir: PathBuf,
        /// Directory holding the gzip fragments
        #[arg(long, default_value = evpack_io::DEFAULT_INPUT_DIR)]
        input_dir: PathBuf,
        /// Directory receiving the numbered output files
        #[arg(long, default_value = evpack_io::DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,
        /// Read an already expanded input directory
        #[arg(long)]
        skip_extract: bool,
        /// Byte budget per output file
        #[arg(long, default_value_t = evpack_io::DEFAULT_MAX_BATCH_BYTES)]
        max_batch_bytes: usize,
        /// What happens to the chunk that overflows a batch
        #[arg(long, value_enum, default_value_t = FlushPolicyArg::Carry)]
        flush_policy: FlushPolicyArg,
        /// Process fragments in directory order instead of by name
        #[arg(long)]
        no_sort: bool,
        /// Delete numbered outputs of an earlier run first
        #[arg(long)]
        clean: bool,
        /// Show a progress spinner
        #[arg(long)]
        progress: bool,
    },
    /// List the numbered output files in a directory
    Ls {
        /// Output directory of a previous run
        #[arg(default_value = evpack_io::DEFAULT_OUTPUT_DIR)]
        dir: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value_t = LsFormat::Table)]
        format: LsFormat,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum FlushPolicyArg {
    /// The overflowing chunk opens the next batch
    Carry,
    /// The overflowing chunk's records are discarded
    DropTriggering,
}

impl From<FlushPolicyArg> for FlushPolicy {
    fn from(arg: FlushPolicyArg) -> Self {
        match arg {
            FlushPolicyArg::Carry => FlushPolicy::Carry,
            FlushPolicyArg::DropTriggering => FlushPolicy::DropTriggering,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LsFormat {
    Table,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            archive,
            extract_dir,
            input_dir,
            output_dir,
            skip_extract,
            max_batch_bytes,
            flush_policy,
            no_sort,
            clean,
            progress,
        } => {
            let request = PipelineRequest {
                paths: PipelinePaths {
                    archive: (!skip_extract).then_some(archive),
                    extract_dir,
                    input_dir,
                    output_dir,
                },
                options: PipelineOptions {
                    max_batch_bytes,
                    flush_policy: flush_policy.into(),
                    sort_inputs: !no_sort,
                    clean_output: clean,
                    limits: Limits::default(),
                },
            };
            handle_run(request, progress)
        }
        Commands::Ls { dir, format } => handle_ls(dir, format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let cancelled = err
                .downcast_ref::<EvpackError>()
                .is_some_and(EvpackError::is_cancelled);
            error!("{}", err);
            eprintln!("Error: {}", err);
            if cancelled {
                ExitCode::from(EXIT_CANCELLED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_run(request: PipelineRequest, show_progress: bool) -> Result<(), Box<dyn Error>> {
    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || handler_token.cancel())?;

    let progress_bar = show_progress.then(|| create_spinner("Repacking fragments"));
    let mut pipeline = Pipeline::new(request).with_cancellation(token);
    if let Some(pb) = progress_bar.clone() {
        pipeline = pipeline.with_observer(move |event| match event {
            ProgressEvent::FileStarted {
                path,
                position,
                total,
            } => pb.set_message(format!("[{}/{}] {}", position + 1, total, path.display())),
            ProgressEvent::ChunkProcessed { records } => pb.inc(*records as u64),
            ProgressEvent::BatchWritten(info) => {
                debug!(file = %info.path.display(), "batch sealed")
            }
        });
    }

    let result = pipeline.run();
    if let Some(pb) = progress_bar {
        match &result {
            Ok(summary) => pb.finish_with_message(format!(
                "Repacked {} records into {} files in {:.2?}",
                summary.records_written, summary.files_written, summary.elapsed
            )),
            Err(_) => pb.abandon_with_message("Repack stopped"),
        }
    }

    report_run_summary(&result?)?;
    Ok(())
}

fn report_run_summary(summary: &PipelineSummary) -> Result<(), Box<dyn Error>> {
    let secs = summary.elapsed.as_secs_f64().max(f64::EPSILON);
    let rec_rate = summary.records_written as f64 / secs;
    let mut stderr = std::io::stderr().lock();
    if let Some(expanded) = &summary.expanded {
        writeln!(
            &mut stderr,
            "Expanded archive (files: {}, bytes: {})",
            expanded.files_extracted, expanded.bytes_extracted
        )?;
    }
    writeln!(
        &mut stderr,
        "Repacked {} fragments (chunks: {}, records: {}, dropped: {}, files: {}, bytes written: {}, elapsed: {:.2?}, {:.1} rec/s)",
        summary.input_files,
        summary.chunks_processed,
        summary.records_written,
        summary.records_dropped,
        summary.files_written,
        summary.bytes_written,
        summary.elapsed,
        rec_rate
    )?;
    Ok(())
}

fn handle_ls(dir: PathBuf, format: LsFormat) -> Result<(), Box<dyn Error>> {
    let files = inspect_output(&dir)?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    match format {
        LsFormat::Table => print_ls_table(&mut handle, &files)?,
        LsFormat::Json => print_ls_json(&mut handle, &files)?,
    }
    Ok(())
}

#[derive(Serialize)]
struct LsReport<'a> {
    files: &'a [OutputFileInfo],
    total_records: usize,
    total_bytes: u64,
}

fn print_ls_table(writer: &mut dyn Write, files: &[OutputFileInfo]) -> Result<(), Box<dyn Error>> {
    writeln!(writer, "File\tRecords\tBytes")?;
    for info in files {
        let name = info
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| info.path.display().to_string());
        writeln!(writer, "{}\t{}\t{}", name, info.records, info.bytes)?;
    }
    writeln!(
        writer,
        "Total\t{}\t{}",
        files.iter().map(|info| info.records).sum::<usize>(),
        files.iter().map(|info| info.bytes).sum::<u64>()
    )?;
    Ok(())
}

fn print_ls_json(writer: &mut dyn Write, files: &[OutputFileInfo]) -> Result<(), Box<dyn Error>> {
    let report = LsReport {
        files,
        total_records: files.iter().map(|info| info.records).sum(),
        total_bytes: files.iter().map(|info| info.bytes).sum(),
    };
    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)?;
    Ok(())
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} records {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
