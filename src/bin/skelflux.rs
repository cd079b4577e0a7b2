//! Skelflux CLI - Command-line interface for Skeleton Flux
//!
//! Commands:
//! - transform: Feed recorded frames through a tracker and export the final snapshot
//!   (batch mode)
//! - run: Process frames from stdin, exporting periodically (streaming mode)
//! - validate: Validate recorded frames
//! - schema: Print input/output schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skeleton_flux::encoder::tree_to_json;
use skeleton_flux::frame::{Frame, FrameAdapter};
use skeleton_flux::{
    FrameOutcome, SkeletonExport, SkeletonTracker, TrackerConfig, TranslationMode, PRODUCER_NAME,
    VERSION,
};

/// Skelflux - Smoothed joint hierarchies from body-tracking frames
#[derive(Parser)]
#[command(name = "skelflux")]
#[command(version = VERSION)]
#[command(about = "Build smoothed joint trees from body-tracking frames", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed recorded frames through a tracker and export the final snapshot
    Transform {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        #[command(flatten)]
        tracker: TrackerArgs,

        /// Wrap the snapshot in an export envelope with provenance
        #[arg(long)]
        envelope: bool,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },

    /// Process frames from stdin, one JSON frame per line (streaming mode)
    Run {
        #[command(flatten)]
        tracker: TrackerArgs,

        /// Emit an export every N processed frames (0 = only at end of input)
        #[arg(long, default_value = "0")]
        export_every: u64,

        /// Leave periodic exports buffered instead of flushing each one
        #[arg(long)]
        no_flush: bool,
    },

    /// Validate recorded frames
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(clap::Args)]
struct TrackerArgs {
    /// Tracker config file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// How frame translations are interpreted (overrides the config file)
    #[arg(long)]
    translation_mode: Option<ModeArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Translations are in the skeleton root's frame
    Absolute,
    /// Translations are relative to the parent joint
    Relative,
}

impl From<ModeArg> for TranslationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Absolute => TranslationMode::Absolute,
            ModeArg::Relative => TranslationMode::Relative,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one frame per line)
    Ndjson,
    /// JSON array of frames
    Json,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (one frame)
    Input,
    /// Output schema (joint document)
    Output,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), SkelfluxCliError> {
    match cli.command {
        Commands::Transform {
            input,
            output,
            input_format,
            tracker,
            envelope,
            pretty,
        } => cmd_transform(&input, &output, input_format, &tracker, envelope, pretty),

        Commands::Run {
            tracker,
            export_every,
            no_flush,
        } => cmd_run(&tracker, export_every, !no_flush),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_transform(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    tracker_args: &TrackerArgs,
    envelope: bool,
    pretty: bool,
) -> Result<(), SkelfluxCliError> {
    let frames = read_frames(input, &input_format)?;

    if frames.iter().all(|frame| frame.is_empty()) {
        return Err(SkelfluxCliError::NoFrames);
    }

    let mut tracker = SkeletonTracker::with_config(load_config(tracker_args)?);

    for frame in &frames {
        if let FrameOutcome::Built { unresolved, .. } = tracker.process_frame(frame) {
            for error in unresolved {
                tracing::warn!(%error, "Joint dropped from tree");
            }
        }
    }

    let output_data = if envelope {
        let export = tracker.export();
        format_export(&export, pretty)?
    } else {
        tree_to_json(&tracker.snapshot(), pretty)?
    };

    if output.to_string_lossy() == "-" {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(
    tracker_args: &TrackerArgs,
    export_every: u64,
    flush: bool,
) -> Result<(), SkelfluxCliError> {
    let mut tracker = SkeletonTracker::with_config(load_config(tracker_args)?);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut since_export: u64 = 0;

    for (line_num, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let frame: Frame = serde_json::from_str(trimmed).map_err(|e| {
            SkelfluxCliError::ParseError(format!(
                "Failed to parse frame on line {}: {}",
                line_num + 1,
                e
            ))
        })?;

        match tracker.process_frame(&frame) {
            FrameOutcome::Empty | FrameOutcome::Frozen => continue,
            FrameOutcome::Built { .. }
            | FrameOutcome::Updated { .. }
            | FrameOutcome::Extended { .. } => since_export += 1,
        }

        if export_every > 0 && since_export >= export_every {
            writeln!(stdout, "{}", format_export(&tracker.export(), false)?)?;
            if flush {
                stdout.flush()?;
            }
            since_export = 0;
        }
    }

    if export_every == 0 || since_export > 0 {
        writeln!(stdout, "{}", format_export(&tracker.export(), false)?)?;
        stdout.flush()?;
    }

    Ok(())
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    json: bool,
) -> Result<(), SkelfluxCliError> {
    let frames = read_frames(input, &input_format)?;
    let issues = FrameAdapter::validate_frames(&frames);

    let report = ValidationReport {
        total_frames: frames.len(),
        total_entries: frames.iter().map(Vec::len).sum(),
        issues,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total frames:  {}", report.total_frames);
        println!("Total entries: {}", report.total_entries);
        println!("Issues:        {}", report.issues.len());

        if !report.issues.is_empty() {
            println!("\nIssues:");
            for issue in &report.issues {
                println!(
                    "  - Frame {} ({}): {}",
                    issue.frame_index,
                    issue.joint.as_deref().unwrap_or("frame"),
                    issue.error
                );
            }
        }
    }

    if report.issues.is_empty() {
        Ok(())
    } else {
        Err(SkelfluxCliError::ValidationFailed(report.issues.len()))
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), SkelfluxCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input: one frame per record");
                println!();
                println!("A frame is a JSON array of joint entries:");
                println!("  - name: hierarchy path, segments joined by '/' (root first)");
                println!("  - translation: [x, y, z]");
                println!(
                    "  - rotation: [x, y, z, w] quaternion, imaginary part first (default identity)"
                );
                println!();
                println!("Translations are absolute (root frame) or relative (parent frame),");
                println!("selected with --translation-mode.");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output: nested joint document ({} {})", PRODUCER_NAME, VERSION);
                println!();
                println!("Each joint object contains:");
                println!("  - name");
                println!("  - relativeTranslation: [x, y, z] (smoothed)");
                println!("  - absoluteTranslation: [x, y, z]");
                println!("  - rotation: [x, y, z, w] (smoothed, not re-normalized)");
                println!("  - children: nested joint objects in discovery order");
                println!();
                println!("An empty tree is written as null. With --envelope the document is");
                println!("wrapped with export_version, producer, captured_at_utc,");
                println!("frames_processed, translation_mode and tree_size.");
            }
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, SkelfluxCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_frames(input: &Path, input_format: &InputFormat) -> Result<Vec<Frame>, SkelfluxCliError> {
    let input_data = read_input(input)?;
    let frames = match input_format {
        InputFormat::Ndjson => FrameAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => FrameAdapter::parse_array(&input_data)?,
    };

    if frames.is_empty() {
        return Err(SkelfluxCliError::NoFrames);
    }

    Ok(frames)
}

fn load_config(args: &TrackerArgs) -> Result<TrackerConfig, SkelfluxCliError> {
    let mut config = match &args.config {
        Some(path) => TrackerConfig::from_json(&fs::read_to_string(path)?)?,
        None => TrackerConfig::default(),
    };

    if let Some(mode) = args.translation_mode {
        config = config.with_translation_mode(mode.into());
    }

    Ok(config)
}

fn format_export(export: &SkeletonExport, pretty: bool) -> Result<String, SkelfluxCliError> {
    if pretty {
        Ok(serde_json::to_string_pretty(export)?)
    } else {
        Ok(serde_json::to_string(export)?)
    }
}

fn joint_json_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "required": ["name", "relativeTranslation", "absoluteTranslation", "rotation", "children"],
        "properties": {
            "name": { "type": "string" },
            "relativeTranslation": { "$ref": "#/$defs/vec3" },
            "absoluteTranslation": { "$ref": "#/$defs/vec3" },
            "rotation": { "$ref": "#/$defs/quat" },
            "children": { "type": "array", "items": { "$ref": "#/$defs/joint" } }
        }
    })
}

fn vector_defs() -> serde_json::Value {
    serde_json::json!({
        "vec3": { "type": "array", "items": { "type": "number" }, "minItems": 3, "maxItems": 3 },
        "quat": { "type": "array", "items": { "type": "number" }, "minItems": 4, "maxItems": 4 },
        "joint": joint_json_schema()
    })
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "skeleton frame",
        "description": "One frame of named joint transforms",
        "type": "array",
        "items": {
            "type": "object",
            "required": ["name", "translation"],
            "properties": {
                "name": { "type": "string", "minLength": 1 },
                "translation": { "$ref": "#/$defs/vec3" },
                "rotation": { "$ref": "#/$defs/quat" }
            }
        },
        "$defs": vector_defs()
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "skeleton snapshot",
        "description": "Immutable joint tree; null when the tree is empty",
        "oneOf": [
            { "$ref": "#/$defs/joint" },
            { "type": "null" }
        ],
        "$defs": vector_defs()
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum SkelfluxCliError {
    Io(io::Error),
    Tree(skeleton_flux::TreeError),
    Json(serde_json::Error),
    NoFrames,
    ValidationFailed(usize),
    ParseError(String),
}

impl From<io::Error> for SkelfluxCliError {
    fn from(e: io::Error) -> Self {
        SkelfluxCliError::Io(e)
    }
}

impl From<skeleton_flux::TreeError> for SkelfluxCliError {
    fn from(e: skeleton_flux::TreeError) -> Self {
        SkelfluxCliError::Tree(e)
    }
}

impl From<serde_json::Error> for SkelfluxCliError {
    fn from(e: serde_json::Error) -> Self {
        SkelfluxCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<SkelfluxCliError> for CliError {
    fn from(e: SkelfluxCliError) -> Self {
        match e {
            SkelfluxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            SkelfluxCliError::Tree(e) => CliError {
                code: "FRAME_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'skelflux schema input' for the expected frame format".to_string()),
            },
            SkelfluxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            SkelfluxCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No joints found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            SkelfluxCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} issues found", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            SkelfluxCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_frames: usize,
    total_entries: usize,
    issues: Vec<skeleton_flux::frame::FrameIssue>,
}
