use std::{path::PathBuf, process, sync::Arc, time::Duration};

use clap::Parser;
use clipcut::{
    CutOptions, EncoderOptions, FfmpegLogLevel, ProgressCallback, ProgressInfo, cut_files,
};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

const CLI_AFTER_HELP: &str = "Task file format (one task per line, fields separated by spaces):\n  <id> <destination> <start_ms> <end_ms>\n\nTasks must be ordered by start time. The report receives one line per\nfinished clip, in the same format.\n\nExamples:\n  clipcut input.mp4 'scale=480:-2,fps=15' tasks.txt report.txt\n  clipcut --progress --preset veryfast --capacity 2G input.mkv null tasks.txt report.txt";

#[derive(Debug, Parser)]
#[command(
    name = "clipcut",
    version,
    about = "Cut many clips out of one video, decoding it only once",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    /// Input media path or URL.
    source: String,

    /// FFmpeg filter graph applied to every decoded frame ("null" for none).
    filter: String,

    /// Task file listing the clips to cut.
    task: PathBuf,

    /// Report file receiving one line per completed clip.
    report: PathBuf,

    /// Frame buffer capacity in bytes; accepts K, M and G suffixes (default 4G).
    #[arg(long, value_parser = parse_size)]
    capacity: Option<u64>,

    /// FFmpeg encoder name.
    #[arg(long, default_value = "libx264")]
    codec: String,

    /// Encoder preset.
    #[arg(long, default_value = "slow")]
    preset: String,

    /// Output frame rate of every clip.
    #[arg(long, default_value_t = 25)]
    fps: u32,

    /// Append to the report instead of overwriting it (for resumed batches).
    #[arg(long)]
    append: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,

    /// Show debug logging output.
    #[arg(long)]
    verbose: bool,

    /// Show a progress spinner counting finished clips.
    #[arg(long)]
    progress: bool,
}

/// Parse a byte count such as `4000000000`, `512M` or `4G` (decimal units).
fn parse_size(value: &str) -> Result<u64, String> {
    let trimmed = value.trim();
    let (digits, multiplier) = match trimmed.char_indices().last() {
        Some((index, 'k' | 'K')) => (&trimmed[..index], 1_000),
        Some((index, 'm' | 'M')) => (&trimmed[..index], 1_000_000),
        Some((index, 'g' | 'G')) => (&trimmed[..index], 1_000_000_000),
        Some(_) => (trimmed, 1),
        None => return Err("size cannot be empty".to_string()),
    };
    let number = digits
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid size {value:?}: {e}"))?;
    number
        .checked_mul(multiplier)
        .filter(|&size| size > 0)
        .ok_or_else(|| format!("size out of range: {value}"))
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template(
            "{spinner:.green} {pos} clips [{elapsed_precise}] {msg}",
        )?);
        bar.enable_steady_tick(Duration::from_millis(120));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(info.completed);
        self.bar
            .set_message(format!("{} ({} frames)", info.destination, info.frames));
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(cli.verbose);

    if let Some(level) = &cli.log_level {
        level.parse::<FfmpegLogLevel>()?.apply();
    }

    let encoder = EncoderOptions::default()
        .codec(cli.codec)
        .preset(Some(cli.preset))
        .fps(cli.fps);
    let mut options = CutOptions::new()
        .with_encoder(encoder)
        .with_append_report(cli.append);
    if let Some(capacity) = cli.capacity {
        options = options.with_buffer_capacity(capacity);
    }

    let progress = if cli.progress {
        let progress = Arc::new(TerminalProgress::new()?);
        options = options.with_progress(progress.clone());
        Some(progress)
    } else {
        None
    };

    let result = cut_files(&cli.source, &cli.filter, &cli.task, &cli.report, &options);
    if let Some(progress) = progress {
        progress.bar.finish_and_clear();
    }
    let summary = result?;

    eprintln!(
        "{} {} clips, {} frames in {:.1?}",
        "done".green().bold(),
        summary.tasks_completed,
        summary.frames_encoded,
        summary.elapsed,
    );
    Ok(())
}

fn main() {
    let cli = Cli::try_parse().unwrap_or_else(|error| {
        if error.use_stderr() {
            let _ = error.print();
            process::exit(1);
        }
        error.exit()
    });

    if let Err(error) = run(cli) {
        eprintln!("{} {error}", "error:".red().bold());
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, parse_size};

    #[test]
    fn parse_size_suffixes() {
        assert_eq!(parse_size("1500"), Ok(1500));
        assert_eq!(parse_size("512M"), Ok(512_000_000));
        assert_eq!(parse_size("4g"), Ok(4_000_000_000));
        assert_eq!(parse_size(" 10k "), Ok(10_000));
    }

    #[test]
    fn parse_size_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("G").is_err());
        assert!(parse_size("12T").is_err());
        assert!(parse_size("0").is_err());
        assert!(parse_size("99999999999999999999G").is_err());
    }

    #[test]
    fn four_positionals_are_required() {
        assert!(Cli::try_parse_from(["clipcut", "in.mp4", "null", "tasks.txt"]).is_err());

        let cli = Cli::try_parse_from(["clipcut", "in.mp4", "null", "tasks.txt", "report.txt"])
            .unwrap();
        assert_eq!(cli.source, "in.mp4");
        assert_eq!(cli.filter, "null");
        assert_eq!(cli.fps, 25);
        assert_eq!(cli.codec, "libx264");
        assert!(!cli.append);
    }

    #[test]
    fn options_override_defaults() {
        let cli = Cli::try_parse_from([
            "clipcut", "--capacity", "2G", "--fps", "30", "--append", "in.mp4", "fps=10",
            "t.txt", "r.txt",
        ])
        .unwrap();
        assert_eq!(cli.capacity, Some(2_000_000_000));
        assert_eq!(cli.fps, 30);
        assert!(cli.append);
    }
}
