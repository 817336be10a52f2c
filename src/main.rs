use anyhow::Context;
use clap::Parser;
use log::error;
use std::path::PathBuf;
use std::process;
use word_splitter::config::{ExportFormat, SplitConfig, VadParams, DEFAULT_MODEL_PATH};
use word_splitter::{pipeline, Error, BOUNDARY_MARGIN_SECS};

/// Split an audio file to separate words, defined in an XLS file.
#[derive(Parser)]
#[command(name = "word-splitter")]
struct Cli {
    /// Audio file to split (repeatable).
    #[arg(long, required = true)]
    audio: Vec<PathBuf>,

    /// Spreadsheet containing the word specification (or a desc.json from an earlier run).
    #[arg(long)]
    xls: PathBuf,

    /// The directory where split audio will be stored.
    #[arg(long)]
    output_dir: PathBuf,

    /// Clip format.
    #[arg(long, value_enum, default_value_t = ExportFormat::Mp3)]
    format: ExportFormat,

    /// Seconds kept before and after each detected word.
    #[arg(long, default_value_t = BOUNDARY_MARGIN_SECS)]
    margin: f64,

    /// Silero VAD model (downloaded when missing).
    #[arg(long, default_value = DEFAULT_MODEL_PATH)]
    vad_model: PathBuf,

    /// Speech detection threshold (0.0-1.0).
    #[arg(long, default_value_t = VadParams::default().threshold)]
    threshold: f32,

    /// Silence that separates two words, in milliseconds.
    #[arg(long, default_value_t = VadParams::default().min_silence_duration_ms)]
    min_silence_ms: u32,

    /// Shortest speech kept as a word, in milliseconds.
    #[arg(long, default_value_t = VadParams::default().min_speech_duration_ms)]
    min_speech_ms: u32,

    /// Padding the detector adds around speech, in milliseconds.
    #[arg(long, default_value_t = VadParams::default().speech_pad_ms)]
    speech_pad_ms: u32,

    /// Read word boundaries from <DIR>/<stem>.json instead of running the VAD.
    #[arg(long)]
    segments_dir: Option<PathBuf>,

    /// Save detected boundaries as <output-dir>/<stem>.segments.json.
    #[arg(long)]
    save_segments: bool,
}

impl Cli {
    fn split_config(&self) -> SplitConfig {
        SplitConfig {
            output_dir: self.output_dir.clone(),
            margin_secs: self.margin,
            format: self.format,
            vad: VadParams {
                threshold: self.threshold,
                min_silence_duration_ms: self.min_silence_ms,
                min_speech_duration_ms: self.min_speech_ms,
                speech_pad_ms: self.speech_pad_ms,
                ..VadParams::default()
            },
            vad_model: self.vad_model.clone(),
            segments_dir: self.segments_dir.clone(),
            save_segments: self.save_segments,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        match e.downcast_ref::<Error>() {
            Some(Error::Format(stem)) => {
                error!("Error extracting file information from '{}'. Quitting.", stem)
            }
            _ => error!("{:#}", e),
        }
        process::exit(exit_code(&e));
    }
}

/// 1 for a malformed recording name, 2 for any other failure
fn exit_code(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<Error>() {
        Some(Error::Format(_)) => 1,
        _ => 2,
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let report = pipeline::split(cli.split_config(), &cli.xls, &cli.audio)
        .with_context(|| format!("Failed to split into {}", cli.output_dir.display()))?;

    for file in &report.files {
        println!(
            "{}: {} of {} words exported",
            file.source.display(),
            file.clips.len(),
            file.descriptor.word_count()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapped(e: Error) -> anyhow::Error {
        Err::<(), _>(e).context("Failed to split into out").unwrap_err()
    }

    #[test]
    fn malformed_name_exits_with_one() {
        assert_eq!(exit_code(&Error::Format("bet5-9".into()).into()), 1);
        assert_eq!(exit_code(&wrapped(Error::Format("bet5-9".into()))), 1);
    }

    #[test]
    fn other_failures_exit_with_two() {
        assert_eq!(exit_code(&wrapped(Error::Lookup(7))), 2);
        assert_eq!(
            exit_code(&wrapped(Error::DataIntegrity { row: 3, cells: "(1, , , )".into() })),
            2
        );
        assert_eq!(exit_code(&anyhow::anyhow!("no audio")), 2);
    }
}
