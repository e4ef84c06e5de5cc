use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};

use henkan::{
    ConvertOptions, ErrorPolicy, Format, KaraokeHandling, ParseOptions, PositioningHandling,
    UnsupportedHandling,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliFormat {
    Ass,
    Srt,
    Webvtt,
    Sbv,
    Lrc,
    Microdvd,
}

impl From<CliFormat> for Format {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Ass => Format::Ass,
            CliFormat::Srt => Format::Srt,
            CliFormat::Webvtt => Format::WebVtt,
            CliFormat::Sbv => Format::Sbv,
            CliFormat::Lrc => Format::Lrc,
            CliFormat::Microdvd => Format::MicroDvd,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliKaraoke {
    Preserve,
    Explode,
    Strip,
}

impl From<CliKaraoke> for KaraokeHandling {
    fn from(karaoke: CliKaraoke) -> Self {
        match karaoke {
            CliKaraoke::Preserve => KaraokeHandling::Preserve,
            CliKaraoke::Explode => KaraokeHandling::Explode,
            CliKaraoke::Strip => KaraokeHandling::Strip,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliPositioning {
    Preserve,
    Strip,
}

impl From<CliPositioning> for PositioningHandling {
    fn from(positioning: CliPositioning) -> Self {
        match positioning {
            CliPositioning::Preserve => PositioningHandling::Preserve,
            CliPositioning::Strip => PositioningHandling::Strip,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliUnsupported {
    Drop,
    Comment,
}

impl From<CliUnsupported> for UnsupportedHandling {
    fn from(unsupported: CliUnsupported) -> Self {
        match unsupported {
            CliUnsupported::Drop => UnsupportedHandling::Drop,
            CliUnsupported::Comment => UnsupportedHandling::EmitAsComment,
        }
    }
}

/// Convert subtitles between ASS, SRT, WebVTT, SBV, LRC and MicroDVD.
///
/// Problems in the input are logged as warnings; set RUST_LOG to change how much is logged.
#[derive(Parser, Debug)]
#[command(name = "henkan", version, about)]
struct Args {
    /// Input file, or `-` for standard input
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum)]
    to: CliFormat,

    /// Input format; guessed from the file extension by default
    #[arg(short, long, value_enum)]
    from: Option<CliFormat>,

    /// Output file; standard output by default
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// What to do with karaoke timing
    #[arg(long, value_enum, default_value = "preserve")]
    karaoke: CliKaraoke,

    /// What to do with positioning overrides
    #[arg(long, value_enum, default_value = "preserve")]
    positioning: CliPositioning,

    /// What to do with other constructs the output format cannot express
    #[arg(long, value_enum, default_value = "drop")]
    unsupported: CliUnsupported,

    /// Print every construct lost in conversion to standard error
    #[arg(long)]
    report: bool,

    /// Treat every problem in the input as an error, and fail if there are any
    #[arg(long)]
    strict: bool,

    /// Do not log problems in the input
    #[arg(long, conflicts_with = "strict")]
    quiet: bool,

    /// Frame rate for frame-timed input (MicroDVD)
    #[arg(long)]
    fps: Option<f64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let bytes = read_input(&args)?;
    let source = match args.from {
        Some(format) => format.into(),
        None => Format::from_path(&args.input)
            .context("Could not tell the input format, use --from to give it")?,
    };

    let mut parse_options = ParseOptions {
        on_error: if args.quiet {
            ErrorPolicy::Skip
        } else {
            ErrorPolicy::Collect
        },
        strict: args.strict,
        ..ParseOptions::default()
    };
    if let Some(fps) = args.fps {
        parse_options.frame_rate = fps;
    }

    let parsed = henkan::parse_bytes(&bytes, source, &parse_options);
    log::info!(
        "read {} events from {} ({} errors, {} warnings)",
        parsed.document.events().len(),
        args.input.display(),
        parsed.errors.len(),
        parsed.warnings.len()
    );
    if args.strict && !parsed.ok {
        bail!(
            "{} has {} problems, not converting in strict mode",
            args.input.display(),
            parsed.errors.len()
        );
    }

    let convert_options = ConvertOptions {
        unsupported: args.unsupported.into(),
        karaoke: args.karaoke.into(),
        positioning: args.positioning.into(),
        report_loss: args.report,
    };
    let conversion = henkan::convert(&parsed.document, args.to.into(), &convert_options);

    if args.report {
        let mut stderr = io::stderr().lock();
        for lost in &conversion.lost_features {
            writeln!(stderr, "lost {}: {lost}", lost.feature)?;
        }
        writeln!(
            stderr,
            "{} constructs could not be converted",
            conversion.lost_features.len()
        )?;
    }

    match &args.output {
        Some(path) => fs::write(path, &conversion.output)
            .with_context(|| format!("Could not write {}", path.display()))?,
        None => io::stdout().lock().write_all(conversion.output.as_bytes())?,
    }

    Ok(())
}

fn read_input(args: &Args) -> Result<Vec<u8>> {
    if args.input.as_os_str() == "-" {
        if args.from.is_none() {
            bail!("--from is required when reading from standard input");
        }
        let mut bytes = vec![];
        io::stdin().lock().read_to_end(&mut bytes)?;
        return Ok(bytes);
    }

    fs::read(&args.input).with_context(|| format!("Could not read {}", args.input.display()))
}
