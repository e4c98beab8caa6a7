use std::fs;
use std::future::Future;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use maestro::header::Meter;
use maestro::playback::{Metronome, PlaybackOutcome, PlaybackScheduler};
use maestro::{EngineConfig, MaestroError, PitchConvention, VoicePart};
use maestro_cli::{commands, LoggingBackend, PlanOptions};
use serde::Serialize;
use tokio::signal;
use tracing::info;

/// Choir notation engine
#[derive(Parser)]
#[command(name = "maestro")]
#[command(about = "Parse, transpose and schedule choir notation")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an ABC file into timed notes
    Parse {
        file: PathBuf,

        /// Voice part used for octave placement
        #[arg(long, default_value = "soprano")]
        voice: VoicePart,

        /// Use the simplified duration-aware parser
        #[arg(long)]
        durations: bool,

        /// Octave convention: standard or voice-relative
        #[arg(long)]
        convention: Option<PitchConvention>,
    },
    /// Parse tonic sol-fa
    Solfa {
        text: String,

        #[arg(short, long, default_value = "C")]
        key: String,

        /// Octave shift applied to every syllable
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        octave: i32,
    },
    /// Transpose a note list or an ABC file
    Transpose {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        /// Space-separated note names
        melody: Option<String>,

        /// ABC document to transpose instead of a note list
        #[arg(long, conflicts_with = "melody")]
        file: Option<PathBuf>,
    },
    /// Add a diatonic third above every note
    Harmonize {
        melody: String,

        #[arg(short, long, default_value = "C")]
        key: String,
    },
    /// Print the combined multi-voice document of a built-in song
    Combine { song: String },
    /// List the built-in songs
    Songs,
    /// Print the trigger schedule for a built-in song
    Plan {
        song: String,

        #[arg(long)]
        tempo: Option<u32>,

        /// Leave out the organ doubling the bass
        #[arg(long)]
        no_organ: bool,

        /// Add a metronome click
        #[arg(long)]
        click: bool,
    },
    /// Play a built-in song against the logging backend
    Play {
        song: String,

        #[arg(long)]
        tempo: Option<u32>,

        #[arg(long)]
        no_organ: bool,

        #[arg(long)]
        click: bool,

        /// Play only this part
        #[arg(long)]
        voice: Option<VoicePart>,
    },
    /// Run the metronome
    Metronome {
        #[arg(long, default_value_t = 120)]
        bpm: u32,

        /// Time signature; the numerator sets the accent
        #[arg(long, default_value = "4/4")]
        meter: String,

        /// Number of clicks
        #[arg(long, default_value_t = 16)]
        beats: u32,
    },
}

fn print_output<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text());
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Await a play call, stopping the scheduler on Ctrl-C
async fn run_until_interrupted<F>(
    scheduler: &PlaybackScheduler<LoggingBackend>,
    play: F,
) -> Result<PlaybackOutcome>
where
    F: Future<Output = Result<PlaybackOutcome, MaestroError>>,
{
    tokio::pin!(play);
    let outcome = tokio::select! {
        outcome = &mut play => outcome?,
        _ = signal::ctrl_c() => {
            scheduler.stop_all().await?;
            play.await?
        }
    };
    Ok(outcome)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_ref())?;
    let json = cli.json;

    match cli.command {
        Commands::Parse {
            file,
            voice,
            durations,
            convention,
        } => {
            let abc = fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let mut options = config.abc_options();
            if let Some(convention) = convention {
                options.convention = convention;
            }
            let parsed = commands::parse_document(&abc, voice, durations, options);
            print_output(json, &parsed, || commands::format_voice(&parsed))?;
        }
        Commands::Solfa { text, key, octave } => {
            let parsed = commands::solfa(&text, &key, octave);
            print_output(json, &parsed, || commands::format_voice(&parsed))?;
        }
        Commands::Transpose {
            from,
            to,
            melody,
            file,
        } => {
            let result = match (melody, file) {
                (Some(melody), None) => commands::transpose(&melody, &from, &to, false),
                (None, Some(file)) => {
                    let abc = fs::read_to_string(&file)
                        .with_context(|| format!("reading {}", file.display()))?;
                    commands::transpose(&abc, &from, &to, true)
                }
                _ => bail!("give either a melody or --file"),
            };
            print_output(json, &result, || format!("{}\n", result))?;
        }
        Commands::Harmonize { melody, key } => {
            let result = commands::harmonize(&melody, &key)?;
            print_output(json, &result, || format!("{}\n", result))?;
        }
        Commands::Combine { song } => {
            let library = maestro_songs::builtin_library();
            let document = commands::combine(&library, &song)?;
            print_output(json, &document, || document.clone())?;
        }
        Commands::Songs => {
            let songs = commands::song_summaries(&maestro_songs::builtin_library());
            print_output(json, &songs, || commands::format_songs(&songs))?;
        }
        Commands::Plan {
            song,
            tempo,
            no_organ,
            click,
        } => {
            let library = maestro_songs::builtin_library();
            let song = commands::find_song(&library, &song)?;
            let options = PlanOptions {
                tempo,
                organ: !no_organ,
                click,
                voice: None,
            };
            let plan = commands::plan_song(song, options, &config);
            print_output(json, &plan, || commands::format_plan(&plan))?;
        }
        Commands::Play {
            song,
            tempo,
            no_organ,
            click,
            voice,
        } => {
            let library = maestro_songs::builtin_library();
            let song = commands::find_song(&library, &song)?;
            let options = PlanOptions {
                tempo,
                organ: !no_organ,
                click,
                voice,
            };
            let plan = commands::plan_song(song, options, &config);
            info!(song = %song.id, bpm = plan.bpm, "playing");

            let scheduler = PlaybackScheduler::new(LoggingBackend::new(), &config);
            let outcome = run_until_interrupted(&scheduler, scheduler.play_plan(plan)).await?;
            print_output(json, &outcome, || format!("{:?}\n", outcome))?;
        }
        Commands::Metronome { bpm, meter, beats } => {
            let meter: Meter = meter.parse()?;
            let metronome = Metronome::new(bpm).with_meter(&meter);
            info!(bpm = metronome.bpm(), beats_per_bar = metronome.beats_per_bar(), "metronome");

            let scheduler = PlaybackScheduler::new(LoggingBackend::new(), &config);
            let outcome =
                run_until_interrupted(&scheduler, scheduler.play_metronome(&metronome, beats)).await?;
            print_output(json, &outcome, || format!("{:?}\n", outcome))?;
        }
    }

    Ok(())
}
