// src/main.rs
//
// Native tools for recording documents: inspect, render to WAV, and write a
// demo take.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use keytone::{Keyboard, KeyboardConfig, Note, OfflineHost, OutputSpec, RecordedEvent};

/// Frames rendered per tick.
const BLOCK_FRAMES: usize = 256;

/// Upper bound on rendered audio after the last event.
const MAX_TAIL_MS: f64 = 10_000.0;

#[derive(Parser)]
#[command(name = "keytone")]
#[command(about = "Virtual keyboard recording tools", long_about = None)]
struct Cli {
    /// JSON config overriding envelope and playback defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print recording metadata
    Info {
        /// Recording document (.json)
        file: PathBuf,
    },

    /// Play a recording through the engine and write a WAV file
    Render {
        /// Recording document (.json)
        file: PathBuf,

        /// Output WAV file path
        #[arg(short, long)]
        output: PathBuf,

        /// Sample rate in Hz (default: 48000)
        #[arg(short, long, default_value = "48000")]
        sample_rate: u32,
    },

    /// Record a short scripted phrase and save it
    Demo {
        /// Output document path
        #[arg(short, long, default_value = "demo.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { file } => info_cmd(&file),
        Commands::Render {
            file,
            output,
            sample_rate,
        } => render_cmd(config, &file, &output, sample_rate),
        Commands::Demo { output } => demo_cmd(config, &output),
    }
}

fn load_config(path: Option<&Path>) -> Result<KeyboardConfig> {
    let Some(path) = path else {
        return Ok(KeyboardConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    KeyboardConfig::from_json_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))
}

fn info_cmd(file: &Path) -> Result<()> {
    let text = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let session = keytone::from_json(&text).with_context(|| format!("loading {}", file.display()))?;

    let malformed = session
        .events()
        .iter()
        .filter(|e| matches!(e, RecordedEvent::Malformed { .. }))
        .count();

    println!("version:   {}", session.version());
    println!("date:      {}", session.created_at().to_rfc3339());
    println!("duration:  {:.1} ms", session.duration());
    println!("events:    {}", session.event_count());
    if malformed > 0 {
        println!("malformed: {malformed}");
    }
    Ok(())
}

fn render_cmd(config: KeyboardConfig, file: &Path, output: &Path, sample_rate: u32) -> Result<()> {
    let text = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;

    let mut keyboard = Keyboard::new(config, Rc::new(()));
    let mut host = OfflineHost::new(OutputSpec {
        sample_rate: sample_rate as f64,
        channels: 1,
    });
    keyboard.initialize(&mut host)?;

    let session = keyboard
        .load(&text)
        .with_context(|| format!("loading {}", file.display()))?;
    if !keyboard.play() {
        anyhow::bail!("{} has no events to play", file.display());
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(output, spec)
        .with_context(|| format!("creating {}", output.display()))?;

    let block_ms = BLOCK_FRAMES as f64 * 1_000.0 / sample_rate as f64;
    let limit = session.duration() + MAX_TAIL_MS;
    let mut block = vec![0.0f32; BLOCK_FRAMES];
    let mut now = 0.0;

    while now <= limit {
        keyboard.tick(now);
        if !keyboard.is_playing() && keyboard.state().connected_tones == 0 {
            break;
        }

        keyboard.render(&mut block);
        for sample in &block {
            writer.write_sample(*sample)?;
        }
        now += block_ms;
    }

    writer.finalize()?;
    info!(
        "rendered {:.2} s of {} to {}",
        now / 1_000.0,
        file.display(),
        output.display()
    );
    Ok(())
}

enum Key {
    Down(Note, f64),
    Up(Note),
}

fn demo_cmd(config: KeyboardConfig, output: &Path) -> Result<()> {
    let mut keyboard = Keyboard::new(config, Rc::new(()));
    keyboard.initialize(&mut OfflineHost::default())?;

    // C major arpeggio, then the chord held together.
    let phrase: [(i64, f64, f64, f64); 7] = [
        (60, 0.8, 0.0, 240.0),
        (64, 0.7, 250.0, 490.0),
        (67, 0.7, 500.0, 740.0),
        (72, 0.9, 750.0, 1_200.0),
        (60, 0.6, 1_300.0, 2_200.0),
        (64, 0.6, 1_300.0, 2_200.0),
        (67, 0.6, 1_300.0, 2_200.0),
    ];

    let mut script = Vec::with_capacity(phrase.len() * 2);
    for (id, velocity, down, up) in phrase {
        let note = Note::new(id)?;
        script.push((down, Key::Down(note, velocity)));
        script.push((up, Key::Up(note)));
    }
    script.sort_by(|a, b| a.0.total_cmp(&b.0));

    keyboard.start_recording();
    for (at, key) in script {
        match key {
            Key::Down(note, velocity) => keyboard.press_at(note, velocity, at),
            Key::Up(note) => keyboard.release_at(note, at),
        };
    }
    keyboard.stop_recording();

    let text = keyboard.save()?;
    fs::write(output, text).with_context(|| format!("writing {}", output.display()))?;
    println!("wrote demo recording to {}", output.display());
    Ok(())
}
