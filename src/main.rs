use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use neptr::clock::SystemClock;
use neptr::daemon::{build_reply_service, build_speaker};
use neptr::session::SessionMode;
use neptr::voice::{AudioSource, EnergyVad, FrameBuffer, MicrophoneSource};
use neptr::{Daemon, Settings};

/// NEPTR - the Not Evil Pie-Throwing Robot voice assistant
#[derive(Parser)]
#[command(name = "neptr", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/neptr/config.toml)
    #[arg(short, long, env = "NEPTR_CONFIG")]
    config: Option<PathBuf>,

    /// Session mode after the wake phrase ("conversation" or "command")
    #[arg(short, long)]
    mode: Option<SessionMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show live microphone levels
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Speak a phrase through the configured TTS engine
    TestSpeaker {
        /// Text to speak
        #[arg(default_value = "Hello! I am NEPTR, your friendly pie-throwing robot!")]
        text: String,
    },
    /// Chat by typing instead of talking
    Chat {
        /// Also speak each reply
        #[arg(long)]
        speak: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,neptr=info",
        1 => "info,neptr=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(mode) = cli.mode {
        settings.session.mode = mode;
    }
    tracing::debug!(?settings, "loaded configuration");

    let Some(command) = cli.command else {
        tracing::info!(mode = ?settings.session.mode, "starting neptr");
        Daemon::new(settings).run().await?;
        return Ok(());
    };

    // Every diagnostic below blocks on audio or HTTP
    tokio::task::spawn_blocking(move || match command {
        Command::TestMic { duration } => test_mic(&settings, duration),
        Command::TestSpeaker { text } => test_speaker(&settings, &text),
        Command::Chat { speak } => chat(&settings, speak),
    })
    .await?
}

/// Print a live RMS meter from the microphone
fn test_mic(settings: &Settings, duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let buffer = FrameBuffer::new(settings.audio.queue_capacity);
    let mut source = MicrophoneSource::new(settings.audio.sample_rate, settings.audio.frame_size)?;
    source.open(buffer.clone())?;

    let vad = EnergyVad::new(settings.audio.vad_threshold);
    println!(
        "Sample rate: {} Hz | threshold: {:.0}",
        settings.audio.sample_rate,
        vad.threshold()
    );
    println!("---");

    let start = Instant::now();
    let deadline = start + Duration::from_secs(duration);
    while Instant::now() < deadline {
        let Some(frame) = buffer.pop(Duration::from_millis(250)) else {
            continue;
        };
        let decision = vad.classify(&frame);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (decision.energy / 40.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:4.1}s] RMS: {:7.1} | [{}] {}",
            start.elapsed().as_secs_f32(),
            decision.energy,
            meter,
            if decision.is_voice { "voice" } else { "" }
        );
    }

    source.close();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS never crossed the threshold, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: arecord -l (to list devices)");
    println!("  3. Lower audio.rms_silence_threshold in config.toml");

    Ok(())
}

/// Speak a phrase through the configured engine
fn test_speaker(settings: &Settings, text: &str) -> anyhow::Result<()> {
    println!("Testing {:?} TTS with text: \"{text}\"\n", settings.tts.engine);

    let mut speaker = build_speaker(settings)?;
    speaker.speak(text)?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");
    Ok(())
}

/// Typed conversation through the same reply path the voice loop uses
fn chat(settings: &Settings, speak: bool) -> anyhow::Result<()> {
    let mut replies = build_reply_service(settings, Arc::new(SystemClock))?;
    let mut speaker = if speak { Some(build_speaker(settings)?) } else { None };

    let name = &settings.personality.name;
    println!("Type to chat with {name}! Type 'quit' or 'exit' to leave.\n");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut lines = stdin.lock().lines();
    loop {
        print!("You: ");
        stdout.flush()?;

        let Some(line) = lines.next().transpose()? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line.to_lowercase().as_str(), "quit" | "exit" | "bye") {
            break;
        }

        let reply = replies.reply(line);
        println!("{name}: {reply}");
        if let Some(speaker) = speaker.as_mut()
            && let Err(e) = speaker.speak(&reply)
        {
            tracing::warn!(error = %e, "speech output failed");
        }
    }

    replies.end_session();
    println!("{name}: Goodbye! It was great chatting with you!");
    Ok(())
}
