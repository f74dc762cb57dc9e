use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use tutor_assistant::voice::{
    AudioCapture, AudioClip, AudioPlayback, LanguageDetector, WhatlangDetector, calculate_energy,
};
use tutor_assistant::{
    Assistant, Config, Role, Session, Transcript, TurnEvent, TurnInput, TurnOutcome, UserIdentity,
};

/// Tutor - a teaching assistant you can type or talk to
#[derive(Parser)]
#[command(name = "tutor", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print replies without speaking them
    #[arg(long, global = true)]
    mute: bool,

    /// Disable voice features (for machines without audio hardware)
    #[arg(long, env = "TUTOR_DISABLE_VOICE", global = true)]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive conversation (default)
    Chat,
    /// Ask a single question
    Ask {
        /// Question text
        #[arg(required_unless_present = "audio", conflicts_with = "audio")]
        text: Option<String>,
        /// Recorded question (16-bit mono WAV)
        #[arg(long)]
        audio: Option<PathBuf>,
    },
    /// Show stored conversation history
    History {
        /// User ID printed at the start of a session; omit to list users
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Describe the assistant
    About,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,tutor_assistant=info",
        1 => "info,tutor_assistant=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let command = cli.command.unwrap_or(Command::Chat);

    match command {
        Command::About => {
            about();
            return Ok(());
        }
        Command::TestMic { duration } => return test_mic(duration).await,
        _ => {}
    }

    // Credentials are read once; a missing one stops here
    let config = Config::load_with_options(cli.disable_voice)?;
    tracing::debug!(?config, "loaded configuration");

    let (tx, rx) = mpsc::unbounded_channel();
    let assistant = Assistant::new(config)?.with_events(tx);

    match command {
        Command::Chat => chat(&assistant, rx, cli.mute).await,
        Command::Ask { text, audio } => ask(&assistant, rx, text, audio, cli.mute).await,
        Command::History { user } => history(&assistant, user.as_deref()),
        Command::TestTts { text } => test_tts(&assistant, &text).await,
        Command::About | Command::TestMic { .. } => Ok(()),
    }
}

/// Interactive loop: one line per turn
async fn chat(
    assistant: &Assistant,
    mut events: mpsc::UnboundedReceiver<TurnEvent>,
    mute: bool,
) -> anyhow::Result<()> {
    let mut session = assistant.start_session();

    println!("Welcome to the Teaching Assistant");
    println!("Session: {}", session.identity());
    println!("Type a question, /voice to speak, /history, or /quit\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let input = match line.trim() {
            "/quit" | "/exit" => break,
            "/history" => {
                print_transcript(session.transcript());
                continue;
            }
            "/voice" => {
                if !assistant.voice_enabled() {
                    println!("Voice is disabled.");
                    continue;
                }
                println!(
                    "Listening (up to {}s)...",
                    assistant.capture_timeout().as_secs()
                );
                TurnInput::Microphone
            }
            _ => TurnInput::Text(line),
        };

        let outcome = run_turn(assistant, &mut session, input, &mut events).await;
        finish_turn(outcome, mute).await;
    }

    tracing::info!(user = %session.identity(), turns = session.transcript().len(), "session ended");
    Ok(())
}

/// One-shot question
async fn ask(
    assistant: &Assistant,
    mut events: mpsc::UnboundedReceiver<TurnEvent>,
    text: Option<String>,
    audio: Option<PathBuf>,
    mute: bool,
) -> anyhow::Result<()> {
    let input = match (text, audio) {
        (_, Some(path)) => TurnInput::Voice(AudioClip::wav(tokio::fs::read(&path).await?)),
        (Some(text), None) => TurnInput::Text(text),
        (None, None) => anyhow::bail!("nothing to ask"),
    };

    let mut session = assistant.start_session();
    let outcome = run_turn(assistant, &mut session, input, &mut events).await;
    let failed = matches!(outcome, TurnOutcome::Failed(_));
    finish_turn(outcome, mute).await;

    println!("(user {})", session.identity());
    if failed {
        anyhow::bail!("turn failed");
    }
    Ok(())
}

/// Run a turn while rendering its events as they arrive
async fn run_turn(
    assistant: &Assistant,
    session: &mut Session,
    input: TurnInput,
    events: &mut mpsc::UnboundedReceiver<TurnEvent>,
) -> TurnOutcome {
    let turn = assistant.run_turn(session, input);
    tokio::pin!(turn);

    let outcome = loop {
        tokio::select! {
            biased;
            Some(event) = events.recv() => render(event),
            outcome = &mut turn => break outcome,
        }
    };

    while let Ok(event) = events.try_recv() {
        render(event);
    }
    outcome
}

fn render(event: TurnEvent) {
    match event {
        TurnEvent::Fragment(fragment) => {
            print!("{fragment}");
            let _ = std::io::stdout().flush();
        }
        TurnEvent::Transcribed(text) => println!("Transcribed text: {text}"),
        TurnEvent::Warning(message) => eprintln!("warning: {message}"),
        TurnEvent::State(state) => tracing::trace!(%state, "turn state"),
    }
}

async fn finish_turn(outcome: TurnOutcome, mute: bool) {
    match outcome {
        TurnOutcome::Completed(report) => {
            println!();
            if let Some(clip) = report.audio.filter(|_| !mute) {
                play(clip).await;
            }
        }
        TurnOutcome::Failed(e) => eprintln!("{}", e.user_message()),
        // Warnings were already rendered from events
        TurnOutcome::Skipped(_) => {}
    }
}

async fn play(clip: AudioClip) {
    let result =
        tokio::task::spawn_blocking(move || AudioPlayback::new()?.play_clip(&clip)).await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "playback failed"),
        Err(e) => tracing::warn!(error = %e, "playback task failed"),
    }
}

fn print_transcript(transcript: &Transcript) {
    if transcript.is_empty() {
        println!("(no messages yet)");
        return;
    }
    for turn in transcript.turns() {
        let who = match turn.role {
            Role::User => "You",
            Role::Assistant => "Tutor",
        };
        println!("{who}: {}", turn.content);
    }
}

fn history(assistant: &Assistant, user: Option<&str>) -> anyhow::Result<()> {
    let Some(user) = user else {
        let users = assistant.users()?;
        if users.is_empty() {
            println!("No stored conversations.");
        }
        for user in users {
            println!("{user}");
        }
        return Ok(());
    };

    match assistant.history(&UserIdentity::from_existing(user))? {
        Some(stored) => {
            println!(
                "User {} (started {}, updated {})\n",
                stored.user_id,
                stored.created_at.format("%Y-%m-%d %H:%M"),
                stored.updated_at.format("%Y-%m-%d %H:%M")
            );
            print_transcript(&stored.transcript);
        }
        None => println!("No history for {user}"),
    }
    Ok(())
}

fn about() {
    println!("Tutor - a teaching assistant powered by a streaming language model.");
    println!("Ask questions by typing or speaking; replies are read aloud in the");
    println!("language you asked in, and each conversation is saved per user.");
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Sample rate: {} Hz", capture.sample_rate());
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check that the default input device is set.");

    Ok(())
}

/// Synthesize and play a phrase in its detected language
async fn test_tts(assistant: &Assistant, text: &str) -> anyhow::Result<()> {
    let Some(synthesizer) = assistant.synthesizer() else {
        anyhow::bail!("voice is disabled; check the speech API keys");
    };

    let language = WhatlangDetector.detect(text).unwrap_or_else(|_| "en".to_string());
    println!("Synthesizing \"{text}\" ({language})...");

    let clip = synthesizer.synthesize(text, &language).await?;
    println!("Got {} bytes of audio data", clip.bytes().len());

    println!("Playing audio...");
    play(clip).await;
    Ok(())
}
