mod config;
mod gemini_adapter;
#[cfg(feature = "native-audio")]
mod native_io;
mod wav_io;

use crate::config::Config;
use crate::gemini_adapter::GeminiLiveConnector;
use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use interview_audio::LIVE_OUTPUT_SAMPLE_RATE;
use interview_core::backends::{open_graph_store, open_session_store};
use interview_core::context::graph_context;
use interview_core::credentials::CredentialProvider;
use interview_core::debrief::DebriefGenerator;
use interview_core::generative::GeminiTextClient;
use interview_core::graph_store::SkillGraphStore;
use interview_core::live::capture::{Microphone, RecordingState};
use interview_core::live::playback::{AudioOutput, Recording, SystemClock, TimelineOutput};
use interview_core::session_store::{SessionStore, fetch_with_retry};
use interview_core::{Difficulty, LiveSession, LiveStatus, SessionConfig, TranscriptTurn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing_subscriber::fmt::time::ChronoLocal;

/// Silence streamed after an input WAV so the endpoint detects the end of the answer.
const TRAILING_SILENCE: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(version, about = "Practice a job interview by voice")]
struct Cli {
    /// Position being interviewed for. Required unless resuming a session.
    #[arg(long)]
    role: Option<String>,
    #[arg(long, default_value = "medium")]
    difficulty: Difficulty,
    /// File containing the job description.
    #[arg(long)]
    jd_file: Option<PathBuf>,
    /// File containing the resume text.
    #[arg(long)]
    resume_file: Option<PathBuf>,
    #[arg(long, default_value = "local-user")]
    user: String,
    /// Resume an existing session instead of creating one.
    #[arg(long)]
    session_id: Option<String>,
    /// Use a WAV file as the microphone.
    #[arg(long)]
    input_wav: Option<PathBuf>,
    /// Write the interviewer's speech to this WAV file.
    #[arg(long)]
    output_wav: Option<PathBuf>,
    /// Start with the microphone muted.
    #[arg(long)]
    muted: bool,
    #[arg(long)]
    no_debrief: bool,
    /// Seconds to keep listening after the input ends.
    #[arg(long, default_value_t = 15)]
    linger: u64,
}

fn read_optional(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => Ok(String::new()),
    }
}

/// Creates the session record, or loads it when resuming.
async fn prepare_session(
    args: &Cli,
    sessions: &dyn SessionStore,
) -> Result<(String, String, SessionConfig)> {
    if let Some(id) = &args.session_id {
        let session = fetch_with_retry(sessions, id)
            .await
            .with_context(|| format!("Failed to load session {id}"))?;
        tracing::info!("Resuming session {} ({})", id, session.config.role);
        return Ok((session.id, session.user_id, session.config));
    }

    let role = args
        .role
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| anyhow!("--role is required when not resuming a session"))?;
    let config = SessionConfig::new(role, args.difficulty)
        .with_job_description(&read_optional(args.jd_file.as_deref())?)
        .with_resume(&read_optional(args.resume_file.as_deref())?);
    let id = sessions
        .create(&args.user, config.clone())
        .await
        .context("Failed to create session")?;
    tracing::info!("Created session {}", id);
    Ok((id, args.user.clone(), config))
}

async fn load_profile(graph: &dyn SkillGraphStore, user_id: &str) -> Option<String> {
    match graph_context(graph, user_id).await {
        Ok(Some(context)) => {
            tracing::info!(
                "Personalizing with {} known skills",
                context.weak_skills.len()
                    + context.intermediate_skills.len()
                    + context.expert_skills.len()
            );
            Some(context.summary)
        }
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("Could not read the skill graph, continuing without it: {}", e);
            None
        }
    }
}

type AudioIo = (Box<dyn Microphone>, Box<dyn AudioOutput>, Option<Recording>);

fn audio_io(args: &Cli) -> Result<AudioIo> {
    if let Some(input) = &args.input_wav {
        let output = TimelineOutput::new(SystemClock::default(), LIVE_OUTPUT_SAMPLE_RATE);
        let recording = output.recording();
        return Ok((
            Box::new(wav_io::WavMicrophone::new(input, TRAILING_SILENCE)),
            Box::new(output),
            Some(recording),
        ));
    }

    #[cfg(feature = "native-audio")]
    {
        Ok((
            Box::new(native_io::CpalMicrophone::new(None)),
            Box::new(native_io::CpalOutput::open(None)?),
            None,
        ))
    }
    #[cfg(not(feature = "native-audio"))]
    {
        bail!("--input-wav is required (built without the native-audio feature)")
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Drives the session until Ctrl-C, a terminal error, or the input has
/// ended and `linger` has passed.
async fn run(session: &mut LiveSession, linger: Duration) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut heard_input = false;
    let mut mic_warned = false;
    let mut deadline = None;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Ctrl-C received, ending the interview");
                break;
            }
            _ = until(deadline) => {
                tracing::info!("Input finished, ending the interview");
                break;
            }
            more = session.pump() => {
                if !more {
                    break;
                }
                if let LiveStatus::Error(reason) = session.status() {
                    tracing::error!("{}", reason);
                    break;
                }
                match session.recording_state() {
                    RecordingState::Active => heard_input = true,
                    RecordingState::Failed(reason) if !mic_warned => {
                        tracing::warn!("Microphone unavailable: {}", reason);
                        mic_warned = true;
                    }
                    RecordingState::Off if heard_input && !session.is_muted() && deadline.is_none() => {
                        deadline = Some(Instant::now() + linger);
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Appends every fragment to the session record as it arrives.
fn spawn_transcript_writer(
    sessions: Arc<dyn SessionStore>,
    session_id: String,
    mut rx: mpsc::UnboundedReceiver<TranscriptTurn>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(turn) = rx.recv().await {
            tracing::debug!("[{}] {}", turn.role.as_str(), turn.text);
            if let Err(e) = sessions.append_turn(&session_id, turn).await {
                tracing::warn!("Failed to save transcript fragment: {}", e);
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load application configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    tracing::info!("Configuration loaded successfully. Starting interviewer...");
    let args = Cli::parse();

    let sessions = open_session_store(config.mongo.as_ref())
        .await
        .context("Failed to open the session store")?;
    let graph = open_graph_store(config.neo4j.as_ref());

    let (session_id, user_id, session_config) = prepare_session(&args, sessions.as_ref()).await?;
    let profile = load_profile(graph.as_ref(), &user_id).await;

    let credentials = Arc::new(CredentialProvider::new(
        config.token_url.clone(),
        config.gemini_api_key.clone(),
    ));
    let mut connector = GeminiLiveConnector::new(&config.live_model, &config.voice);
    if let Some(endpoint) = &config.live_endpoint {
        connector = connector.with_endpoint(endpoint);
    }

    let (microphone, output, recording) = audio_io(&args)?;
    let (turn_tx, turn_rx) = mpsc::unbounded_channel();
    let writer = spawn_transcript_writer(sessions.clone(), session_id.clone(), turn_rx);

    let mut session = LiveSession::new(Arc::new(connector), credentials, microphone, output)
        .with_transcript_sink(turn_tx);
    if args.muted {
        session.set_muted(true).await;
    }

    session.connect(&session_config, profile.as_deref()).await;
    if let LiveStatus::Error(reason) = session.status() {
        bail!("Could not start the interview: {reason}");
    }
    run(&mut session, Duration::from_secs(args.linger)).await;

    let lines = session.transcript().to_vec();
    session.disconnect().await;
    drop(session);
    writer.await.context("Transcript writer task failed")?;

    println!("\n--- Transcript ---");
    for line in &lines {
        println!("[{}]: {}", line.speaker.as_str(), line.text);
    }

    if let (Some(recording), Some(path)) = (&recording, &args.output_wav) {
        wav_io::save_recording(recording, path)?;
    }

    sessions
        .mark_ended(&session_id)
        .await
        .context("Failed to mark the session completed")?;

    if args.no_debrief {
        return Ok(());
    }
    let Some(api_key) = config.gemini_api_key.clone() else {
        tracing::warn!("GEMINI_API_KEY not set, skipping the debrief");
        return Ok(());
    };
    let model = Arc::new(GeminiTextClient::new(api_key, config.text_model.clone()));
    let debrief = DebriefGenerator::new(model, sessions.clone(), graph.clone())
        .with_language(&config.debrief_language)
        .generate(&session_id)
        .await
        .context("Failed to generate the debrief")?;

    println!("\n--- Debrief (overall {}) ---", debrief.scores.overall);
    println!("{}", serde_json::to_string_pretty(&debrief)?);
    Ok(())
}
