//! Interactive terminal music tutor.
//!
//! Uses the same environment configuration as the API service, with command
//! line flags applied on top. Answers stream to stdout and logs go to stderr.

use anyhow::{Context, bail};
use cadence_api::{
    config::Config,
    startup::{build_adapter, init_tracing, load_registry, load_system_prompt},
    tutor::{SpeechSettings, Tutor},
    voice::{SpeechBackend, TerminalPrompt},
};
use cadence_core::{PlaybackCoordinator, Session, SessionMode};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "tutor", version, about = "A music theory tutor in your terminal")]
struct Cli {
    /// Answer a single question and exit.
    #[arg(long)]
    prompt: Option<String>,
    /// Chat model to use instead of CHAT_MODEL.
    #[arg(long)]
    model: Option<String>,
    /// Answer each question on its own, without conversation history.
    #[arg(long)]
    single_mode: bool,
    /// Number of turns of history to keep.
    #[arg(long)]
    context_limit: Option<usize>,
    /// Answer questions on any topic.
    #[arg(long)]
    allow_all_topics: bool,
    /// Prefer short answers.
    #[arg(long)]
    concise: bool,
    #[arg(long)]
    temperature: Option<f32>,
    #[arg(long)]
    max_tokens: Option<u32>,
    /// Speak answers aloud.
    #[arg(long)]
    enable_tts: bool,
    /// Save spoken answers as WAV files.
    #[arg(long)]
    save_audio: bool,
    #[arg(long)]
    audio_output_dir: Option<PathBuf>,
    #[arg(long)]
    tts_voice: Option<String>,
    /// Play answers without asking first.
    #[arg(long)]
    no_interactive_audio: bool,
    /// Keep off-topic exchanges in the conversation history.
    #[arg(long)]
    record_declines: bool,
}

impl Cli {
    fn apply(self, config: &mut Config) -> anyhow::Result<Option<String>> {
        if let Some(model) = self.model {
            config.chat_model = model;
        }
        if self.single_mode {
            config.session_mode = SessionMode::Isolated;
        }
        if let Some(limit) = self.context_limit {
            config.history_limit = limit;
        }
        config.allow_all_topics |= self.allow_all_topics;
        config.record_declines |= self.record_declines;
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                bail!("--temperature must be between 0.0 and 2.0, got {temperature}");
            }
            config.generation.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.generation.max_tokens = max_tokens;
        }
        if self.concise {
            config.concise = true;
            config.generation = config.generation.concise();
        }

        config.tts.enabled |= self.enable_tts;
        config.tts.save_audio |= self.save_audio;
        if let Some(dir) = self.audio_output_dir {
            config.tts.output_dir = dir;
        }
        if let Some(voice) = self.tts_voice {
            config.tts.voice = voice;
        }
        if self.no_interactive_audio {
            config.tts.interactive = false;
        }

        config.validate()?;
        Ok(self.prompt)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env().context("Failed to load configuration")?;
    let single_prompt = cli.apply(&mut config)?;

    init_tracing(&config, true);
    info!(mode = %config.session_mode, model = %config.chat_model, "Starting tutor");

    let registry = Arc::new(load_registry(&config));
    let system_prompt = load_system_prompt(&config.prompts_path)?;
    let adapter = build_adapter(&config);
    if let Err(e) = adapter.check_connection().await {
        warn!(error = %e, "Generation backend not reachable");
        eprintln!("Warning: could not reach the generation backend: {e}");
    }

    let session = Session::with_instructions(
        registry,
        Arc::new(adapter),
        Arc::new(system_prompt),
        config.session_options(),
    );

    let lines = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));
    let mut tutor = Tutor::new(session, std::io::stdout());

    if config.tts.enabled {
        match SpeechBackend::from_config(&config.tts, config.openai_api_key.as_deref()) {
            Ok(backend) => {
                let prompt = TerminalPrompt::new(
                    lines.clone(),
                    tokio::io::stdout(),
                    config.tts.prompt_timeout,
                );
                let playback =
                    PlaybackCoordinator::new(Arc::new(backend), config.tts.output_dir.clone())
                        .with_prompt(Arc::new(prompt));
                tutor = tutor.with_playback(playback, SpeechSettings::from(&config.tts));
            }
            Err(e) => {
                warn!(error = %e, "Text-to-speech disabled");
                eprintln!("Warning: text-to-speech disabled: {e}");
            }
        }
    }

    match single_prompt {
        Some(question) => tutor.ask(&question).await?,
        None => tutor.run(lines).await?,
    }
    Ok(())
}
