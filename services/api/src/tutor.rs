//! Interactive terminal tutor.
//!
//! Reads one line at a time, treats a handful of words as commands and sends
//! everything else to the session. Answers stream to the output as they are
//! generated; speech is rendered afterwards when enabled.

use crate::config::TtsConfig;
use crate::voice::SharedLines;
use cadence_core::{
    AudioRenderRequest, PlaybackCoordinator, Reply, ResponseKind, Session, SessionError,
    SessionMode,
};
use std::io::Write;
use tokio::io::AsyncBufRead;
use tracing::{debug, warn};

pub const HELP_TEXT: &str = "\
Commands:
  quit, exit, bye  leave the tutor
  clear            forget the conversation so far
  single           answer each question on its own
  context          remember earlier questions (default)
  status           show mode, history and knowledge areas
  tts on | tts off turn spoken answers on or off
  help             show this list
Anything else is sent to the tutor.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Clear,
    Mode(SessionMode),
    Status,
    Speech(bool),
    Help,
    Ask(String),
    Nothing,
}

/// Interprets one line of input. Commands are case-insensitive.
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    match line.to_lowercase().as_str() {
        "" => Command::Nothing,
        "quit" | "exit" | "bye" => Command::Quit,
        "clear" => Command::Clear,
        "single" => Command::Mode(SessionMode::Isolated),
        "context" => Command::Mode(SessionMode::Contextual),
        "status" => Command::Status,
        "tts on" => Command::Speech(true),
        "tts off" => Command::Speech(false),
        "help" => Command::Help,
        _ => Command::Ask(line.to_string()),
    }
}

/// Speech settings the tutor can change at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechSettings {
    pub enabled: bool,
    pub save_audio: bool,
    /// Ask before playing in-domain answers.
    pub interactive: bool,
}

impl From<&TtsConfig> for SpeechSettings {
    fn from(config: &TtsConfig) -> Self {
        Self {
            enabled: config.enabled,
            save_audio: config.save_audio,
            interactive: config.interactive,
        }
    }
}

pub struct Tutor<W> {
    session: Session,
    playback: Option<PlaybackCoordinator>,
    speech: SpeechSettings,
    out: W,
}

impl<W: Write + Send> Tutor<W> {
    pub fn new(session: Session, out: W) -> Self {
        Self {
            session,
            playback: None,
            speech: SpeechSettings {
                enabled: false,
                save_audio: false,
                interactive: true,
            },
            out,
        }
    }

    pub fn with_playback(mut self, playback: PlaybackCoordinator, speech: SpeechSettings) -> Self {
        self.playback = Some(playback);
        self.speech = speech;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Runs the command loop until `quit` or end of input.
    pub async fn run<R>(&mut self, lines: SharedLines<R>) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        writeln!(self.out, "Music tutor ready. Type 'help' for commands.")?;
        loop {
            write!(self.out, "\nYou: ")?;
            self.out.flush()?;
            // The lock is released before answering so the playback prompt can read.
            let line = lines.lock().await.next_line().await?;
            let Some(line) = line else {
                writeln!(self.out)?;
                break;
            };
            if !self.handle_line(&line).await? {
                break;
            }
        }
        writeln!(self.out, "Goodbye!")?;
        Ok(())
    }

    /// Handles one line. Returns false when the tutor should stop.
    pub async fn handle_line(&mut self, line: &str) -> std::io::Result<bool> {
        match parse_command(line) {
            Command::Quit => return Ok(false),
            Command::Nothing => {}
            Command::Clear => {
                self.session.clear_history();
                writeln!(self.out, "Conversation history cleared.")?;
            }
            Command::Mode(mode) => {
                self.session.set_mode(mode);
                let description = match mode {
                    SessionMode::Isolated => "each question is answered on its own",
                    SessionMode::Contextual => "earlier questions are remembered",
                };
                writeln!(self.out, "Switched to {mode} mode: {description}.")?;
            }
            Command::Status => self.print_status()?,
            Command::Speech(enabled) => self.set_speech(enabled)?,
            Command::Help => writeln!(self.out, "{HELP_TEXT}")?,
            Command::Ask(text) => self.ask(&text).await?,
        }
        Ok(true)
    }

    /// Streams the answer to one question, then speaks it when enabled.
    pub async fn ask(&mut self, text: &str) -> std::io::Result<()> {
        write!(self.out, "Tutor: ")?;
        self.out.flush()?;

        let out = &mut self.out;
        let result = self
            .session
            .submit_streaming(text, |fragment| {
                if let Err(e) = out.write_all(fragment.as_bytes()).and_then(|_| out.flush()) {
                    debug!(error = %e, "failed to write response fragment");
                }
            })
            .await;
        writeln!(self.out)?;

        match result {
            Ok(reply) => self.speak(reply).await,
            Err(SessionError::EmptyInput) => Ok(()),
            Err(e) => {
                warn!(error = %e, "submission failed");
                writeln!(self.out, "[error] {e}")
            }
        }
    }

    async fn speak(&mut self, reply: Reply) -> std::io::Result<()> {
        if !self.speech.enabled {
            return Ok(());
        }
        let Some(playback) = &self.playback else {
            return Ok(());
        };

        // Declines are short, so they play without asking.
        let interactive = self.speech.interactive && reply.kind == ResponseKind::InDomain;
        let request = AudioRenderRequest {
            text: reply.text,
            kind: reply.kind,
            save_to_disk: self.speech.save_audio,
        };
        let outcome = playback.render(request, interactive).await;

        if let Some(path) = &outcome.saved_path {
            writeln!(self.out, "Audio saved to {}", path.display())?;
        }
        if let Some(failure) = &outcome.failure {
            writeln!(self.out, "[audio unavailable] {failure}")?;
        }
        Ok(())
    }

    fn set_speech(&mut self, enabled: bool) -> std::io::Result<()> {
        if enabled && self.playback.is_none() {
            return writeln!(
                self.out,
                "Text-to-speech is not available. Set OPENAI_API_KEY and restart with --enable-tts."
            );
        }
        self.speech.enabled = enabled;
        writeln!(
            self.out,
            "Text-to-speech {}.",
            if enabled { "enabled" } else { "disabled" }
        )
    }

    fn print_status(&mut self) -> std::io::Result<()> {
        let status = self.session.status();
        writeln!(self.out, "Mode: {}", status.mode)?;
        writeln!(
            self.out,
            "History: {} of {} turns",
            status.history_len, status.history_limit
        )?;
        writeln!(self.out, "Knowledge areas:")?;
        for pillar in &status.pillars {
            match &pillar.error {
                None => writeln!(self.out, "  {} ({} terms)", pillar.name, pillar.term_count)?,
                Some(error) => writeln!(self.out, "  {} unavailable: {error}", pillar.name)?,
            }
        }
        writeln!(self.out, "I can help with {}.", status.capabilities)?;
        let speech = match (self.playback.is_some(), self.speech.enabled) {
            (false, _) => "unavailable",
            (true, true) => "on",
            (true, false) => "off",
        };
        writeln!(self.out, "Text-to-speech: {speech}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cadence_core::{
        AudioClip, PlaybackPrompt, Registry, RenderError, ScriptedAdapter, ScriptedReply,
        SessionOptions, SpeechRenderer,
    };
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[derive(Default)]
    struct RecordingRenderer {
        played: Mutex<Vec<String>>,
        spoken: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SpeechRenderer for RecordingRenderer {
        async fn synthesize(&self, text: &str) -> Result<AudioClip, RenderError> {
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(AudioClip {
                samples: vec![0; 240],
                sample_rate: 24000,
            })
        }

        async fn play(&self, _clip: &AudioClip) -> Result<(), RenderError> {
            let last = self.spoken.lock().unwrap().last().cloned().unwrap_or_default();
            self.played.lock().unwrap().push(last);
            Ok(())
        }

        async fn save(&self, _clip: &AudioClip, _path: &Path) -> Result<(), RenderError> {
            Ok(())
        }
    }

    struct Answer(bool);

    #[async_trait]
    impl PlaybackPrompt for Answer {
        async fn confirm(&self, _kind: ResponseKind) -> bool {
            self.0
        }
    }

    fn tutor(adapter: ScriptedAdapter) -> Tutor<Vec<u8>> {
        let session = Session::new(
            Arc::new(Registry::builtin()),
            Arc::new(adapter),
            SessionOptions::default(),
        );
        Tutor::new(session, Vec::new())
    }

    fn output(tutor: &Tutor<Vec<u8>>) -> String {
        String::from_utf8(tutor.output().clone()).unwrap()
    }

    fn speech_on() -> SpeechSettings {
        SpeechSettings {
            enabled: true,
            save_audio: false,
            interactive: true,
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("  QUIT "), Command::Quit);
        assert_eq!(parse_command("bye"), Command::Quit);
        assert_eq!(parse_command("single"), Command::Mode(SessionMode::Isolated));
        assert_eq!(parse_command("Context"), Command::Mode(SessionMode::Contextual));
        assert_eq!(parse_command("tts on"), Command::Speech(true));
        assert_eq!(parse_command("tts off"), Command::Speech(false));
        assert_eq!(parse_command(""), Command::Nothing);
        assert_eq!(
            parse_command(" What is a Cadence? "),
            Command::Ask("What is a Cadence?".to_string())
        );
    }

    #[tokio::test]
    async fn test_answer_streams_and_is_remembered() {
        let mut tutor = tutor(ScriptedAdapter::replying("A cadence ends a phrase."));
        assert!(tutor.handle_line("What is a cadence?").await.unwrap());

        assert!(output(&tutor).contains("Tutor: A cadence ends a phrase.\n"));
        assert_eq!(tutor.session().history().len(), 2);
    }

    #[tokio::test]
    async fn test_generation_error_is_printed_not_recorded() {
        let mut tutor = tutor(ScriptedAdapter::new([ScriptedReply::Unavailable]));
        tutor.handle_line("What is a cadence?").await.unwrap();

        assert!(output(&tutor).contains("[error] generation backend unavailable"));
        assert!(tutor.session().history().is_empty());
    }

    #[tokio::test]
    async fn test_mode_and_clear_commands() {
        let mut tutor = tutor(ScriptedAdapter::replying("ok"));
        tutor.handle_line("What is an interval?").await.unwrap();
        tutor.handle_line("single").await.unwrap();
        assert_eq!(tutor.session().mode(), SessionMode::Isolated);
        assert_eq!(tutor.session().history().len(), 2);

        tutor.handle_line("clear").await.unwrap();
        assert!(tutor.session().history().is_empty());
        assert!(!tutor.handle_line("exit").await.unwrap());
    }

    #[tokio::test]
    async fn test_status_lists_pillars_and_speech() {
        let mut tutor = tutor(ScriptedAdapter::replying("ok"));
        tutor.handle_line("status").await.unwrap();
        tutor.handle_line("tts on").await.unwrap();

        let text = output(&tutor);
        assert!(text.contains("Mode: contextual"));
        assert!(text.contains("History: 0 of 12 turns"));
        assert!(text.contains("  notation-system ("));
        assert!(text.contains("Text-to-speech: unavailable"));
        assert!(text.contains("Text-to-speech is not available"));
    }

    #[tokio::test]
    async fn test_in_domain_answer_asks_before_playing() {
        let renderer = Arc::new(RecordingRenderer::default());
        let playback = PlaybackCoordinator::new(renderer.clone(), "audio_output")
            .with_prompt(Arc::new(Answer(false)));
        let mut tutor = tutor(ScriptedAdapter::new([
            ScriptedReply::Text("**Root** position.".to_string()),
            ScriptedReply::Text("I only teach music.".to_string()),
        ]))
        .with_playback(playback, speech_on());

        tutor.handle_line("What is a chord inversion?").await.unwrap();
        assert!(renderer.played.lock().unwrap().is_empty());

        // Declines play without asking.
        tutor.handle_line("What's 2+2?").await.unwrap();
        assert_eq!(
            *renderer.played.lock().unwrap(),
            vec!["I only teach music.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_tts_off_silences_answers() {
        let renderer = Arc::new(RecordingRenderer::default());
        let playback = PlaybackCoordinator::new(renderer.clone(), "audio_output")
            .with_prompt(Arc::new(Answer(true)));
        let mut tutor = tutor(ScriptedAdapter::replying("Play the root."))
            .with_playback(playback, speech_on());

        tutor.handle_line("tts off").await.unwrap();
        tutor.handle_line("What is a scale degree?").await.unwrap();
        assert!(renderer.spoken.lock().unwrap().is_empty());

        tutor.handle_line("tts on").await.unwrap();
        tutor.handle_line("What is a scale degree?").await.unwrap();
        assert_eq!(
            *renderer.played.lock().unwrap(),
            vec!["Play the root.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_run_until_quit() {
        let mut tutor = tutor(ScriptedAdapter::replying("Tonic, dominant."));
        let input: &'static [u8] = b"help\nWhat is a cadence?\nquit\nWhat is a scale?\n";
        let lines = Arc::new(tokio::sync::Mutex::new(BufReader::new(input).lines()));

        tutor.run(lines).await.unwrap();

        let text = output(&tutor);
        assert!(text.contains("Commands:"));
        assert!(text.contains("Tutor: Tonic, dominant."));
        assert!(text.ends_with("Goodbye!\n"));
        assert_eq!(tutor.session().history().len(), 2);
    }
}
