//! Terminal decision prompt shown before audio is played.

use async_trait::async_trait;
use cadence_core::{PlaybackPrompt, ResponseKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const PROMPT_TEXT: &str = "Press [ENTER] to play audio, or type 'skip': ";

/// Lines of user input, shared with the tutor's command loop so both read
/// from the same buffer.
pub type SharedLines<R> = Arc<Mutex<Lines<R>>>;

/// An empty line plays. Anything else, end of input included, declines.
pub fn wants_playback(answer: Option<&str>) -> bool {
    matches!(answer, Some(line) if line.trim().is_empty())
}

pub struct TerminalPrompt<R, W> {
    input: SharedLines<R>,
    output: Mutex<W>,
    timeout: Option<Duration>,
}

impl<R, W> TerminalPrompt<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(input: SharedLines<R>, output: W, timeout: Option<Duration>) -> Self {
        Self {
            input,
            output: Mutex::new(output),
            timeout,
        }
    }

    async fn read_answer(&self) -> Option<String> {
        let mut lines = self.input.lock().await;
        let next = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, lines.next_line()).await {
                Ok(line) => line,
                Err(_) => {
                    debug!(timeout_secs = limit.as_secs(), "playback prompt timed out");
                    return None;
                }
            },
            None => lines.next_line().await,
        };
        match next {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to read playback answer");
                None
            }
        }
    }
}

#[async_trait]
impl<R, W> PlaybackPrompt for TerminalPrompt<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm(&self, kind: ResponseKind) -> bool {
        {
            let mut output = self.output.lock().await;
            let written = async {
                output.write_all(PROMPT_TEXT.as_bytes()).await?;
                output.flush().await
            };
            if let Err(e) = written.await {
                warn!(error = %e, "failed to show playback prompt");
            }
        }
        let answer = self.read_answer().await;
        let play = wants_playback(answer.as_deref());
        debug!(%kind, play, "playback decision");
        play
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};

    fn prompt(
        input: &'static [u8],
        timeout: Option<Duration>,
    ) -> TerminalPrompt<BufReader<&'static [u8]>, Vec<u8>> {
        let lines = Arc::new(Mutex::new(BufReader::new(input).lines()));
        TerminalPrompt::new(lines, Vec::new(), timeout)
    }

    #[test]
    fn test_decision_rules() {
        assert!(wants_playback(Some("")));
        assert!(wants_playback(Some("  ")));
        assert!(!wants_playback(Some("skip")));
        assert!(!wants_playback(Some("no thanks")));
        assert!(!wants_playback(None));
    }

    #[tokio::test]
    async fn test_enter_plays_and_shows_prompt() {
        let prompt = prompt(b"\n", None);
        assert!(prompt.confirm(ResponseKind::InDomain).await);
        let shown = prompt.output.lock().await.clone();
        assert_eq!(String::from_utf8(shown).unwrap(), PROMPT_TEXT);
    }

    #[tokio::test]
    async fn test_skip_declines() {
        assert!(!prompt(b"skip\n", None).confirm(ResponseKind::InDomain).await);
    }

    #[tokio::test]
    async fn test_end_of_input_declines() {
        assert!(!prompt(b"", None).confirm(ResponseKind::InDomain).await);
    }

    #[tokio::test]
    async fn test_answers_are_consumed_in_order() {
        let prompt = prompt(b"skip\n\n", None);
        assert!(!prompt.confirm(ResponseKind::InDomain).await);
        assert!(prompt.confirm(ResponseKind::InDomain).await);
        assert!(!prompt.confirm(ResponseKind::InDomain).await);
    }

    #[tokio::test]
    async fn test_silence_times_out_as_skip() {
        let (reader, _writer) = tokio::io::duplex(64);
        let lines = Arc::new(Mutex::new(BufReader::new(reader).lines()));
        let prompt = TerminalPrompt::new(lines, Vec::new(), Some(Duration::from_millis(20)));
        assert!(!prompt.confirm(ResponseKind::InDomain).await);
    }
}
