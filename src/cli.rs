//! CLI front end: runs one survey session over stdin/stdout.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::error::Error;
use crate::survey::{AnswerKind, ExpectedInput, SessionManager, SystemReaction};

const QUIT_COMMAND: &str = "/quit";
const SKIP_COMMAND: &str = "skip";

/// Interactive REPL over a `SessionManager`.
pub struct SurveyCli {
    manager: Arc<SessionManager>,
}

/// Input hint shown before reading a line.
fn prompt_hint(expects: ExpectedInput) -> &'static str {
    match expects {
        ExpectedInput::Consent => "[full / anonymous / declined] > ",
        ExpectedInput::Scale => "[1-5] > ",
        ExpectedInput::YesNo => "[yes / no] > ",
        ExpectedInput::FreeText => "> ",
        ExpectedInput::AdditionalFeedback => "[feedback, or 'skip'] > ",
        ExpectedInput::None => "",
    }
}

/// Whether a line typed at an answer prompt is meant as the answer.
///
/// Anything else is chat about the question. Bare numbers always count as
/// answer attempts so an out-of-range scale value is reported, not chatted.
fn is_answer_attempt(expects: ExpectedInput, line: &str) -> bool {
    match expects {
        ExpectedInput::Consent => true,
        ExpectedInput::Scale => {
            AnswerKind::Scale.normalize(line).is_some() || line.chars().all(|c| c.is_ascii_digit())
        }
        ExpectedInput::YesNo => AnswerKind::YesNo.normalize(line).is_some(),
        _ => false,
    }
}

impl SurveyCli {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    /// Run a session for `user_name` on the process's stdin and stdout.
    pub async fn run(&self, user_name: &str) -> Result<(), Error> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        self.drive(user_name, stdin, &mut stdout).await
    }

    /// Run a session reading lines from `input` and writing turns to `output`.
    ///
    /// Returns when the survey completes, the user types `/quit`, or input
    /// ends. The session is always torn down on return.
    pub async fn drive<R, W>(&self, user_name: &str, input: R, output: &mut W) -> Result<(), Error>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let started = self.manager.start_session(user_name).await;
        let session_id = started.session_id;
        let mut expects = write_reaction(output, &started.reaction).await?;

        let result = self.read_loop(session_id, input, output, &mut expects).await;
        if let Err(e) = self.manager.end_session(session_id).await {
            tracing::debug!(%session_id, error = %e, "Session already gone");
        }
        result
    }

    async fn read_loop<R, W>(
        &self,
        session_id: Uuid,
        input: R,
        output: &mut W,
        expects: &mut ExpectedInput,
    ) -> Result<(), Error>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();

        while *expects != ExpectedInput::None {
            output.write_all(prompt_hint(*expects).as_bytes()).await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break; // EOF
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == QUIT_COMMAND {
                output.write_all(b"Goodbye.\n").await?;
                break;
            }

            let result = match *expects {
                ExpectedInput::Consent => self.manager.submit_primary_answer(session_id, line).await,
                ExpectedInput::Scale | ExpectedInput::YesNo if is_answer_attempt(*expects, line) => {
                    self.manager.submit_primary_answer(session_id, line).await
                }
                ExpectedInput::Scale | ExpectedInput::YesNo | ExpectedInput::FreeText => {
                    self.manager.submit_free_text(session_id, line).await
                }
                ExpectedInput::AdditionalFeedback => {
                    let feedback = (!line.eq_ignore_ascii_case(SKIP_COMMAND)).then(|| line.to_string());
                    self.manager
                        .submit_additional_feedback(session_id, feedback)
                        .await
                }
                ExpectedInput::None => break,
            };

            let reaction = result?;
            if let Some(reason) = &reaction.rejection {
                output
                    .write_all(format!("⚠️  {reason}\n").as_bytes())
                    .await?;
                continue;
            }
            *expects = write_reaction(output, &reaction).await?;
        }

        Ok(())
    }
}

async fn write_reaction<W>(output: &mut W, reaction: &SystemReaction) -> Result<ExpectedInput, Error>
where
    W: AsyncWrite + Unpin,
{
    for turn in &reaction.turns {
        output
            .write_all(format!("\n{}\n\n", turn.text).as_bytes())
            .await?;
    }
    output.flush().await?;
    Ok(reaction.expects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SurveyConfig;
    use crate::survey::{OfflineGenerator, Phase, prompts};

    fn cli() -> (SurveyCli, Arc<SessionManager>) {
        let manager = Arc::new(SessionManager::new(
            Arc::new(OfflineGenerator),
            SurveyConfig::default(),
        ));
        (SurveyCli::new(Arc::clone(&manager)), manager)
    }

    async fn transcript_of(input: &str) -> String {
        let (cli, manager) = cli();
        let mut output = Vec::new();
        cli.drive("Rahul", input.as_bytes(), &mut output)
            .await
            .unwrap();
        assert_eq!(manager.session_count().await, 0);
        String::from_utf8(output).unwrap()
    }

    #[tokio::test]
    async fn declining_ends_the_session() {
        let out = transcript_of("declined\nthis line is never read\n").await;
        assert!(out.contains("Hi Rahul!"));
        assert!(out.contains("PSPersonal.Assistant@PS.com"));
        assert!(!out.contains("[1-5]"));
    }

    #[tokio::test]
    async fn invalid_answers_are_reported_and_retried() {
        let out = transcript_of("maybe\nfull\n9\n3\n/quit\n").await;
        assert!(out.contains("not valid for phase consent"));
        assert!(out.contains("not valid for phase question_1"));
        // The retry was accepted, so a follow-up prompt followed.
        assert!(out.contains("Thank you for sharing that with me."));
        assert!(out.contains("Goodbye."));
    }

    #[tokio::test]
    async fn text_at_an_answer_prompt_is_chat() {
        let out = transcript_of("full\nwork has been hectic lately\n/quit\n").await;
        // Acknowledged with its question stripped, then straight on to question 2.
        assert!(out.contains("Thank you for sharing that with me.\n"));
        assert!(!out.contains("Could you tell me more"));
        assert!(out.contains(prompts::question_text(Phase::Question2)));
        assert!(out.contains("[yes / no] > "));
    }

    #[tokio::test]
    async fn full_offline_walkthrough_completes() {
        // Offline fallbacks: q1 asks for more, q2-q4 are statements.
        let input = "full\n4\nthe team\nnext\nno\nnext\n4\nnext\nyes\nnext\n5\n";
        let out = transcript_of(input).await;
        assert!(out.contains("Thank you so much for sharing all of that with me, Rahul."));
    }

    #[test]
    fn answer_attempts_by_expected_input() {
        assert!(is_answer_attempt(ExpectedInput::Scale, "4"));
        assert!(is_answer_attempt(ExpectedInput::Scale, "9"));
        assert!(!is_answer_attempt(ExpectedInput::Scale, "pretty good"));
        assert!(is_answer_attempt(ExpectedInput::YesNo, "Yes"));
        assert!(!is_answer_attempt(ExpectedInput::YesNo, "not really sure"));
        assert!(is_answer_attempt(ExpectedInput::Consent, "whatever"));
        assert!(!is_answer_attempt(ExpectedInput::FreeText, "3"));
    }

    #[test]
    fn hints_match_expected_input() {
        assert_eq!(prompt_hint(ExpectedInput::Scale), "[1-5] > ");
        assert_eq!(prompt_hint(ExpectedInput::None), "");
    }
}
