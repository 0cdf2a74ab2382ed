//! Greedy generation driven by an [`InferenceEngine`].
//!
//! Each step feeds the prompt plus everything generated so far, takes the
//! logits of the last position, and appends the most probable token. A run
//! stops after `max_tokens` steps or once the end-of-sequence id is produced.

use crate::engine::{last_position_logits, InferenceEngine, ModelInputs};
use crate::error::GenerateError;
use crate::numeric::{argmax, softmax};
use crate::tokenizer::{Cleanup, Tokenizer};

/// `</s>` in the bundled vocabulary.
pub const DEFAULT_EOS_ID: u32 = 2;

/// Positive number of tokens a request may generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget(usize);

impl TokenBudget {
    pub fn new(max_tokens: usize) -> Option<Self> {
        (max_tokens > 0).then_some(Self(max_tokens))
    }

    pub fn parse(text: &str) -> Result<Self, GenerateError> {
        text.trim()
            .parse::<usize>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| GenerateError::InvalidBudget(text.trim().to_string()))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

/// Receives a notification after every generation step.
pub trait Progress {
    fn advance(&mut self, _done: usize, _total: usize) {}
    fn finish(&mut self) {}
}

impl Progress for () {}

impl Progress for indicatif::ProgressBar {
    fn advance(&mut self, done: usize, total: usize) {
        self.set_length(total as u64);
        self.set_position(done as u64);
        self.tick();
    }

    fn finish(&mut self) {
        self.finish_and_clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxTokens,
    EndOfSequence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// Generated ids, including the end-of-sequence id when it stopped the run.
    pub answer_tokens: Vec<u32>,
    pub steps: usize,
    pub stop: StopReason,
}

impl Generation {
    /// Generated ids without the trailing end-of-sequence id.
    pub fn visible_tokens(&self) -> &[u32] {
        match self.stop {
            StopReason::EndOfSequence => &self.answer_tokens[..self.answer_tokens.len() - 1],
            StopReason::MaxTokens => &self.answer_tokens,
        }
    }
}

/// Run the greedy loop for at most `max_tokens` steps.
pub fn generate<E, P>(
    engine: &mut E,
    prompt_tokens: &[u32],
    max_tokens: usize,
    eos_token_id: Option<u32>,
    progress: &mut P,
) -> Result<Generation, GenerateError>
where
    E: InferenceEngine + ?Sized,
    P: Progress + ?Sized,
{
    let mut context = prompt_tokens.to_vec();
    let mut answer_tokens = Vec::with_capacity(max_tokens.min(1024));

    for step in 0..max_tokens {
        let inputs = ModelInputs::from_context(&context);
        let logits = engine.run(&inputs)?;
        let probs = softmax(last_position_logits(&logits)?)?;
        let next = argmax(probs.view())?;
        log::debug!("step {}: token {} (p={:.4})", step, next, probs[next]);

        let next = next as u32;
        answer_tokens.push(next);
        context.push(next);
        progress.advance(step + 1, max_tokens);

        if eos_token_id == Some(next) {
            return Ok(Generation {
                answer_tokens,
                steps: step + 1,
                stop: StopReason::EndOfSequence,
            });
        }
    }

    Ok(Generation {
        answer_tokens,
        steps: max_tokens,
        stop: StopReason::MaxTokens,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidBudget,
    EmptyPrompt,
    Engine,
    Numeric,
}

impl GenerateError {
    pub fn kind(&self) -> FailureKind {
        match self {
            GenerateError::InvalidBudget(_) => FailureKind::InvalidBudget,
            GenerateError::EmptyPrompt => FailureKind::EmptyPrompt,
            GenerateError::Engine(_) => FailureKind::Engine,
            GenerateError::Numeric(_) => FailureKind::Numeric,
        }
    }
}

/// Lifecycle of one request through a [`Pipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    AwaitingInput,
    Encoding,
    Generating { step: usize },
    Decoding,
    Done,
    Failed(FailureKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOptions {
    pub eos_token_id: Option<u32>,
    /// Text prepended to every prompt before encoding.
    pub preamble: Option<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            eos_token_id: Some(DEFAULT_EOS_ID),
            preamble: None,
        }
    }
}

/// Result of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub prompt: String,
    pub prompt_tokens: Vec<u32>,
    pub answer_tokens: Vec<u32>,
    pub response: String,
    pub stop: StopReason,
}

struct StepTracker<'a, P: ?Sized> {
    state: &'a mut RunState,
    inner: &'a mut P,
}

impl<P: Progress + ?Sized> Progress for StepTracker<'_, P> {
    fn advance(&mut self, done: usize, total: usize) {
        *self.state = RunState::Generating { step: done };
        self.inner.advance(done, total);
    }
}

/// Prompt-to-response driver: encode, generate, decode, clean up.
pub struct Pipeline<'v, E> {
    tokenizer: Tokenizer<'v>,
    engine: E,
    cleanup: Cleanup,
    options: GenerationOptions,
    state: RunState,
}

impl<'v, E: InferenceEngine> Pipeline<'v, E> {
    pub fn new(tokenizer: Tokenizer<'v>, engine: E) -> Self {
        Self {
            tokenizer,
            engine,
            cleanup: Cleanup::default(),
            options: GenerationOptions::default(),
            state: RunState::AwaitingInput,
        }
    }

    pub fn with_cleanup(mut self, cleanup: Cleanup) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Handle one request. `budget` is the raw token count as typed by the user.
    pub fn run<P>(
        &mut self,
        prompt: &str,
        budget: &str,
        progress: &mut P,
    ) -> Result<Completion, GenerateError>
    where
        P: Progress + ?Sized,
    {
        self.state = RunState::AwaitingInput;
        let budget = TokenBudget::parse(budget).map_err(|e| self.fail(e))?;

        self.state = RunState::Encoding;
        let text = match &self.options.preamble {
            Some(preamble) => format!("{preamble}{prompt}"),
            None => prompt.to_string(),
        };
        let prompt_tokens = self.tokenizer.encode(&text);
        if prompt_tokens.is_empty() {
            return Err(self.fail(GenerateError::EmptyPrompt));
        }
        log::info!(
            "prompt encoded to {} tokens, generating up to {}",
            prompt_tokens.len(),
            budget.get()
        );

        self.state = RunState::Generating { step: 0 };
        let mut tracker = StepTracker {
            state: &mut self.state,
            inner: &mut *progress,
        };
        let generation = generate(
            &mut self.engine,
            &prompt_tokens,
            budget.get(),
            self.options.eos_token_id,
            &mut tracker,
        );
        progress.finish();
        let generation = generation.map_err(|e| self.fail(e))?;

        self.state = RunState::Decoding;
        let decoded = self.tokenizer.decode(generation.visible_tokens());
        let response = self.cleanup.apply(&decoded);
        log::info!("generated {} tokens ({:?})", generation.steps, generation.stop);

        self.state = RunState::Done;
        Ok(Completion {
            prompt: prompt.to_string(),
            prompt_tokens,
            answer_tokens: generation.answer_tokens,
            response,
            stop: generation.stop,
        })
    }

    fn fail(&mut self, err: GenerateError) -> GenerateError {
        log::error!("generation failed: {err}");
        self.state = RunState::Failed(err.kind());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_parse() {
        assert_eq!(TokenBudget::parse("12").unwrap().get(), 12);
        assert_eq!(TokenBudget::parse(" 3\n").unwrap().get(), 3);
        for bad in ["", "0", "-4", "ten", "1.5"] {
            assert!(matches!(
                TokenBudget::parse(bad),
                Err(GenerateError::InvalidBudget(_))
            ));
        }
    }

    #[test]
    fn test_visible_tokens_drop_eos_only() {
        let stopped = Generation {
            answer_tokens: vec![4, 5, 2],
            steps: 3,
            stop: StopReason::EndOfSequence,
        };
        assert_eq!(stopped.visible_tokens(), &[4, 5]);

        let exhausted = Generation {
            answer_tokens: vec![4, 2, 5],
            steps: 3,
            stop: StopReason::MaxTokens,
        };
        assert_eq!(exhausted.visible_tokens(), &[4, 2, 5]);
    }
}
