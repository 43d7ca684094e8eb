//! Hierarchical (recursive) summarization.
//!
//! Reduces an arbitrary number of texts to one report while keeping each
//! model call within a bounded context: at most `max_group_size` texts are
//! ever sent together.
//!
//! ```text
//!  texts (n)
//!    │  n == 0          ─▶ ""
//!    │  n <= M          ─▶ summarize(all)                      ─▶ done
//!    │                     (report(all) once a level has run)
//!    ▼
//!  groups of ≤ M ─▶ summarize(group) per group ─▶ partials (⌈n/M⌉)
//!    │  partials <= F   ─▶ report(partials)                    ─▶ done
//!    ▼
//!  texts := partials, repeat
//! ```
//!
//! A failing group is replaced by a placeholder so the level can still
//! finish. A failing final merge, including the single call that merges the
//! summaries of a recursive level, returns its inputs inside the error so
//! the caller can show their concatenation instead.

use crate::completion::{CompletionModel, CompletionOptions, CompletionRequest};
use crate::error::{ModelError, ReduceError};

/// Separator placed between texts inside one prompt.
pub const SEPARATOR: &str = "\n\n---\n\n";

pub const DEFAULT_MAX_GROUP_SIZE: usize = 10;
pub const DEFAULT_MAX_FINAL_GROUPS: usize = 20;

#[derive(Debug, Clone)]
pub struct ReduceOptions {
    /// Most texts sent in one call (M).
    pub max_group_size: usize,
    /// Most group summaries merged by the final report call (F).
    pub max_final_groups: usize,
    pub completion: CompletionOptions,
    /// Prefix of the user message for group and base-case summaries.
    pub summary_instruction: String,
    /// Prefix of the user message for the final merge.
    pub report_instruction: String,
}

impl Default for ReduceOptions {
    fn default() -> Self {
        Self {
            max_group_size: DEFAULT_MAX_GROUP_SIZE,
            max_final_groups: DEFAULT_MAX_FINAL_GROUPS,
            completion: CompletionOptions::default(),
            summary_instruction: "Summarize the following fragments concisely. Keep every key \
                                  fact, figure and conclusion."
                .to_string(),
            report_instruction: "Combine the following partial summaries into a single \
                                 structured expert report on the whole document."
                .to_string(),
        }
    }
}

impl ReduceOptions {
    fn validate(&self) -> Result<(), ReduceError> {
        if self.max_group_size < 2 {
            return Err(ReduceError::InvalidOptions(format!(
                "max_group_size must be at least 2, got {}",
                self.max_group_size
            )));
        }
        if self.max_final_groups < 1 {
            return Err(ReduceError::InvalidOptions(
                "max_final_groups must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reduce `texts` to one summary.
///
/// Calls are made one at a time, in document order.
pub async fn reduce(
    texts: &[String],
    system_prompt: &str,
    model: &dyn CompletionModel,
    options: &ReduceOptions,
) -> Result<String, ReduceError> {
    options.validate()?;

    let mut current: Vec<String> = texts.to_vec();
    let mut level = 0usize;

    loop {
        if current.is_empty() {
            return Ok(String::new());
        }

        if current.len() <= options.max_group_size {
            if level == 0 {
                return call(model, system_prompt, &options.summary_instruction, &current, options)
                    .await
                    .map_err(ReduceError::Summarize);
            }
            // Group summaries of an earlier level fit one call: this is the final merge.
            return match call(model, system_prompt, &options.report_instruction, &current, options)
                .await
            {
                Ok(report) => Ok(report),
                Err(source) => Err(ReduceError::FinalMerge {
                    partials: current,
                    source,
                }),
            };
        }

        let mut partials = Vec::with_capacity(current.len().div_ceil(options.max_group_size));
        for (i, group) in current.chunks(options.max_group_size).enumerate() {
            let summary =
                match call(model, system_prompt, &options.summary_instruction, group, options).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(level, group = i + 1, error = %e, "group summary failed");
                        format!("[group {} summary unavailable: {}]", i + 1, e)
                    }
                };
            partials.push(summary);
        }
        tracing::debug!(level, inputs = current.len(), groups = partials.len(), "reduced level");

        if partials.len() <= options.max_final_groups {
            return match call(model, system_prompt, &options.report_instruction, &partials, options)
                .await
            {
                Ok(report) => Ok(report),
                Err(source) => Err(ReduceError::FinalMerge { partials, source }),
            };
        }

        current = partials;
        level += 1;
    }
}

async fn call(
    model: &dyn CompletionModel,
    system_prompt: &str,
    instruction: &str,
    texts: &[String],
    options: &ReduceOptions,
) -> Result<String, ModelError> {
    let user = format!("{}\n\n{}", instruction, texts.join(SEPARATOR));
    let request = CompletionRequest::new(system_prompt, &user, &options.completion);
    let text = model.complete(&request).await?;
    if text.trim().is_empty() {
        return Err(ModelError::Empty);
    }
    Ok(text)
}
