//! Token usage counters

use serde::{Deserialize, Serialize};

/// Tokens consumed by one LLM call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Aggregated LLM usage over a window of the event log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmUsageStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub calls_count: u64,
    pub calls_error_count: u64,
    pub parsing_errors: u64,
}

impl LlmUsageStats {
    /// Count a successful call
    pub fn record_call(&mut self, usage: TokenUsage) {
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
        self.calls_count += 1;
    }

    pub fn record_error(&mut self) {
        self.calls_error_count += 1;
    }

    pub fn record_parsing_error(&mut self) {
        self.parsing_errors += 1;
    }

    pub fn tokens(&self) -> TokenUsage {
        TokenUsage::new(self.input_tokens, self.output_tokens)
    }

    pub fn merge(&mut self, other: &LlmUsageStats) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.calls_count += other.calls_count;
        self.calls_error_count += other.calls_error_count;
        self.parsing_errors += other.parsing_errors;
    }
}
