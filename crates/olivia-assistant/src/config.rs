// olivia-assistant/src/config.rs

use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

use crate::context_engine::window_manager::WindowConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub max_raw_messages: usize,
    pub summarize_batch_size: usize,
    pub summary_fetch_slack: usize,
    pub llm_base_url: String,
    pub openai_api_key: Option<String>,
    pub main_llm_model: String,
    pub main_llm_temperature: f32,
    pub summarization_llm_model: String,
    pub summarization_llm_temperature: f32,
    pub ranking_llm_model: String,
    pub ranking_llm_temperature: f32,
    pub llm_timeout_seconds: u64,
    pub max_tool_rounds: usize,
    pub database_path: PathBuf,
    pub api_host: String,
    pub api_port: u16,
    pub request_timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let max_raw_messages: usize = parse_setting(&lookup, "MAIN_AGENT_MAX_RAW_MESSAGES", "30")?;
        if max_raw_messages == 0 {
            return Err(anyhow::anyhow!("MAIN_AGENT_MAX_RAW_MESSAGES must be at least 1"));
        }

        // Zero is accepted: the window manager logs and skips folds in that case.
        let summarize_batch_size: usize = parse_setting(&lookup, "SUMMARIZE_BATCH_SIZE", "10")?;
        if summarize_batch_size == 0 {
            warn!("SUMMARIZE_BATCH_SIZE is 0; conversation summaries will never be updated");
        }

        let openai_api_key = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());
        if openai_api_key.is_none() {
            warn!("OPENAI_API_KEY not set; LLM requests will be sent without authorization");
        }

        Ok(Self {
            max_raw_messages,
            summarize_batch_size,
            summary_fetch_slack: parse_setting(&lookup, "SUMMARY_FETCH_SLACK", "5")?,
            llm_base_url: text("LLM_BASE_URL", "https://api.openai.com")
                .trim_end_matches('/')
                .to_string(),
            openai_api_key,
            main_llm_model: text("MAIN_LLM_MODEL", "gpt-4o"),
            main_llm_temperature: parse_setting(&lookup, "MAIN_LLM_TEMPERATURE", "0.6")?,
            summarization_llm_model: text("SUMMARIZATION_LLM_MODEL", "gpt-4o-mini"),
            summarization_llm_temperature: parse_setting(
                &lookup,
                "SUMMARIZATION_LLM_TEMPERATURE",
                "0.3",
            )?,
            ranking_llm_model: text("RANKING_LLM_MODEL", "gpt-4o-mini"),
            ranking_llm_temperature: parse_setting(&lookup, "RANKING_LLM_TEMPERATURE", "0.2")?,
            llm_timeout_seconds: parse_setting(&lookup, "LLM_TIMEOUT_SECONDS", "120")?,
            max_tool_rounds: parse_setting(&lookup, "MAX_TOOL_ROUNDS", "6")?,
            database_path: PathBuf::from(text("DATABASE_PATH", "./data/olivia.db")),
            api_host: text("API_HOST", "127.0.0.1"),
            api_port: parse_setting(&lookup, "API_PORT", "8000")?,
            request_timeout_seconds: parse_setting(&lookup, "REQUEST_TIMEOUT_SECONDS", "300")?,
        })
    }

    /// Tunables of the rolling-summary window.
    pub fn window_config(&self) -> WindowConfig {
        WindowConfig {
            max_raw_messages: self.max_raw_messages,
            summarize_batch_size: self.summarize_batch_size,
            fetch_slack: self.summary_fetch_slack,
        }
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- Max Raw Messages: {}", self.max_raw_messages);
        info!("- Summarize Batch Size: {}", self.summarize_batch_size);
        info!("- Summary Fetch Slack: {}", self.summary_fetch_slack);
        info!("- LLM Base URL: {}", self.llm_base_url);
        info!("- API Key: {}", if self.openai_api_key.is_some() { "set" } else { "not set" });
        info!("- Main Model: {} (temperature {})", self.main_llm_model, self.main_llm_temperature);
        info!(
            "- Summarization Model: {} (temperature {})",
            self.summarization_llm_model, self.summarization_llm_temperature
        );
        info!(
            "- Ranking Model: {} (temperature {})",
            self.ranking_llm_model, self.ranking_llm_temperature
        );
        info!("- LLM Timeout: {}s", self.llm_timeout_seconds);
        info!("- Max Tool Rounds: {}", self.max_tool_rounds);
        info!("- Database: {}", self.database_path.display());
        info!("- API: {}:{}", self.api_host, self.api_port);
        info!("- Request Timeout: {}s", self.request_timeout_seconds);
    }

    pub fn api_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.api_host, self.api_port)
            .parse()
            .with_context(|| format!("Invalid API address {}:{}", self.api_host, self.api_port))
    }
}

fn parse_setting<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .with_context(|| format!("{} has an invalid value: {:?}", key, raw))
}
