use cadence_core::{DeclinePolicy, GenerationSettings, SessionMode, SessionOptions};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported generation backends. All of them speak the
/// OpenAI-compatible chat API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
    Local,
}

impl Provider {
    const GEMINI_BASE_URL: &'static str = "https://generativelanguage.googleapis.com/v1beta/openai";

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::Gemini => "gemini",
            Provider::Local => "local",
        }
    }
}

/// Speech output settings.
#[derive(Clone, Debug, PartialEq)]
pub struct TtsConfig {
    pub enabled: bool,
    pub model: String,
    pub voice: String,
    pub save_audio: bool,
    pub output_dir: PathBuf,
    pub interactive: bool,
    /// How long the terminal prompt waits before treating silence as "skip".
    pub prompt_timeout: Option<Duration>,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub local_base_url: String,
    pub chat_model: String,
    pub generation: GenerationSettings,
    pub concise: bool,
    pub generation_timeout: Duration,
    pub log_level: Level,
    pub prompts_path: PathBuf,
    pub pillars_path: Option<PathBuf>,
    pub session_mode: SessionMode,
    pub history_limit: usize,
    pub record_declines: bool,
    pub allow_all_topics: bool,
    pub tts: TtsConfig,
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

/// A number of seconds. Zero is rejected: it would time out immediately.
fn secs_var(name: &str, default: u64) -> Result<u64, ConfigError> {
    let secs: u64 = parse_var(name, default)?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            "must be at least 1 second".to_string(),
        ));
    }
    Ok(secs)
}

fn flag_var(name: &str) -> Result<bool, ConfigError> {
    match var(name) {
        None => Ok(false),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(
                name.to_string(),
                format!("'{raw}' is not a boolean"),
            )),
        },
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let provider_str = var("GENERATION_PROVIDER").unwrap_or_else(|| "openai".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "openai" => Provider::OpenAI,
            "gemini" => Provider::Gemini,
            "local" => Provider::Local,
            other => {
                return Err(ConfigError::InvalidValue(
                    "GENERATION_PROVIDER".to_string(),
                    format!("'{other}' is not one of openai, gemini, local"),
                ));
            }
        };

        let openai_api_key = var("OPENAI_API_KEY");
        let gemini_api_key = var("GEMINI_API_KEY");
        let local_base_url =
            var("LOCAL_BASE_URL").unwrap_or_else(|| "http://localhost:11434/v1".to_string());

        let chat_model = var("CHAT_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".to_string());

        let temperature: f32 = parse_var("TEMPERATURE", 0.7)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue(
                "TEMPERATURE".to_string(),
                format!("{temperature} is outside 0.0-2.0"),
            ));
        }
        let max_tokens: u32 = parse_var("MAX_TOKENS", 800)?;
        let concise = flag_var("CONCISE")?;
        let mut generation = GenerationSettings {
            temperature,
            max_tokens,
        };
        if concise {
            generation = generation.concise();
        }
        let generation_timeout = Duration::from_secs(secs_var("GENERATION_TIMEOUT_SECS", 60)?);

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./prompts"));
        let pillars_path = var("PILLARS_PATH").map(PathBuf::from);

        let session_mode = match var("SESSION_MODE") {
            Some(raw) => raw
                .parse::<SessionMode>()
                .map_err(|e| ConfigError::InvalidValue("SESSION_MODE".to_string(), e))?,
            None => SessionMode::Contextual,
        };
        let history_limit: usize = parse_var("HISTORY_LIMIT", 12)?;
        let record_declines = flag_var("RECORD_DECLINES")?;
        let allow_all_topics = flag_var("ALLOW_ALL_TOPICS")?;

        let prompt_timeout = match var("PLAYBACK_PROMPT_TIMEOUT_SECS") {
            Some(_) => Some(Duration::from_secs(secs_var(
                "PLAYBACK_PROMPT_TIMEOUT_SECS",
                0,
            )?)),
            None => None,
        };
        let tts = TtsConfig {
            enabled: flag_var("TTS_ENABLED")?,
            model: var("TTS_MODEL").unwrap_or_else(|| "tts-1".to_string()),
            voice: var("TTS_VOICE").unwrap_or_else(|| "alloy".to_string()),
            save_audio: flag_var("SAVE_AUDIO")?,
            output_dir: var("AUDIO_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("audio_output")),
            interactive: true,
            prompt_timeout,
        };

        let config = Self {
            bind_address,
            provider,
            openai_api_key,
            gemini_api_key,
            local_base_url,
            chat_model,
            generation,
            concise,
            generation_timeout,
            log_level,
            prompts_path,
            pillars_path,
            session_mode,
            history_limit,
            record_declines,
            allow_all_topics,
            tts,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the selected provider and TTS have the keys they need.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.provider {
            Provider::OpenAI => {
                if self.openai_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                    ));
                }
            }
            Provider::Gemini => {
                if self.gemini_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                    ));
                }
            }
            Provider::Local => {}
        }
        if self.tts.enabled && self.openai_api_key.is_none() {
            return Err(ConfigError::MissingVar(
                "OPENAI_API_KEY must be set for text-to-speech".to_string(),
            ));
        }
        Ok(())
    }

    /// API key and base URL for the selected provider.
    pub fn openai_config(&self) -> async_openai::config::OpenAIConfig {
        let config = async_openai::config::OpenAIConfig::new();
        match self.provider {
            Provider::OpenAI => config.with_api_key(self.openai_api_key.clone().unwrap_or_default()),
            Provider::Gemini => config
                .with_api_base(Provider::GEMINI_BASE_URL)
                .with_api_key(self.gemini_api_key.clone().unwrap_or_default()),
            Provider::Local => config
                .with_api_base(self.local_base_url.clone())
                .with_api_key("local"),
        }
    }

    /// A local-provider configuration with defaults, for tests.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            provider: Provider::Local,
            openai_api_key: None,
            gemini_api_key: None,
            local_base_url: "http://localhost:11434/v1".to_string(),
            chat_model: "test-model".to_string(),
            generation: GenerationSettings::default(),
            concise: false,
            generation_timeout: Duration::from_secs(5),
            log_level: Level::INFO,
            prompts_path: PathBuf::from("./prompts"),
            pillars_path: None,
            session_mode: SessionMode::Contextual,
            history_limit: 12,
            record_declines: false,
            allow_all_topics: false,
            tts: TtsConfig {
                enabled: false,
                model: "tts-1".to_string(),
                voice: "alloy".to_string(),
                save_audio: false,
                output_dir: PathBuf::from("audio_output"),
                interactive: false,
                prompt_timeout: None,
            },
        }
    }

    /// Options applied to every new session.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            mode: self.session_mode,
            history_limit: self.history_limit,
            decline_policy: if self.record_declines {
                DeclinePolicy::Record
            } else {
                DeclinePolicy::Skip
            },
            allow_all_topics: self.allow_all_topics,
            concise: self.concise,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::config::Config as _;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    const VARS: &[&str] = &[
        "BIND_ADDRESS",
        "GENERATION_PROVIDER",
        "OPENAI_API_KEY",
        "GEMINI_API_KEY",
        "LOCAL_BASE_URL",
        "CHAT_MODEL",
        "TEMPERATURE",
        "MAX_TOKENS",
        "CONCISE",
        "GENERATION_TIMEOUT_SECS",
        "RUST_LOG",
        "PROMPTS_PATH",
        "PILLARS_PATH",
        "SESSION_MODE",
        "HISTORY_LIMIT",
        "RECORD_DECLINES",
        "ALLOW_ALL_TOPICS",
        "TTS_ENABLED",
        "TTS_MODEL",
        "TTS_VOICE",
        "SAVE_AUDIO",
        "AUDIO_OUTPUT_DIR",
        "PLAYBACK_PROMPT_TIMEOUT_SECS",
    ];

    fn clear_env_vars() {
        unsafe {
            for name in VARS {
                env::remove_var(name);
            }
        }
    }

    fn set_minimal_env_openai() {
        unsafe {
            env::set_var("GENERATION_PROVIDER", "openai");
            env::set_var("OPENAI_API_KEY", "test-openai-key");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal_openai() {
        clear_env_vars();
        set_minimal_env_openai();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.provider, Provider::OpenAI);
        assert_eq!(config.openai_api_key, Some("test-openai-key".to_string()));
        assert_eq!(config.gemini_api_key, None);
        assert_eq!(config.chat_model, "gpt-3.5-turbo");
        assert_eq!(config.generation, GenerationSettings::default());
        assert!(!config.concise);
        assert_eq!(config.generation_timeout, Duration::from_secs(60));
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.prompts_path, PathBuf::from("./prompts"));
        assert_eq!(config.pillars_path, None);
        assert_eq!(config.session_options(), SessionOptions::default());
        assert!(!config.tts.enabled);
        assert_eq!(config.tts.voice, "alloy");
        assert_eq!(config.tts.output_dir, PathBuf::from("audio_output"));
        assert_eq!(config.tts.prompt_timeout, None);
    }

    #[test]
    #[serial]
    fn test_config_from_env_gemini_provider() {
        clear_env_vars();
        unsafe {
            env::set_var("GENERATION_PROVIDER", "gemini");
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(config.gemini_api_key, Some("test-gemini-key".to_string()));
        assert_eq!(config.openai_api_key, None);
        assert_eq!(
            config.openai_config().api_base(),
            "https://generativelanguage.googleapis.com/v1beta/openai"
        );
    }

    #[test]
    #[serial]
    fn test_local_provider_needs_no_key() {
        clear_env_vars();
        unsafe {
            env::set_var("GENERATION_PROVIDER", "local");
            env::set_var("CHAT_MODEL", "llama3.2");
        }

        let config = Config::from_env().expect("Config should load successfully");
        assert_eq!(config.provider, Provider::Local);
        assert_eq!(config.openai_config().api_base(), "http://localhost:11434/v1");
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
            env::set_var("GENERATION_PROVIDER", "openai");
            env::set_var("OPENAI_API_KEY", "custom-openai-key");
            env::set_var("CHAT_MODEL", "gpt-4o-mini");
            env::set_var("TEMPERATURE", "0.9");
            env::set_var("MAX_TOKENS", "1200");
            env::set_var("CONCISE", "true");
            env::set_var("RUST_LOG", "debug");
            env::set_var("PROMPTS_PATH", "/custom/prompts");
            env::set_var("PILLARS_PATH", "/custom/pillars");
            env::set_var("SESSION_MODE", "isolated");
            env::set_var("HISTORY_LIMIT", "6");
            env::set_var("RECORD_DECLINES", "yes");
            env::set_var("ALLOW_ALL_TOPICS", "1");
            env::set_var("TTS_ENABLED", "on");
            env::set_var("TTS_VOICE", "nova");
            env::set_var("SAVE_AUDIO", "true");
            env::set_var("AUDIO_OUTPUT_DIR", "/tmp/cadence-audio");
            env::set_var("PLAYBACK_PROMPT_TIMEOUT_SECS", "15");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert!(config.concise);
        assert_eq!(config.generation.max_tokens, 300);
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.pillars_path, Some(PathBuf::from("/custom/pillars")));

        let options = config.session_options();
        assert_eq!(options.mode, SessionMode::Isolated);
        assert_eq!(options.history_limit, 6);
        assert_eq!(options.decline_policy, DeclinePolicy::Record);
        assert!(options.allow_all_topics);
        assert!(options.concise);

        assert!(config.tts.enabled);
        assert!(config.tts.save_audio);
        assert_eq!(config.tts.voice, "nova");
        assert_eq!(config.tts.output_dir, PathBuf::from("/tmp/cadence-audio"));
        assert_eq!(config.tts.prompt_timeout, Some(Duration::from_secs(15)));
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        set_minimal_env_openai();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_values() {
        for (name, value) in [
            ("RUST_LOG", "not-a-level"),
            ("GENERATION_PROVIDER", "mystery"),
            ("TEMPERATURE", "3.5"),
            ("HISTORY_LIMIT", "-1"),
            ("SESSION_MODE", "chatty"),
            ("SAVE_AUDIO", "maybe"),
            ("GENERATION_TIMEOUT_SECS", "0"),
            ("PLAYBACK_PROMPT_TIMEOUT_SECS", "0"),
        ] {
            clear_env_vars();
            set_minimal_env_openai();
            unsafe {
                env::set_var(name, value);
            }

            match Config::from_env().unwrap_err() {
                ConfigError::InvalidValue(var, _) => assert_eq!(var, name),
                other => panic!("Expected InvalidValue for {name}, got {other}"),
            }
        }
    }

    #[test]
    #[serial]
    fn test_config_missing_openai_key() {
        clear_env_vars();
        unsafe {
            env::set_var("GENERATION_PROVIDER", "openai");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => {
                assert!(msg.contains("OPENAI_API_KEY"));
            }
            _ => panic!("Expected MissingVar for OPENAI_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_missing_gemini_key() {
        clear_env_vars();
        unsafe {
            env::set_var("GENERATION_PROVIDER", "gemini");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => {
                assert!(msg.contains("GEMINI_API_KEY"));
            }
            _ => panic!("Expected MissingVar for GEMINI_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_tts_requires_openai_key() {
        clear_env_vars();
        unsafe {
            env::set_var("GENERATION_PROVIDER", "local");
            env::set_var("TTS_ENABLED", "true");
        }

        match Config::from_env().unwrap_err() {
            ConfigError::MissingVar(msg) => assert!(msg.contains("text-to-speech")),
            _ => panic!("Expected MissingVar for text-to-speech"),
        }
    }

    #[test]
    #[serial]
    fn test_timeouts_accept_positive_seconds() {
        clear_env_vars();
        set_minimal_env_openai();
        unsafe {
            env::set_var("GENERATION_TIMEOUT_SECS", "15");
            env::set_var("PLAYBACK_PROMPT_TIMEOUT_SECS", "1");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.generation_timeout, Duration::from_secs(15));
        assert_eq!(config.tts.prompt_timeout, Some(Duration::from_secs(1)));
    }
}
