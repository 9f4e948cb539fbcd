// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates required credentials up front and provides defaults for every behaviour knob
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::carousel::MAX_CARDS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub line: LineConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub intent: IntentConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub replies: RepliesConfig,
}

// ─── LineConfig ─────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct LineConfig {
    #[serde(default)]
    pub channel_access_token: String,
    #[serde(default)]
    pub channel_secret: String,
    #[serde(default = "default_line_api_base")]
    pub api_base_url: String,
    /// Host for binary uploads (rich menu images)
    #[serde(default = "default_line_data_api_base")]
    pub data_api_base_url: String,
    #[serde(default = "default_line_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_access_token: String::new(),
            channel_secret: String::new(),
            api_base_url: default_line_api_base(),
            data_api_base_url: default_line_data_api_base(),
            timeout_secs: default_line_timeout_secs(),
        }
    }
}

// Custom Debug impl to redact channel credentials
impl std::fmt::Debug for LineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineConfig")
            .field("channel_access_token", &"[REDACTED]")
            .field("channel_secret", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("data_api_base_url", &self.data_api_base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ─── SheetsConfig ───────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub spreadsheet_id: String,
    /// API key for spreadsheets readable by link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// OAuth bearer token (e.g., minted for a service account by the deployment)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default = "default_sheets_api_base")]
    pub api_base_url: String,
    #[serde(default = "default_events_sheet")]
    pub events_sheet: String,
    #[serde(default = "default_qa_sheet")]
    pub qa_sheet: String,
    #[serde(default = "default_sync_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub columns: EventColumns,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            api_key: None,
            access_token: None,
            api_base_url: default_sheets_api_base(),
            events_sheet: default_events_sheet(),
            qa_sheet: default_qa_sheet(),
            timeout_secs: default_sync_timeout_secs(),
            columns: EventColumns::default(),
        }
    }
}

// Custom Debug impl to redact api_key and access_token
impl std::fmt::Debug for SheetsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsConfig")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_base_url", &self.api_base_url)
            .field("events_sheet", &self.events_sheet)
            .field("qa_sheet", &self.qa_sheet)
            .field("timeout_secs", &self.timeout_secs)
            .field("columns", &self.columns)
            .finish()
    }
}

/// Header names of the recognized events-table columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventColumns {
    #[serde(default = "default_title_column")]
    pub title: String,
    #[serde(default = "default_date_column")]
    pub date: String,
    #[serde(default = "default_image_url_column")]
    pub image_url: String,
    #[serde(default = "default_detail_url_column")]
    pub detail_url: String,
}

impl Default for EventColumns {
    fn default() -> Self {
        Self {
            title: default_title_column(),
            date: default_date_column(),
            image_url: default_image_url_column(),
            detail_url: default_detail_url_column(),
        }
    }
}

// ─── GeminiConfig ───────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_api_base")]
    pub api_base_url: String,
    /// Clamped into 10..=20 seconds by the generator
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_gemini_model(),
            api_base_url: default_gemini_api_base(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ─── Server / cache / behaviour ─────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_events")]
    pub max_events: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_events: default_max_events(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentConfig {
    #[serde(default = "default_trigger_phrase")]
    pub trigger_phrase: String,
    #[serde(default = "default_event_keywords")]
    pub event_keywords: Vec<String>,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            trigger_phrase: default_trigger_phrase(),
            event_keywords: default_event_keywords(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// When false, event requests get `replies.events_unavailable` instead of a carousel
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_alt_text")]
    pub alt_text: String,
    #[serde(default = "default_button_label")]
    pub button_label: String,
    #[serde(default = "default_date_prefix")]
    pub date_prefix: String,
    #[serde(default = "default_event_title")]
    pub default_title: String,
    #[serde(default = "default_detail_url")]
    pub default_detail_url: String,
    #[serde(default = "default_placeholder_image_url")]
    pub placeholder_image_url: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            alt_text: default_alt_text(),
            button_label: default_button_label(),
            date_prefix: default_date_prefix(),
            default_title: default_event_title(),
            default_detail_url: default_detail_url(),
            placeholder_image_url: default_placeholder_image_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Replaces the built-in behaviour rules when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default = "default_persona_role")]
    pub role: String,
    #[serde(default = "default_knowledge_heading")]
    pub knowledge_heading: String,
    #[serde(default = "default_closing_phrase")]
    pub closing_phrase: String,
    #[serde(default = "default_answer_length")]
    pub answer_length: u32,
    #[serde(default)]
    pub grounding: GroundingConfig,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            instruction: None,
            role: default_persona_role(),
            knowledge_heading: default_knowledge_heading(),
            closing_phrase: default_closing_phrase(),
            answer_length: default_answer_length(),
            grounding: GroundingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Selects dynamic retrieval with this threshold; plain search when unset
    #[serde(default = "default_dynamic_threshold")]
    pub dynamic_threshold: Option<f32>,
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dynamic_threshold: default_dynamic_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepliesConfig {
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_no_events")]
    pub no_events: String,
    #[serde(default = "default_events_unavailable")]
    pub events_unavailable: String,
    /// Sent when the generation backend cannot be reached
    #[serde(default = "default_apology_transport")]
    pub apology_transport: String,
    /// Sent when the backend answered without usable text
    #[serde(default = "default_apology_no_answer")]
    pub apology_no_answer: String,
}

impl Default for RepliesConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            no_events: default_no_events(),
            events_unavailable: default_events_unavailable(),
            apology_transport: default_apology_transport(),
            apology_no_answer: default_apology_no_answer(),
        }
    }
}

// ─── Defaults ───────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_line_api_base() -> String {
    "https://api.line.me".to_string()
}

fn default_line_data_api_base() -> String {
    "https://api-data.line.me".to_string()
}

fn default_line_timeout_secs() -> u64 {
    10
}

fn default_sheets_api_base() -> String {
    "https://sheets.googleapis.com".to_string()
}

fn default_events_sheet() -> String {
    "イベント情報".to_string()
}

fn default_qa_sheet() -> String {
    "QA".to_string()
}

fn default_sync_timeout_secs() -> u64 {
    15
}

fn default_title_column() -> String {
    "タイトル".to_string()
}

fn default_date_column() -> String {
    "開催日".to_string()
}

fn default_image_url_column() -> String {
    "画像URL".to_string()
}

fn default_detail_url_column() -> String {
    "詳細URL".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_generation_timeout_secs() -> u64 {
    20
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    10000
}

fn default_ttl_secs() -> u64 {
    600 // 10 minutes
}

fn default_max_events() -> usize {
    10
}

fn default_trigger_phrase() -> String {
    "AIチャットボット起動".to_string()
}

fn default_event_keywords() -> Vec<String> {
    vec!["最新".to_string(), "イベント".to_string()]
}

fn default_alt_text() -> String {
    "最新イベント一覧".to_string()
}

fn default_button_label() -> String {
    "詳細を見る".to_string()
}

fn default_date_prefix() -> String {
    "開催日: ".to_string()
}

fn default_event_title() -> String {
    "イベント".to_string()
}

fn default_detail_url() -> String {
    "https://line.me".to_string()
}

fn default_placeholder_image_url() -> String {
    "https://via.placeholder.com/1000x650.png?text=No+Image".to_string()
}

fn default_persona_role() -> String {
    "あなたは那須町のマスコット『きゅーびー』をイメージした観光コンシェルジュです。".to_string()
}

fn default_knowledge_heading() -> String {
    "那須の知識（スプレッドシート）".to_string()
}

fn default_closing_phrase() -> String {
    "那須での時間が素晴らしいものになりますように。".to_string()
}

fn default_answer_length() -> u32 {
    150
}

fn default_dynamic_threshold() -> Option<f32> {
    Some(0.3)
}

fn default_greeting() -> String {
    "こんにちは！那須AIコンシェルジュです。那須の観光情報や最新の天気、バスの状況など、何でもお手伝いいたします。何かお困りのことはありますか？".to_string()
}

fn default_no_events() -> String {
    "現在、掲載中のイベント情報はありません。".to_string()
}

fn default_events_unavailable() -> String {
    "イベント情報は準備中です。もうしばらくお待ちください。".to_string()
}

fn default_apology_transport() -> String {
    "通信エラーが発生しました。時間をおいて再度お試しください。".to_string()
}

fn default_apology_no_answer() -> String {
    "情報を確認できませんでした。別の言い方で聞いてみてください。".to_string()
}

/// Parse a boolean env value ("true"/"false"/"1"/"0"/"yes"/"no")
fn parse_bool(key: &str, val: &str) -> Result<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be a boolean, got: {}", key, val),
    }
}

fn split_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            line: LineConfig::default(),
            sheets: SheetsConfig::default(),
            gemini: GeminiConfig::default(),
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            intent: IntentConfig::default(),
            events: EventsConfig::default(),
            persona: PersonaConfig::default(),
            replies: RepliesConfig::default(),
        }
    }
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. CONCIERGE_CONFIG_PATH env var (if set)
    /// 2. ./config.toml (current directory - for development)
    /// 3. ~/.config/concierge/config.toml
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("CONCIERGE_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        if let Some(dirs) = directories::ProjectDirs::from("", "", "concierge") {
            let xdg_config = dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                return Some(xdg_config);
            }
        }

        None
    }

    /// Load configuration from config.toml with environment variable overrides,
    /// then validate. Any error here is fatal for the process.
    pub fn load() -> Result<Self> {
        let config = Self::load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Load file and env overrides without validation, for operator commands
    /// that need only part of the configuration
    pub fn load_unvalidated() -> Result<Self> {
        let mut config = if let Some(config_path) = Self::find_config_file() {
            tracing::info!(
                path = %config_path.display(),
                "Loading configuration from file"
            );
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            Self::from_toml(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::info!("No config file found, using environment variables and defaults");
            Config::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str::<Config>(content)?)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("LINE_CHANNEL_ACCESS_TOKEN") {
            self.line.channel_access_token = val;
        }
        if let Ok(val) = std::env::var("LINE_CHANNEL_SECRET") {
            self.line.channel_secret = val;
        }
        if let Ok(val) = std::env::var("GEMINI_API_KEY") {
            self.gemini.api_key = val;
        }
        if let Ok(val) = std::env::var("GEMINI_MODEL") {
            self.gemini.model = val;
        }
        if let Ok(val) = std::env::var("SPREADSHEET_KEY") {
            self.sheets.spreadsheet_id = val;
        }
        if let Ok(val) = std::env::var("GOOGLE_SHEETS_API_KEY") {
            self.sheets.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("GOOGLE_ACCESS_TOKEN") {
            self.sheets.access_token = Some(val);
        }
        if let Ok(val) = std::env::var("PORT") {
            self.server.port = val
                .parse()
                .with_context(|| format!("PORT must be a valid port number, got: {}", val))?;
        }
        if let Ok(val) = std::env::var("BIND_ADDRESS") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("CACHE_TTL_SECS") {
            self.cache.ttl_secs = val.parse().with_context(|| {
                format!("CACHE_TTL_SECS must be a valid number, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("GROUNDING_ENABLED") {
            self.persona.grounding.enabled = parse_bool("GROUNDING_ENABLED", &val)?;
        }
        if let Ok(val) = std::env::var("TRIGGER_PHRASE") {
            self.intent.trigger_phrase = val;
        }
        if let Ok(val) = std::env::var("EVENT_KEYWORDS") {
            self.intent.event_keywords = split_list(&val);
        }
        Ok(())
    }

    /// Check credentials and behaviour knobs that would otherwise fail per message
    pub fn validate(&self) -> Result<()> {
        if self.line.channel_access_token.trim().is_empty() {
            anyhow::bail!(
                "line.channel_access_token is required (set in config.toml or LINE_CHANNEL_ACCESS_TOKEN env var)"
            );
        }
        if self.line.channel_secret.trim().is_empty() {
            anyhow::bail!(
                "line.channel_secret is required (set in config.toml or LINE_CHANNEL_SECRET env var)"
            );
        }
        if self.gemini.api_key.trim().is_empty() {
            anyhow::bail!("gemini.api_key is required (set in config.toml or GEMINI_API_KEY env var)");
        }
        if self.sheets.spreadsheet_id.trim().is_empty() {
            anyhow::bail!(
                "sheets.spreadsheet_id is required (set in config.toml or SPREADSHEET_KEY env var)"
            );
        }
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !present(&self.sheets.api_key) && !present(&self.sheets.access_token) {
            anyhow::bail!("Either sheets.api_key or sheets.access_token is required");
        }
        if self.intent.trigger_phrase.trim().is_empty() {
            anyhow::bail!("intent.trigger_phrase must not be empty");
        }
        if !self.intent.event_keywords.iter().any(|k| !k.trim().is_empty()) {
            anyhow::bail!("intent.event_keywords must contain at least one keyword");
        }
        if self.cache.ttl_secs == 0 {
            anyhow::bail!("cache.ttl_secs must be greater than zero");
        }
        if self.cache.max_events == 0 || self.cache.max_events > MAX_CARDS {
            anyhow::bail!("cache.max_events must be between 1 and {}", MAX_CARDS);
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
