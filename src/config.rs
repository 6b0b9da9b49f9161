use crate::types::PatternKind;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub tone: ToneConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub patterns: PatternsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// 区間検出の設定
///
/// 末尾バッファとルックアヘッドは実地チューニングされた
/// 経験値であり、不変条件ではない。実際の文字起こしデータに
/// 合わせて調整する想定のパラメータ。
///
/// # デフォルト値
///
/// - `trailing_buffer_secs`: 0.2 秒
/// - `lookahead_words`: 3 語
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectorConfig {
    #[serde(default = "default_trailing_buffer_secs")]
    pub trailing_buffer_secs: f64,
    #[serde(default = "default_lookahead_words")]
    pub lookahead_words: usize,
}

/// トーン合成の設定
///
/// 振幅はフルスケール比。サンプル書き換えでは周囲の音声に
/// 対してクリップしないよう低め、オーバーレイトラックは
/// 単独でも聞き取れるよう高めがデフォルト。
///
/// # デフォルト値
///
/// - `frequency_hz`: 1000.0 Hz
/// - `inplace_amplitude`: 0.4
/// - `overlay_amplitude`: 0.8
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToneConfig {
    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: f64,
    #[serde(default = "default_inplace_amplitude")]
    pub inplace_amplitude: f64,
    #[serde(default = "default_overlay_amplitude")]
    pub overlay_amplitude: f64,
}

/// オーバーレイトラックの設定
///
/// トーントラックは原本のフォーマットに依らず、
/// この固定の標準フォーマットで生成される。
///
/// # デフォルト値
///
/// - `sample_rate`: 44100 Hz
/// - `channels`: 2 (ステレオ)
/// - `tail_secs`: 1.0 秒 (最終区間の終端より後ろの余白)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OverlayConfig {
    #[serde(default = "default_overlay_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_overlay_channels")]
    pub channels: u16,
    #[serde(default = "default_tail_secs")]
    pub tail_secs: f64,
}

/// 戦略エグゼキュータの設定
///
/// # デフォルト値
///
/// - `tool_command`: "ffmpeg"
/// - `use_external_tool`: true
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_tool_command")]
    pub tool_command: String,
    #[serde(default = "default_use_external_tool")]
    pub use_external_tool: bool,
}

/// パターン分類器の設定
///
/// # デフォルト値
///
/// - `enabled`: 全分類器
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatternsConfig {
    #[serde(default = "default_enabled_patterns")]
    pub enabled: Vec<PatternKind>,
}

/// 出力とログの設定
///
/// # デフォルト値
///
/// - `log_level`: "info"
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default functions
fn default_trailing_buffer_secs() -> f64 {
    0.2
}

fn default_lookahead_words() -> usize {
    3
}

fn default_frequency_hz() -> f64 {
    1000.0
}

fn default_inplace_amplitude() -> f64 {
    0.4
}

fn default_overlay_amplitude() -> f64 {
    0.8
}

fn default_overlay_sample_rate() -> u32 {
    44100
}

fn default_overlay_channels() -> u16 {
    2
}

fn default_tail_secs() -> f64 {
    1.0
}

fn default_tool_command() -> String {
    "ffmpeg".to_string()
}

fn default_use_external_tool() -> bool {
    true
}

fn default_enabled_patterns() -> Vec<PatternKind> {
    PatternKind::ALL.to_vec()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            tone: ToneConfig::default(),
            overlay: OverlayConfig::default(),
            executor: ExecutorConfig::default(),
            patterns: PatternsConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            trailing_buffer_secs: default_trailing_buffer_secs(),
            lookahead_words: default_lookahead_words(),
        }
    }
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            frequency_hz: default_frequency_hz(),
            inplace_amplitude: default_inplace_amplitude(),
            overlay_amplitude: default_overlay_amplitude(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_overlay_sample_rate(),
            channels: default_overlay_channels(),
            tail_secs: default_tail_secs(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            tool_command: default_tool_command(),
            use_external_tool: default_use_external_tool(),
        }
    }
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_patterns(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// 設定ファイルから読み込み
    ///
    /// TOML形式の設定ファイルをパースしてConfig構造体を生成する。
    ///
    /// # Errors
    ///
    /// ファイルの読み込みまたはパースに失敗した場合にエラーを返す。
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use dcr_redact::config::Config;
    /// let config = Config::from_file("config.toml").unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("設定ファイルの読み込みに失敗: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "設定ファイルのパースに失敗")?;
        Ok(config)
    }

    /// デフォルト設定をファイルに書き出し
    ///
    /// デフォルト値を持つ設定ファイルを生成する。
    /// 既存のファイルは上書きされる。
    ///
    /// # Errors
    ///
    /// ファイルの書き込みに失敗した場合にエラーを返す。
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Config::default();
        let content =
            toml::to_string_pretty(&config).with_context(|| "設定のシリアライズに失敗")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("設定ファイルの書き込みに失敗: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// 設定ファイルがあれば読み込み、なければデフォルトを使用
    ///
    /// # Errors
    ///
    /// ファイルが存在するがパースに失敗した場合にエラーを返す。
    /// ファイルが存在しない場合はエラーにならず、デフォルト設定を返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            log::warn!(
                "設定ファイルが見つかりません。デフォルト設定を使用します: {:?}",
                path.as_ref()
            );
            Ok(Config::default())
        }
    }

    /// 設定値の範囲を検証
    ///
    /// ジョブ層から渡されるトーンの上書き値を含め、
    /// 周波数 > 0、振幅 (0, 1] などの制約を確認する。
    ///
    /// # Errors
    ///
    /// いずれかの値が範囲外の場合にエラーを返す。
    pub fn validate(&self) -> Result<()> {
        if self.tone.frequency_hz <= 0.0 {
            bail!("tone.frequency_hz は正の値が必要です: {}", self.tone.frequency_hz);
        }
        if self.tone.inplace_amplitude <= 0.0 || self.tone.inplace_amplitude > 1.0 {
            bail!(
                "tone.inplace_amplitude は (0, 1] の範囲が必要です: {}",
                self.tone.inplace_amplitude
            );
        }
        if self.tone.overlay_amplitude <= 0.0 || self.tone.overlay_amplitude > 1.0 {
            bail!(
                "tone.overlay_amplitude は (0, 1] の範囲が必要です: {}",
                self.tone.overlay_amplitude
            );
        }
        if self.detector.trailing_buffer_secs < 0.0 {
            bail!(
                "detector.trailing_buffer_secs は負にできません: {}",
                self.detector.trailing_buffer_secs
            );
        }
        if self.detector.lookahead_words == 0 {
            bail!("detector.lookahead_words は1以上が必要です");
        }
        if self.overlay.sample_rate == 0 {
            bail!("overlay.sample_rate は正の値が必要です");
        }
        if self.overlay.channels == 0 {
            bail!("overlay.channels は1以上が必要です");
        }
        if self.overlay.tail_secs < 0.0 {
            bail!("overlay.tail_secs は負にできません: {}", self.overlay.tail_secs);
        }
        Ok(())
    }
}
