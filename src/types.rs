use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 16ビット整数型のオーディオサンプル
///
/// PCM形式の音声データを表現するための型エイリアス。
/// -32768 から 32767 の範囲の値を取る。
pub type SampleI16 = i16;

/// 時間区間
///
/// 音声タイムライン上の連続した区間を秒単位で表す。
/// 生成後は不変。`end > start` が不変条件。
///
/// # Examples
///
/// ```
/// # use dcr_redact::types::TimeSpan;
/// let span = TimeSpan::new(1.0, 2.5).unwrap();
/// assert_eq!(span.duration(), 1.5);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    /// 開始時刻 (秒、0以上)
    pub start: f64,

    /// 終了時刻 (秒、start より大きい)
    pub end: f64,
}

impl TimeSpan {
    /// 新しい時間区間を生成
    ///
    /// `end <= start` または `start < 0` の場合は `None` を返す。
    pub fn new(start: f64, end: f64) -> Option<Self> {
        if start >= 0.0 && end > start {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// 区間の長さ (秒)
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// 他の区間と重なる、または接しているか
    ///
    /// マージ判定に使用する。端点が一致する場合も true。
    pub fn overlaps_or_touches(&self, other: &TimeSpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// 文字起こし結果の単語
///
/// 外部の文字起こしコラボレータが生成する、
/// 時刻境界付きの単語レコード。順序付き・非重複で、
/// `start` は単調非減少であることが期待される。
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Word {
    /// 単語のテキスト
    pub text: String,

    /// 開始時刻 (秒)
    pub start: f64,

    /// 終了時刻 (秒)
    pub end: f64,
}

impl Word {
    /// 単語レコードが整形式かどうか
    ///
    /// `end <= start`、負の開始時刻、空テキストは不正とみなす。
    /// 不正な単語は検出時にスキップされ、件数のみ報告される。
    pub fn is_wellformed(&self) -> bool {
        !self.text.trim().is_empty() && self.start >= 0.0 && self.end > self.start
    }
}

/// パターン分類器の種類
///
/// 機微情報の検出に使う固定の分類器セット。
/// 設定ファイルの `[patterns] enabled` で有効化する。
///
/// # Examples
///
/// ```
/// # use dcr_redact::types::PatternKind;
/// let kind = PatternKind::PhoneNumber;
/// ```
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// 4桁以上の連続数字
    DigitRun,

    /// 電話番号 (0始まり10〜11桁)
    PhoneNumber,

    /// 個人番号 (12桁)
    PersonalNumber,

    /// 郵便番号 (7桁)
    PostalCode,

    /// メールアドレス
    EmailAddress,
}

impl PatternKind {
    /// 全分類器
    pub const ALL: [PatternKind; 5] = [
        PatternKind::DigitRun,
        PatternKind::PhoneNumber,
        PatternKind::PersonalNumber,
        PatternKind::PostalCode,
        PatternKind::EmailAddress,
    ];
}

/// 機微情報区間
///
/// 検出された時間区間と、マッチした分類器のラベル。
/// 単語境界の誤差を吸収するため、末尾バッファで延長済み。
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SensitiveSpan {
    /// 時間区間 (末尾バッファ適用後)
    pub span: TimeSpan,

    /// マッチした分類器 (重複なし)
    pub labels: Vec<PatternKind>,
}

/// 墨消し計画
///
/// 開始時刻順にソートされ、重複のない機微情報区間の列。
/// 重複区間はコンストラクタでマージされる。
/// 重複したまま合成すると同じ区間に二重にトーンが
/// 書き込まれ振幅が壊れるため、マージは正しさの不変条件。
///
/// # Examples
///
/// ```
/// # use dcr_redact::types::{RedactionPlan, SensitiveSpan, TimeSpan, PatternKind};
/// let plan = RedactionPlan::from_unmerged(vec![
///     SensitiveSpan {
///         span: TimeSpan::new(1.0, 2.0).unwrap(),
///         labels: vec![PatternKind::DigitRun],
///     },
///     SensitiveSpan {
///         span: TimeSpan::new(1.5, 3.0).unwrap(),
///         labels: vec![PatternKind::PhoneNumber],
///     },
/// ]);
/// assert_eq!(plan.len(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RedactionPlan {
    spans: Vec<SensitiveSpan>,
}

impl RedactionPlan {
    /// 空の計画
    pub fn empty() -> Self {
        Self { spans: Vec::new() }
    }

    /// 未マージの区間列から計画を構築
    ///
    /// ソートとマージを行い、不変条件 (ソート済み・非重複) を
    /// 構築時に保証する。接している区間 (端点一致) もマージする。
    pub fn from_unmerged(mut spans: Vec<SensitiveSpan>) -> Self {
        spans.sort_by(|a, b| {
            a.span
                .start
                .partial_cmp(&b.span.start)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut merged: Vec<SensitiveSpan> = Vec::with_capacity(spans.len());
        for span in spans {
            match merged.last_mut() {
                Some(last) if last.span.overlaps_or_touches(&span.span) => {
                    last.span.end = last.span.end.max(span.span.end);
                    for label in span.labels {
                        if !last.labels.contains(&label) {
                            last.labels.push(label);
                        }
                    }
                }
                _ => merged.push(span),
            }
        }

        Self { spans: merged }
    }

    /// 区間数
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// 区間が無いか
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// 区間列への参照
    pub fn spans(&self) -> &[SensitiveSpan] {
        &self.spans
    }

    /// 最も遅い終了時刻 (秒)
    pub fn max_end(&self) -> Option<f64> {
        self.spans
            .iter()
            .map(|s| s.span.end)
            .fold(None, |acc, end| Some(acc.map_or(end, |a: f64| a.max(end))))
    }
}

/// オーディオバッファ
///
/// チャンネル毎に分離されたPCMサンプル列。
/// 全チャンネルのサンプル数は等しい (コンストラクタで保証)。
/// 所有権は常に単一のコンポーネントにあり、
/// デコード → 墨消し (排他的な書き換え) → エンコードの順に
/// 線形に移動する。
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    /// サンプリングレート (Hz)
    pub sample_rate: u32,

    /// チャンネル毎のサンプル配列 (等長)
    pub channels: Vec<Vec<SampleI16>>,
}

impl AudioBuffer {
    /// 無音バッファを生成
    pub fn silence(sample_rate: u32, channels: u16, num_samples: usize) -> Self {
        Self {
            sample_rate,
            channels: vec![vec![0; num_samples]; channels as usize],
        }
    }

    /// チャンネル数
    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// チャンネル毎のサンプル数
    pub fn num_samples(&self) -> usize {
        self.channels.first().map_or(0, |ch| ch.len())
    }

    /// 長さ (秒)
    pub fn duration_seconds(&self) -> f64 {
        self.num_samples() as f64 / self.sample_rate as f64
    }
}

/// 使用された墨消し戦略
///
/// フォールバックチェーンのどの戦略で出力が生成されたかを示す。
/// 呼び出し側は本当に墨消しが行われたのか、単なるコピーかを
/// この値で判別できる (無音の失敗より明示的な非墨消しを優先)。
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyUsed {
    /// 外部ツールによるサンプル書き換え
    ExternalTool,

    /// プロセス内バッファによるサンプル書き換え
    InProcessBuffer,

    /// オーバーレイトラックのパッケージング
    OverlayTrack,

    /// 原本の無加工コピー (墨消しなし)
    Passthrough,
}

/// 墨消し成果物
///
/// ジョブ毎にちょうど1つのバリアントが生成される。
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RedactionArtifact {
    /// サンプル書き換え済みの単一ファイル
    Mutated {
        /// 出力ファイルのパス
        output: PathBuf,
    },

    /// 原本コピー + トーントラック + 再生記述子の3点セット
    Overlaid {
        /// 原本の無加工コピー
        original_track: PathBuf,
        /// トーンのみのトラック
        tone_track: PathBuf,
        /// 同期再生用の記述子 (JSON)
        descriptor: PathBuf,
    },

    /// 原本の無加工コピー
    Passthrough {
        /// 出力ファイルのパス
        output: PathBuf,
    },
}

/// 墨消し結果
///
/// ジョブの最終成果物。ストレージ/ジョブ層に渡され、
/// JSON形式で標準出力にも出力される。
///
/// # JSON出力例
///
/// ```json
/// {
///   "artifact": { "kind": "mutated", "output": "./out/redacted.wav" },
///   "strategy_used": "in_process_buffer",
///   "span_count": 3,
///   "finished_at": "2025-01-02T14:30:15+09:00"
/// }
/// ```
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct RedactionResult {
    /// 成果物
    pub artifact: RedactionArtifact,

    /// 使用された戦略
    pub strategy_used: StrategyUsed,

    /// 計画に含まれていた区間数
    pub span_count: usize,

    /// 完了時刻 (RFC 3339)
    pub finished_at: String,
}

impl RedactionResult {
    /// 新しい墨消し結果を作成
    ///
    /// 完了時刻には現在時刻が記録される。
    pub fn new(artifact: RedactionArtifact, strategy_used: StrategyUsed, span_count: usize) -> Self {
        Self {
            artifact,
            strategy_used,
            span_count,
            finished_at: chrono::Local::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_span_creation() {
        let span = TimeSpan::new(1.0, 2.0).unwrap();
        assert_eq!(span.start, 1.0);
        assert_eq!(span.end, 2.0);
        assert_eq!(span.duration(), 1.0);

        // 不正な区間
        assert!(TimeSpan::new(2.0, 1.0).is_none());
        assert!(TimeSpan::new(1.0, 1.0).is_none());
        assert!(TimeSpan::new(-0.5, 1.0).is_none());
    }

    #[test]
    fn test_time_span_overlap() {
        let a = TimeSpan::new(1.0, 2.0).unwrap();
        let b = TimeSpan::new(1.5, 3.0).unwrap();
        let c = TimeSpan::new(2.0, 3.0).unwrap(); // 接している
        let d = TimeSpan::new(2.5, 3.0).unwrap(); // 離れている

        assert!(a.overlaps_or_touches(&b));
        assert!(b.overlaps_or_touches(&a));
        assert!(a.overlaps_or_touches(&c));
        assert!(!a.overlaps_or_touches(&d));
    }

    #[test]
    fn test_word_wellformed() {
        let ok = Word {
            text: "こちら".to_string(),
            start: 0.0,
            end: 0.5,
        };
        assert!(ok.is_wellformed());

        let empty_text = Word {
            text: "   ".to_string(),
            start: 0.0,
            end: 0.5,
        };
        assert!(!empty_text.is_wellformed());

        let inverted = Word {
            text: "abc".to_string(),
            start: 1.0,
            end: 0.5,
        };
        assert!(!inverted.is_wellformed());
    }

    #[test]
    fn test_plan_merges_overlapping_spans() {
        let plan = RedactionPlan::from_unmerged(vec![
            SensitiveSpan {
                span: TimeSpan::new(1.0, 2.0).unwrap(),
                labels: vec![PatternKind::DigitRun],
            },
            SensitiveSpan {
                span: TimeSpan::new(1.5, 3.0).unwrap(),
                labels: vec![PatternKind::PhoneNumber],
            },
        ]);

        assert_eq!(plan.len(), 1);
        let merged = &plan.spans()[0];
        assert_eq!(merged.span.start, 1.0);
        assert_eq!(merged.span.end, 3.0);
        // ラベルは統合され重複しない
        assert_eq!(merged.labels.len(), 2);
    }

    #[test]
    fn test_plan_merges_touching_spans() {
        // 端点が一致する区間もマージされる
        let plan = RedactionPlan::from_unmerged(vec![
            SensitiveSpan {
                span: TimeSpan::new(0.0, 1.0).unwrap(),
                labels: vec![PatternKind::DigitRun],
            },
            SensitiveSpan {
                span: TimeSpan::new(1.0, 2.0).unwrap(),
                labels: vec![PatternKind::DigitRun],
            },
        ]);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.spans()[0].span.end, 2.0);
        assert_eq!(plan.spans()[0].labels, vec![PatternKind::DigitRun]);
    }

    #[test]
    fn test_plan_sorts_by_start() {
        let plan = RedactionPlan::from_unmerged(vec![
            SensitiveSpan {
                span: TimeSpan::new(5.0, 6.0).unwrap(),
                labels: vec![],
            },
            SensitiveSpan {
                span: TimeSpan::new(1.0, 2.0).unwrap(),
                labels: vec![],
            },
        ]);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.spans()[0].span.start, 1.0);
        assert_eq!(plan.spans()[1].span.start, 5.0);
        assert_eq!(plan.max_end(), Some(6.0));
    }

    #[test]
    fn test_empty_plan() {
        let plan = RedactionPlan::empty();
        assert!(plan.is_empty());
        assert_eq!(plan.max_end(), None);
    }

    #[test]
    fn test_audio_buffer_silence() {
        let buf = AudioBuffer::silence(16000, 2, 16000);
        assert_eq!(buf.channel_count(), 2);
        assert_eq!(buf.num_samples(), 16000);
        assert_eq!(buf.duration_seconds(), 1.0);
        assert!(buf.channels.iter().all(|ch| ch.iter().all(|&s| s == 0)));
    }

    #[test]
    fn test_pattern_kind_serialization() {
        let json = serde_json::to_string(&PatternKind::PhoneNumber).unwrap();
        assert_eq!(json, r#""phone_number""#);

        let deserialized: PatternKind = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, PatternKind::PhoneNumber);
    }

    #[test]
    fn test_strategy_used_serialization() {
        let json = serde_json::to_string(&StrategyUsed::Passthrough).unwrap();
        assert_eq!(json, r#""passthrough""#);
        let json = serde_json::to_string(&StrategyUsed::ExternalTool).unwrap();
        assert_eq!(json, r#""external_tool""#);
    }

    #[test]
    fn test_redaction_result_json() {
        let result = RedactionResult::new(
            RedactionArtifact::Mutated {
                output: PathBuf::from("/tmp/out.wav"),
            },
            StrategyUsed::InProcessBuffer,
            3,
        );

        let json = serde_json::to_string(&result).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["artifact"]["kind"], "mutated");
        assert_eq!(parsed["strategy_used"], "in_process_buffer");
        assert_eq!(parsed["span_count"], 3);
        assert!(!parsed["finished_at"].as_str().unwrap().is_empty());
    }
}
