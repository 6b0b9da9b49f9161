//! dcr-redact - 音声記録の機微情報マスキングシステム
//!
//! このクレートは、単語単位の時刻付き文字起こしをもとに
//! 音声記録中の機微情報 (電話番号、個人番号など) の区間を特定し、
//! 可聴トーンで上書き・マスクした音声成果物を生成するシステムを提供します。
//!
//! # 主な機能
//!
//! - **区間検出**: パターン分類器とルックアヘッド連結照合による機微情報区間の特定
//! - **トーン合成**: 決定的な正弦波の生成 (再現可能なテストのため)
//! - **サンプル書き換え**: WAVのPCMサンプルを区間毎にトーンで直接上書き
//! - **オーバーレイパッケージング**: 圧縮フォーマット向けの同期トーントラック生成
//! - **戦略フォールバック**: 外部ツール → プロセス内バッファ → パススルーの降格チェーンで出力を必ず保証
//!
//! # アーキテクチャ
//!
//! ```text
//! [Transcript JSON] → [SpanDetector] → [RedactionPlan]
//!                                            ↓
//!                                   [StrategyExecutor]
//!                                            ↓
//!                        ┌───────────────────┼───────────────────┐
//!                        │                   │                   │
//!                  [ExternalTool]   [SampleRedactor]     [Passthrough]
//!                        │           [OverlayPackager]           │
//!                        │                   │                   │
//!                        └───────→ [RedactionResult] ←───────────┘
//! ```
//!
//! # 使用例
//!
//! ```no_run
//! use dcr_redact::config::Config;
//! use dcr_redact::executor::StrategyExecutor;
//! use dcr_redact::patterns::PatternSet;
//! use dcr_redact::span_detector::SpanDetector;
//! use dcr_redact::transcript;
//! use std::path::Path;
//!
//! let config = Config::load_or_default("config.toml").unwrap();
//! let words = transcript::load_words("transcript.json").unwrap();
//!
//! let detector = SpanDetector::new(&config.detector);
//! let patterns = PatternSet::new(&config.patterns.enabled);
//! let detection = detector.detect(&words, &patterns);
//!
//! let executor = StrategyExecutor::new(&config).unwrap();
//! let result = executor
//!     .execute(Path::new("in.wav"), &detection.plan, Path::new("out.wav"))
//!     .unwrap();
//! println!("{:?}", result.strategy_used);
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod overlay;
pub mod patterns;
pub mod sample_redactor;
pub mod span_detector;
pub mod tone;
pub mod transcript;
pub mod types;
