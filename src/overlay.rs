//! オーバーレイトラックのパッケージング
//!
//! 圧縮・非可逆フォーマットなど、サンプルを直接書き換えられない
//! 音源向けの墨消し。原本はデコードせずそのままコピーし
//! (知覚品質を完全に保存)、機微情報区間にだけトーンの入った
//! 独立トラックと、両トラックを同じ再生位置から同時再生するための
//! 記述子を生成する。単一トラックの正確な墨消しと引き換えに、
//! フォーマット互換性を優先する戦略。

use crate::config::OverlayConfig;
use crate::error::RedactError;
use crate::sample_redactor;
use crate::tone::ToneParams;
use crate::types::{AudioBuffer, RedactionPlan, TimeSpan};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 再生記述子
///
/// 原本トラックとトーントラックを同じ再生位置から同時に
/// 再生するためのメタデータ。消費側プレイヤーはこれを読んで
/// 両トラックを並行再生し、機微情報区間をトーンで可聴マスクする。
///
/// # JSON形式
///
/// ```json
/// {
///   "spans": [{ "start": 2.0, "end": 3.0 }],
///   "originalTrack": "out.original.mp3",
///   "toneTrack": "out.tone.wav"
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackDescriptor {
    /// 墨消し区間の境界リスト
    pub spans: Vec<TimeSpan>,

    /// 原本トラックのパス
    pub original_track: PathBuf,

    /// トーントラックのパス
    pub tone_track: PathBuf,
}

/// パッケージングで生成される3点セットのパス
#[derive(Clone, Debug)]
pub struct OverlayArtifacts {
    /// 原本の無加工コピー
    pub original_track: PathBuf,

    /// トーンのみのトラック (WAV)
    pub tone_track: PathBuf,

    /// 再生記述子 (JSON)
    pub descriptor: PathBuf,
}

/// 音源をオーバーレイ形式でパッケージング
///
/// 1. 原本を無加工のままコピー (デコード/再エンコードの往復なし)
/// 2. `[0, 最終区間の終端 + tail_secs]` の無音バッファを固定の
///    標準サンプルレート・チャンネル数で作り、各区間に
///    サンプル書き換えと同一の手順でトーンを合成
/// 3. トーントラックをWAVとしてエンコード
/// 4. 再生記述子を書き出し
///
/// 出力ファイル名は要求された出力パスから導出する:
/// `<stem>.original.<元の拡張子>`、`<stem>.tone.wav`、`<stem>.overlay.json`。
pub fn package<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    plan: &RedactionPlan,
    output: Q,
    config: &OverlayConfig,
    params: &ToneParams,
) -> Result<OverlayArtifacts, RedactError> {
    let source = source.as_ref();
    let output = output.as_ref();

    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("redacted")
        .to_string();
    let dir = output.parent().unwrap_or_else(|| Path::new("."));
    let source_ext = source.extension().and_then(|e| e.to_str()).unwrap_or("bin");

    let original_track = dir.join(format!("{}.original.{}", stem, source_ext));
    let tone_track = dir.join(format!("{}.tone.wav", stem));
    let descriptor_path = dir.join(format!("{}.overlay.json", stem));

    // 原本は一切加工しない
    fs::copy(source, &original_track)?;

    // 無音バッファに区間だけトーンを合成
    let duration = plan.max_end().unwrap_or(0.0) + config.tail_secs;
    let num_samples = (duration * config.sample_rate as f64).ceil() as usize;
    let mut buffer = AudioBuffer::silence(config.sample_rate, config.channels, num_samples);
    sample_redactor::redact_buffer(&mut buffer, plan, params);

    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    sample_redactor::encode_wav(&buffer, spec, &tone_track)?;

    let descriptor = PlaybackDescriptor {
        spans: plan.spans().iter().map(|s| s.span).collect(),
        original_track: original_track.clone(),
        tone_track: tone_track.clone(),
    };
    let json = serde_json::to_string_pretty(&descriptor)
        .map_err(|e| RedactError::Io(std::io::Error::other(e.to_string())))?;
    fs::write(&descriptor_path, json)?;

    log::info!(
        "オーバーレイパッケージング完了: {} 区間, トーントラック {:.2} 秒",
        plan.len(),
        buffer.duration_seconds()
    );

    Ok(OverlayArtifacts {
        original_track,
        tone_track,
        descriptor: descriptor_path,
    })
}
