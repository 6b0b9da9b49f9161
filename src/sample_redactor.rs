//! サンプル直接書き換えによる墨消し
//!
//! 生のPCMサンプルに直接アドレスできるフォーマット (WAV) 専用。
//! 計画の各区間をチャンネル毎に合成トーンで上書きする。
//! デコード → 排他的な書き換え → 元のサンプルフォーマットで
//! 再エンコード、という線形の所有権移動で処理する。
//! リサンプリングやチャンネル数の変更は行わない。

use crate::error::RedactError;
use crate::tone::{self, ToneParams};
use crate::types::{AudioBuffer, RedactionPlan, SampleI16};
use hound::{SampleFormat, WavSpec};
use std::path::Path;

/// WAVファイルをオーディオバッファにデコード
///
/// # Errors
///
/// * `RedactError::Decode` - PCMコンテナとして解析できない
/// * `RedactError::UnsupportedFormat` - 16bit整数PCM以外のフォーマット
pub fn decode_wav<P: AsRef<Path>>(path: P) -> Result<(AudioBuffer, WavSpec), RedactError> {
    let mut reader = hound::WavReader::open(path.as_ref())
        .map_err(|e| RedactError::Decode(format!("{:?}: {}", path.as_ref(), e)))?;

    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(RedactError::UnsupportedFormat(format!(
            "16bit整数PCMのみ対応 (実際: {:?} {}bit)",
            spec.sample_format, spec.bits_per_sample
        )));
    }

    let interleaved: Vec<SampleI16> = reader
        .samples::<SampleI16>()
        .collect::<Result<_, _>>()
        .map_err(|e| RedactError::Decode(format!("サンプル読み込み失敗: {}", e)))?;

    // インターリーブ形式からチャンネル毎の配列に分離
    let channel_count = spec.channels as usize;
    let frames = interleaved.len() / channel_count;
    let mut channels = vec![Vec::with_capacity(frames); channel_count];
    for frame in interleaved.chunks_exact(channel_count) {
        for (ch, &sample) in frame.iter().enumerate() {
            channels[ch].push(sample);
        }
    }

    Ok((
        AudioBuffer {
            sample_rate: spec.sample_rate,
            channels,
        },
        spec,
    ))
}

/// オーディオバッファをWAVファイルにエンコード
///
/// 元のサンプルフォーマット (spec) のままインターリーブして書き出す。
pub fn encode_wav<P: AsRef<Path>>(
    buffer: &AudioBuffer,
    spec: WavSpec,
    path: P,
) -> Result<(), RedactError> {
    let mut writer = hound::WavWriter::create(path.as_ref(), spec)
        .map_err(|e| RedactError::Io(std::io::Error::other(e.to_string())))?;

    let num_samples = buffer.num_samples();
    for frame in 0..num_samples {
        for channel in &buffer.channels {
            writer
                .write_sample(channel[frame])
                .map_err(|e| RedactError::Io(std::io::Error::other(e.to_string())))?;
        }
    }

    writer
        .finalize()
        .map_err(|e| RedactError::Io(std::io::Error::other(e.to_string())))?;

    Ok(())
}

/// 計画の各区間をトーンで上書き
///
/// 区間毎に `start_sample = floor(start * rate)`、
/// `end_sample = floor(end * rate)` を計算し、`[0, total]` に
/// クランプした上で `[start_sample, end_sample)` を全チャンネル
/// 上書きする。トーンの位相は各区間の先頭で0にリセットされる
/// (絶対時刻0ではない)。クランプ後に長さ0になった区間は
/// エラーにせず黙ってスキップする。
///
/// 計画の非重複不変条件により、上書きが衝突することはない。
pub fn redact_buffer(buffer: &mut AudioBuffer, plan: &RedactionPlan, params: &ToneParams) {
    let rate = buffer.sample_rate;
    let total = buffer.num_samples();
    let channel_count = buffer.channel_count();

    for sensitive in plan.spans() {
        let start_sample = ((sensitive.span.start * rate as f64).floor() as usize).min(total);
        let end_sample = ((sensitive.span.end * rate as f64).floor() as usize).min(total);

        if start_sample >= end_sample {
            log::debug!(
                "範囲外または長さ0の区間をスキップ: [{:.3}, {:.3}]",
                sensitive.span.start,
                sensitive.span.end
            );
            continue;
        }

        let tone = tone::synthesize_samples(end_sample - start_sample, rate, channel_count, params);
        for (ch, samples) in buffer.channels.iter_mut().enumerate() {
            samples[start_sample..end_sample].copy_from_slice(&tone.channels[ch]);
        }
    }
}

/// WAVファイルを墨消しして出力
///
/// デコード、区間の上書き、再エンコードをまとめた入口。
/// 戦略エグゼキュータのプロセス内バッファ戦略から呼ばれる。
pub fn redact_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    plan: &RedactionPlan,
    params: &ToneParams,
) -> Result<(), RedactError> {
    let (mut buffer, spec) = decode_wav(input)?;
    redact_buffer(&mut buffer, plan, params);
    encode_wav(&buffer, spec, output)?;

    log::info!(
        "サンプル書き換え完了: {} 区間, {:.2} 秒",
        plan.len(),
        buffer.duration_seconds()
    );

    Ok(())
}
