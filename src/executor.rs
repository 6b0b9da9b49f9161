//! 墨消し戦略エグゼキュータ
//!
//! 優先順位付きのフォールバックチェーンで墨消しを実行する:
//!
//! ```text
//! TryExternalTool → TryInProcessBuffer → Passthrough → Done
//! ```
//!
//! コーデック互換性の実績がある外部ツールをまず試し、
//! ツールが使えなければプロセス内のバッファ操作で精密に書き換え、
//! それも失敗したら原本の無加工コピーを出力する。
//! 墨消しの正しさより「何らかの出力が必ず存在する」ことを保証し、
//! どの経路で出力されたかを結果に必ず記録する
//! (無音の墨消し失敗は明示的な非墨消しより悪い)。
//!
//! 各戦略は厳密に逐次実行される。並行して試すと一時ファイルの
//! 世代が競合するため。一時ファイルはジョブ毎の `TempDir` に
//! 閉じ込め、成功・降格・最終失敗のどの出口でも削除される。

use crate::config::{Config, ExecutorConfig, OverlayConfig};
use crate::error::RedactError;
use crate::overlay;
use crate::sample_redactor;
use crate::tone::ToneParams;
use crate::types::{RedactionArtifact, RedactionPlan, RedactionResult, StrategyUsed, TimeSpan};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// 墨消し戦略エグゼキュータ
///
/// ジョブ間で共有される状態は持たない。ジョブ毎に
/// `execute` を呼び出し、ソースと出力パスはジョブ毎に一意で
/// あることを呼び出し側が保証する。
pub struct StrategyExecutor {
    executor: ExecutorConfig,
    overlay: OverlayConfig,
    inplace_params: ToneParams,
    overlay_params: ToneParams,
}

impl StrategyExecutor {
    /// 設定からエグゼキュータを構築
    ///
    /// # Errors
    ///
    /// トーンパラメータの検証 (周波数 > 0、振幅 (0, 1]) に
    /// 失敗した場合にエラーを返す。
    pub fn new(config: &Config) -> Result<Self> {
        let inplace_params = ToneParams::new(config.tone.frequency_hz, config.tone.inplace_amplitude)
            .context("書き換え用トーンパラメータが不正")?;
        let overlay_params = ToneParams::new(config.tone.frequency_hz, config.tone.overlay_amplitude)
            .context("オーバーレイ用トーンパラメータが不正")?;

        Ok(Self {
            executor: config.executor.clone(),
            overlay: config.overlay.clone(),
            inplace_params,
            overlay_params,
        })
    }

    /// 墨消しジョブを実行
    ///
    /// 呼び出し側のジョブを失敗させることはない — 戦略を降格する。
    /// 唯一の例外は最終のパススルーコピー中のI/Oエラーで、
    /// これ以上のフォールバックが存在しないため伝播する。
    ///
    /// # Arguments
    /// * `source` - 入力音声のパス
    /// * `plan` - 墨消し計画 (空でもよい)
    /// * `output` - 出力先のパス
    pub fn execute(
        &self,
        source: &Path,
        plan: &RedactionPlan,
        output: &Path,
    ) -> Result<RedactionResult> {
        // 区間が無ければ墨消しの必要はなく、コピーのみ
        if plan.is_empty() {
            log::info!("墨消し区間がないためコピーのみ: {:?}", source);
            self.passthrough(source, output)?;
            return Ok(RedactionResult::new(
                RedactionArtifact::Passthrough {
                    output: output.to_path_buf(),
                },
                StrategyUsed::Passthrough,
                0,
            ));
        }

        // ジョブスコープの一時ディレクトリ (ドロップ時に必ず削除)
        let temp_dir = tempfile::tempdir().context("一時ディレクトリの作成に失敗")?;

        if self.executor.use_external_tool {
            match self.try_external_tool(source, plan, output, temp_dir.path()) {
                Ok(()) => {
                    log::info!("外部ツール戦略で墨消し完了: {:?}", output);
                    return Ok(RedactionResult::new(
                        RedactionArtifact::Mutated {
                            output: output.to_path_buf(),
                        },
                        StrategyUsed::ExternalTool,
                        plan.len(),
                    ));
                }
                Err(e) => {
                    // 部分出力は信用せず、元のソースと計画のまま次の戦略へ
                    log::warn!("外部ツール戦略を降格: {}", e);
                }
            }
        } else {
            log::debug!("外部ツール戦略は設定で無効");
        }

        match self.try_in_process(source, plan, output) {
            Ok(result) => {
                log::info!("プロセス内戦略で墨消し完了: {:?}", output);
                return Ok(result);
            }
            Err(e) => {
                log::warn!("プロセス内バッファ戦略を降格: {}", e);
            }
        }

        // 最後の砦: 原本の無加工コピー。ここでの失敗のみ致命的
        self.passthrough(source, output)?;
        log::warn!(
            "全ての墨消し戦略が失敗したため無加工コピーを出力: {:?}",
            output
        );
        Ok(RedactionResult::new(
            RedactionArtifact::Passthrough {
                output: output.to_path_buf(),
            },
            StrategyUsed::Passthrough,
            plan.len(),
        ))
    }

    /// 外部ツールによるサンプル書き換え
    ///
    /// ツールはファイル全体を処理するため、区間 i の出力を
    /// 区間 i+1 の入力として一時ファイルを世代交代させながら
    /// 逐次適用する。起動失敗・非ゼロ終了・出力欠落のいずれも
    /// `ToolInvocation` として降格対象になる。
    fn try_external_tool(
        &self,
        source: &Path,
        plan: &RedactionPlan,
        output: &Path,
        temp: &Path,
    ) -> Result<(), RedactError> {
        if !is_wav(source) {
            return Err(RedactError::UnsupportedFormat(
                "外部ツール戦略はWAVソースのみ対応".to_string(),
            ));
        }

        // トーン合成にサンプルレートが必要なのでヘッダだけ読む
        let reader = hound::WavReader::open(source)
            .map_err(|e| RedactError::Decode(format!("WAVヘッダの読み込みに失敗: {}", e)))?;
        let sample_rate = reader.spec().sample_rate;
        drop(reader);

        let mut current: PathBuf = source.to_path_buf();
        for (i, sensitive) in plan.spans().iter().enumerate() {
            let next = temp.join(format!("span_{:03}.wav", i));
            self.run_tool_for_span(&current, &next, &sensitive.span, sample_rate)?;
            current = next;
        }

        fs::copy(&current, output)?;
        Ok(())
    }

    /// 1区間分の外部ツール呼び出し (spawn して終了を待つ)
    ///
    /// フィルタグラフ: 原区間をミュートし、区間開始まで遅延させた
    /// 正弦波をミックスする。stdout/stderr は診断ログ専用で、
    /// 制御フローには終了コードと出力ファイルの実在のみを使う。
    fn run_tool_for_span(
        &self,
        input: &Path,
        output: &Path,
        span: &TimeSpan,
        sample_rate: u32,
    ) -> Result<(), RedactError> {
        let delay_ms = (span.start * 1000.0).round() as u64;
        let filter = format!(
            "sine=frequency={freq}:sample_rate={rate}:duration={dur:.6}[s];\
             [s]adelay={delay}:all=1,volume={amp:.3}[tone];\
             [0:a]volume=0:enable='between(t,{start:.6},{end:.6})'[gap];\
             [gap][tone]amix=inputs=2:duration=first:normalize=0[mix]",
            freq = self.inplace_params.frequency_hz,
            rate = sample_rate,
            dur = span.duration(),
            delay = delay_ms,
            amp = self.inplace_params.amplitude,
            start = span.start,
            end = span.end,
        );

        let tool_output = Command::new(&self.executor.tool_command)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-filter_complex")
            .arg(&filter)
            .arg("-map")
            .arg("[mix]")
            .arg(output)
            .output()
            .map_err(|e| {
                RedactError::ToolInvocation(format!(
                    "{} の起動に失敗: {}",
                    self.executor.tool_command, e
                ))
            })?;

        if !tool_output.status.success() {
            log::debug!(
                "外部ツール stderr: {}",
                String::from_utf8_lossy(&tool_output.stderr)
            );
            return Err(RedactError::ToolInvocation(format!(
                "{} が異常終了 (終了コード {:?})",
                self.executor.tool_command,
                tool_output.status.code()
            )));
        }

        match fs::metadata(output) {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(RedactError::ToolInvocation(
                "出力ファイルが生成されませんでした".to_string(),
            )),
        }
    }

    /// プロセス内バッファによる墨消し
    ///
    /// WAVはデコードしてサンプルを直接書き換え、
    /// 圧縮・非可逆フォーマットはオーバーレイパッケージングに回す。
    fn try_in_process(
        &self,
        source: &Path,
        plan: &RedactionPlan,
        output: &Path,
    ) -> Result<RedactionResult, RedactError> {
        if is_wav(source) {
            sample_redactor::redact_file(source, output, plan, &self.inplace_params)?;
            Ok(RedactionResult::new(
                RedactionArtifact::Mutated {
                    output: output.to_path_buf(),
                },
                StrategyUsed::InProcessBuffer,
                plan.len(),
            ))
        } else {
            let artifacts =
                overlay::package(source, plan, output, &self.overlay, &self.overlay_params)?;
            Ok(RedactionResult::new(
                RedactionArtifact::Overlaid {
                    original_track: artifacts.original_track,
                    tone_track: artifacts.tone_track,
                    descriptor: artifacts.descriptor,
                },
                StrategyUsed::OverlayTrack,
                plan.len(),
            ))
        }
    }

    /// 原本の無加工コピー (最終状態)
    fn passthrough(&self, source: &Path, output: &Path) -> Result<()> {
        fs::copy(source, output)
            .with_context(|| format!("パススルーコピーに失敗: {:?} -> {:?}", source, output))?;
        Ok(())
    }
}

/// 拡張子でサンプル直接アドレス可能かを判定
fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_redactor::decode_wav;
    use crate::types::SensitiveSpan;
    use tempfile::TempDir;

    fn plan_of(spans: &[(f64, f64)]) -> RedactionPlan {
        RedactionPlan::from_unmerged(
            spans
                .iter()
                .map(|&(s, e)| SensitiveSpan {
                    span: TimeSpan::new(s, e).unwrap(),
                    labels: vec![],
                })
                .collect(),
        )
    }

    /// 外部ツールを無効化した設定
    fn config_without_tool() -> Config {
        let mut config = Config::default();
        config.executor.use_external_tool = false;
        config
    }

    /// 存在しない外部ツールを指す設定 (起動失敗をシミュレート)
    fn config_with_missing_tool() -> Config {
        let mut config = Config::default();
        config.executor.use_external_tool = true;
        config.executor.tool_command = "dcr-redact-no-such-tool".to_string();
        config
    }

    fn write_test_wav(path: &Path, seconds: usize) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..16000 * seconds {
            writer.write_sample((i % 800) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_empty_plan_copies_source() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("in.wav");
        let output = temp_dir.path().join("out.wav");
        write_test_wav(&source, 1);

        let executor = StrategyExecutor::new(&config_without_tool()).unwrap();
        let result = executor
            .execute(&source, &RedactionPlan::empty(), &output)
            .unwrap();

        assert_eq!(result.strategy_used, StrategyUsed::Passthrough);
        assert_eq!(result.span_count, 0);
        assert_eq!(fs::read(&source).unwrap(), fs::read(&output).unwrap());
    }

    #[test]
    fn test_in_process_strategy_mutates_wav() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("in.wav");
        let output = temp_dir.path().join("out.wav");
        write_test_wav(&source, 2);

        let executor = StrategyExecutor::new(&config_without_tool()).unwrap();
        let plan = plan_of(&[(0.5, 1.0)]);
        let result = executor.execute(&source, &plan, &output).unwrap();

        assert_eq!(result.strategy_used, StrategyUsed::InProcessBuffer);
        assert_eq!(result.span_count, 1);
        assert!(matches!(result.artifact, RedactionArtifact::Mutated { .. }));

        // 区間内が書き換わっている
        let (src_buf, _) = decode_wav(&source).unwrap();
        let (out_buf, _) = decode_wav(&output).unwrap();
        assert_ne!(
            &src_buf.channels[0][8000..16000],
            &out_buf.channels[0][8000..16000]
        );
        assert_eq!(&src_buf.channels[0][..8000], &out_buf.channels[0][..8000]);
    }

    #[test]
    fn test_missing_tool_demotes_to_in_process() {
        // 外部ツールの起動失敗は降格であってジョブ失敗ではない
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("in.wav");
        let output = temp_dir.path().join("out.wav");
        write_test_wav(&source, 2);

        let executor = StrategyExecutor::new(&config_with_missing_tool()).unwrap();
        let plan = plan_of(&[(0.5, 1.0)]);
        let result = executor.execute(&source, &plan, &output).unwrap();

        assert_eq!(result.strategy_used, StrategyUsed::InProcessBuffer);
        assert!(output.exists());
    }

    #[test]
    fn test_total_fallback_yields_byte_copy() {
        // ツール起動不可 + デコード不能 → パススルーが保証される
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("corrupt.wav");
        let output = temp_dir.path().join("out.wav");
        fs::write(&source, b"not pcm data, cannot be decoded").unwrap();

        let executor = StrategyExecutor::new(&config_with_missing_tool()).unwrap();
        let plan = plan_of(&[(0.0, 1.0)]);
        let result = executor.execute(&source, &plan, &output).unwrap();

        assert_eq!(result.strategy_used, StrategyUsed::Passthrough);
        assert_eq!(result.span_count, 1);
        // 出力は原本のバイトコピー
        assert_eq!(fs::read(&source).unwrap(), fs::read(&output).unwrap());
    }

    #[test]
    fn test_compressed_source_goes_overlay() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("meeting.mp3");
        let output = temp_dir.path().join("out.mp3");
        fs::write(&source, b"fake mp3 payload").unwrap();

        let executor = StrategyExecutor::new(&config_without_tool()).unwrap();
        let plan = plan_of(&[(2.0, 3.0)]);
        let result = executor.execute(&source, &plan, &output).unwrap();

        assert_eq!(result.strategy_used, StrategyUsed::OverlayTrack);
        match &result.artifact {
            RedactionArtifact::Overlaid {
                original_track,
                tone_track,
                descriptor,
            } => {
                assert_eq!(fs::read(original_track).unwrap(), b"fake mp3 payload");
                assert!(tone_track.exists());
                assert!(descriptor.exists());
            }
            other => panic!("Overlaidを期待: {:?}", other),
        }
    }

    #[test]
    fn test_fatal_io_error_propagates() {
        // ソースが存在しなければパススルーも不可能で、これは致命的
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("does-not-exist.wav");
        let output = temp_dir.path().join("out.wav");

        let executor = StrategyExecutor::new(&config_without_tool()).unwrap();
        let plan = plan_of(&[(0.0, 1.0)]);
        assert!(executor.execute(&source, &plan, &output).is_err());
    }

    #[test]
    fn test_invalid_tone_override_rejected() {
        let mut config = config_without_tool();
        config.tone.inplace_amplitude = 1.5;
        assert!(StrategyExecutor::new(&config).is_err());

        let mut config = config_without_tool();
        config.tone.frequency_hz = -10.0;
        assert!(StrategyExecutor::new(&config).is_err());
    }
}
