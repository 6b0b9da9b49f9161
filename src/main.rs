use anyhow::{bail, Context, Result};
use dcr_redact::config::Config;
use dcr_redact::executor::StrategyExecutor;
use dcr_redact::patterns::PatternSet;
use dcr_redact::span_detector::SpanDetector;
use dcr_redact::transcript;
use dcr_redact::types::RedactionResult;
use env_logger::Env;
use rayon::prelude::*;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// バッチマニフェストの1ジョブ
///
/// ジョブは互いに独立で、パスはジョブ毎に一意であることを
/// マニフェスト作成側が保証する。
#[derive(Debug, Deserialize)]
struct JobSpec {
    /// 入力音声のパス
    source: PathBuf,
    /// 文字起こしJSONのパス
    transcript: PathBuf,
    /// 出力先のパス
    output: PathBuf,
}

fn main() -> Result<()> {
    // ロガーを初期化
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    // コマンドライン引数をパース
    let args: Vec<String> = std::env::args().collect();

    // 設定ファイル生成モード
    if args.len() > 1 && args[1] == "--generate-config" {
        let config_path = if args.len() > 2 {
            &args[2]
        } else {
            "config.toml"
        };
        Config::write_default(config_path)?;
        println!("設定ファイルを生成しました: {}", config_path);
        return Ok(());
    }

    // バッチモード
    if args.len() > 1 && args[1] == "--batch" {
        if args.len() < 3 {
            bail!("使い方: dcr-redact --batch <manifest.json> [config.toml]");
        }
        let config_path = if args.len() > 3 { &args[3] } else { "config.toml" };
        let config = load_config(config_path)?;
        return run_batch(&config, Path::new(&args[2]));
    }

    // 単一ジョブモード
    if args.len() < 4 {
        bail!(
            "使い方: dcr-redact <音声ファイル> <文字起こしJSON> <出力先> [config.toml]\n\
             または: dcr-redact --batch <manifest.json> [config.toml]\n\
             または: dcr-redact --generate-config [config.toml]"
        );
    }

    let config_path = if args.len() > 4 { &args[4] } else { "config.toml" };
    let config = load_config(config_path)?;

    let result = run_job(
        &config,
        Path::new(&args[1]),
        Path::new(&args[2]),
        Path::new(&args[3]),
    )?;

    // JSON形式で出力 (ジョブ/ストレージ層が読む)
    println!("{}", serde_json::to_string(&result)?);

    Ok(())
}

fn load_config(path: &str) -> Result<Config> {
    let config = Config::load_or_default(path)?;
    config.validate()?;
    log::debug!("設定: {:?}", config);
    Ok(config)
}

/// 1ジョブの墨消しを実行
fn run_job(
    config: &Config,
    source: &Path,
    transcript_path: &Path,
    output: &Path,
) -> Result<RedactionResult> {
    log::info!("墨消しジョブ開始: {:?} -> {:?}", source, output);

    let words = transcript::load_words(transcript_path)?;
    log::info!("単語数: {}", words.len());

    let detector = SpanDetector::new(&config.detector);
    let patterns = PatternSet::new(&config.patterns.enabled);
    let detection = detector.detect(&words, &patterns);

    if detection.skipped_words > 0 {
        log::warn!(
            "不正な単語を {} 件スキップしました: {:?}",
            detection.skipped_words,
            transcript_path
        );
    }
    log::info!("検出区間数: {}", detection.plan.len());

    let executor = StrategyExecutor::new(config)?;
    let result = executor.execute(source, &detection.plan, output)?;

    log::info!(
        "墨消しジョブ完了: 戦略 {:?}, {} 区間",
        result.strategy_used,
        result.span_count
    );

    Ok(result)
}

/// マニフェストの全ジョブを並列実行
///
/// 各ジョブは独立しているため rayon で並列処理する。
/// 同時実行数の制限はスケジューリング層の責務であり、
/// ここでは課さない。1つのジョブが失敗しても残りは続行し、
/// 最後に失敗数を報告する。
fn run_batch(config: &Config, manifest_path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(manifest_path)
        .with_context(|| format!("マニフェストの読み込みに失敗: {:?}", manifest_path))?;
    let jobs: Vec<JobSpec> = serde_json::from_str(&content)
        .with_context(|| format!("マニフェストのパースに失敗: {:?}", manifest_path))?;

    log::info!("バッチ開始: {} ジョブ", jobs.len());

    let outcomes: Vec<Result<RedactionResult>> = jobs
        .par_iter()
        .map(|job| run_job(config, &job.source, &job.transcript, &job.output))
        .collect();

    let mut failures = 0;
    for (job, outcome) in jobs.iter().zip(outcomes) {
        match outcome {
            Ok(result) => {
                if let Ok(json) = serde_json::to_string(&result) {
                    println!("{}", json);
                }
            }
            Err(e) => {
                failures += 1;
                log::error!("ジョブ失敗: {:?}: {:#}", job.source, e);
            }
        }
    }

    if failures > 0 {
        bail!("{} 件のジョブが失敗しました", failures);
    }

    log::info!("バッチ完了: {} ジョブ", jobs.len());
    Ok(())
}
