use thiserror::Error;

/// 墨消し処理のエラー分類
///
/// 戦略エグゼキュータはこの分類に基づいてフォールバックを判断する。
/// `Decode` と `ToolInvocation` は次の戦略への降格で局所的に回復され、
/// 呼び出し側には決して伝播しない。`UnsupportedFormat` は
/// パススルーまで降格する。パススルー中の `Io` のみ致命的で、
/// これ以上のフォールバックが存在しないため呼び出し側に伝播する。
#[derive(Debug, Error)]
pub enum RedactError {
    /// 音声データをPCMコンテナとして解析できなかった
    #[error("音声データのデコードに失敗: {0}")]
    Decode(String),

    /// 外部ツールの起動失敗・異常終了・出力欠落
    #[error("外部ツールの実行に失敗: {0}")]
    ToolInvocation(String),

    /// サンプル直接操作もオーバーレイも適用できないフォーマット
    #[error("未対応のオーディオフォーマット: {0}")]
    UnsupportedFormat(String),

    /// ファイルシステムの読み書き・コピー失敗
    #[error("入出力エラー: {0}")]
    Io(#[from] std::io::Error),
}
