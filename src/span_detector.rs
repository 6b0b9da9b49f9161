use crate::config::DetectorConfig;
use crate::patterns::PatternSet;
use crate::types::{PatternKind, RedactionPlan, SensitiveSpan, TimeSpan, Word};

/// 機微情報区間の検出器
///
/// 時刻境界付きの単語列を走査し、分類器にマッチした単語を
/// マージ済みの墨消し計画に変換する。
///
/// # アルゴリズム
///
/// 1. 不正な単語 (end <= start、空テキスト) をスキップし件数を記録
/// 2. 各単語について、単語単体と後続単語との連結
///    (最大 `lookahead_words` 語、空白1つで結合) を分類器に照合。
///    連結がウィンドウ全体にまたがってマッチした場合は
///    ウィンドウ内の全単語をフラグする
///    (グループ読みされた電話番号などトークン分割されたパターンを捕捉)
/// 3. フラグ付き単語の連続をアキュムレータで1つの区間にまとめ、
///    区間を閉じる際に末尾バッファを加算して境界誤差を吸収
/// 4. 延長後に接触・重複した区間をマージ
///    (重複区間は同じサンプルに二重にトーンを合成して振幅を
///    壊すため、マージは省略できない)
///
/// 決して失敗しない。同じ入力に対しては常に同じ計画を返す。
///
/// # Examples
///
/// ```
/// # use dcr_redact::span_detector::SpanDetector;
/// # use dcr_redact::patterns::PatternSet;
/// # use dcr_redact::config::DetectorConfig;
/// # use dcr_redact::types::Word;
/// let detector = SpanDetector::new(&DetectorConfig::default());
/// let patterns = PatternSet::all();
/// let words = vec![Word { text: "0312345678".to_string(), start: 1.0, end: 2.0 }];
/// let detection = detector.detect(&words, &patterns);
/// assert_eq!(detection.plan.len(), 1);
/// ```
pub struct SpanDetector {
    /// 区間を閉じる際に終端へ加算する秒数
    trailing_buffer_secs: f64,

    /// 連結照合する単語ウィンドウの最大長
    lookahead_words: usize,
}

/// 検出結果
///
/// 計画に加えて、スキップした不正単語の件数を
/// 観測用に呼び出し側へ報告する。
#[derive(Debug)]
pub struct Detection {
    /// 墨消し計画 (ソート済み・非重複)
    pub plan: RedactionPlan,

    /// スキップした不正単語の件数
    pub skipped_words: usize,
}

impl SpanDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            trailing_buffer_secs: config.trailing_buffer_secs,
            lookahead_words: config.lookahead_words.max(1),
        }
    }

    /// 単語列から墨消し計画を検出
    ///
    /// # Arguments
    /// * `words` - 文字起こしコラボレータが生成した単語列 (空でもよい)
    /// * `patterns` - 有効な分類器セット
    pub fn detect(&self, words: &[Word], patterns: &PatternSet) -> Detection {
        let valid: Vec<&Word> = words.iter().filter(|w| w.is_wellformed()).collect();
        let skipped_words = words.len() - valid.len();

        if skipped_words > 0 {
            log::warn!("不正な単語レコードを {} 件スキップしました", skipped_words);
        }

        // 空の入力・空のルールセットからは何も検出しない
        if valid.is_empty() || patterns.is_empty() {
            return Detection {
                plan: RedactionPlan::empty(),
                skipped_words,
            };
        }

        let (flagged, labels) = self.flag_words(&valid, patterns);
        let spans = self.accumulate_spans(&valid, &flagged, &labels);

        Detection {
            plan: RedactionPlan::from_unmerged(spans),
            skipped_words,
        }
    }

    /// 各単語のフラグとマッチラベルを計算
    ///
    /// 単語単体の照合に加え、ウィンドウ長 2 から `lookahead_words` までの
    /// 連結テキストを照合する。連結ウィンドウは「分割されたパターン」の
    /// 捕捉専用: 先頭側・末尾側いずれかの部分ウィンドウが単独で
    /// マッチする場合はそちらで捕捉済みとみなし、ウィンドウ全体は
    /// フラグしない。これにより数字の隣の無関係な単語が
    /// 区間に引き込まれるのを防ぐ。
    fn flag_words(
        &self,
        words: &[&Word],
        patterns: &PatternSet,
    ) -> (Vec<bool>, Vec<Vec<PatternKind>>) {
        let n = words.len();
        let mut flagged = vec![false; n];
        let mut labels: Vec<Vec<PatternKind>> = vec![Vec::new(); n];

        let join = |i: usize, window: usize| {
            words[i..i + window]
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        };

        let mut mark = |j: usize, kinds: &[PatternKind], labels: &mut Vec<Vec<PatternKind>>| {
            flagged[j] = true;
            for &kind in kinds {
                if !labels[j].contains(&kind) {
                    labels[j].push(kind);
                }
            }
        };

        for i in 0..n {
            // 単語単体の照合
            let kinds = patterns.matching_kinds(&words[i].text);
            if !kinds.is_empty() {
                mark(i, &kinds, &mut labels);
            }

            // 連結ウィンドウの照合 (トークン分割されたパターンのみ)
            for window in 2..=self.lookahead_words {
                if i + window > n {
                    break;
                }

                let kinds = patterns.matching_kinds(&join(i, window));
                if kinds.is_empty() {
                    continue;
                }

                // 部分ウィンドウが単独でマッチするなら、マッチは
                // ウィンドウ全体にまたがっていない
                if patterns.is_match(&join(i, window - 1))
                    || patterns.is_match(&join(i + 1, window - 1))
                {
                    continue;
                }

                for j in i..i + window {
                    mark(j, &kinds, &mut labels);
                }
            }
        }

        (flagged, labels)
    }

    /// フラグ付き単語の連続を区間にまとめる
    ///
    /// 最初のフラグ付き単語で区間を開き、連続する間は終端を延長、
    /// フラグの無い単語で末尾バッファを加算して閉じる。
    /// 入力末尾に開いたままの区間があればフラッシュする。
    fn accumulate_spans(
        &self,
        words: &[&Word],
        flagged: &[bool],
        labels: &[Vec<PatternKind>],
    ) -> Vec<SensitiveSpan> {
        let mut spans = Vec::new();
        let mut open: Option<(f64, f64, Vec<PatternKind>)> = None;

        for (i, word) in words.iter().enumerate() {
            if flagged[i] {
                match &mut open {
                    Some((_, end, open_labels)) => {
                        *end = end.max(word.end);
                        for &kind in &labels[i] {
                            if !open_labels.contains(&kind) {
                                open_labels.push(kind);
                            }
                        }
                    }
                    None => {
                        open = Some((word.start, word.end, labels[i].clone()));
                    }
                }
            } else if let Some((start, end, open_labels)) = open.take() {
                self.push_span(&mut spans, start, end, open_labels);
            }
        }

        if let Some((start, end, open_labels)) = open {
            self.push_span(&mut spans, start, end, open_labels);
        }

        spans
    }

    /// 末尾バッファを加算して区間を確定
    fn push_span(
        &self,
        spans: &mut Vec<SensitiveSpan>,
        start: f64,
        end: f64,
        labels: Vec<PatternKind>,
    ) {
        if let Some(span) = TimeSpan::new(start, end + self.trailing_buffer_secs) {
            spans.push(SensitiveSpan { span, labels });
        }
    }
}
