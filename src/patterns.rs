use crate::types::PatternKind;
use regex_lite::Regex;

/// パターン分類器セット
///
/// 機微情報のテキスト検出を行う、名前付き分類器の閉じた集合。
/// 元実装で場当たり的だった正規表現を固定の分類器に整理し、
/// 検出アルゴリズムから独立してテストできるようにしている。
///
/// 照合は正規化済みテキストに対して行う:
///
/// 1. 全角数字を半角に変換
/// 2. 小文字化
/// 3. 数字系パターンは空白・ハイフン・括弧・ピリオドを除去した
///    コンパクト形、メールアドレスは空白のみ除去した形を使用
///
/// トークン境界で分割されたパターン (グループ読みされた電話番号など) は、
/// 呼び出し側が連結したテキストを渡すことで捕捉される。
///
/// # Examples
///
/// ```
/// # use dcr_redact::patterns::PatternSet;
/// # use dcr_redact::types::PatternKind;
/// let patterns = PatternSet::new(&[PatternKind::DigitRun]);
/// assert!(patterns.is_match("123 45"));
/// assert!(!patterns.is_match("こちら本部"));
/// ```
pub struct PatternSet {
    classifiers: Vec<(PatternKind, Regex)>,
}

impl PatternSet {
    /// 指定した分類器を有効にしたセットを構築
    ///
    /// 重複した指定は1つにまとめられる。空の指定は
    /// 何にもマッチしないセットになる (空のルールセットから
    /// 誤検出を生まないため)。
    pub fn new(kinds: &[PatternKind]) -> Self {
        let mut seen: Vec<PatternKind> = Vec::new();
        let mut classifiers = Vec::new();

        for &kind in kinds {
            if seen.contains(&kind) {
                continue;
            }
            seen.push(kind);
            classifiers.push((kind, Regex::new(pattern_for(kind)).unwrap()));
        }

        Self { classifiers }
    }

    /// 全分類器を有効にしたセット
    pub fn all() -> Self {
        Self::new(&PatternKind::ALL)
    }

    /// テキストにマッチする分類器をすべて返す
    pub fn matching_kinds(&self, text: &str) -> Vec<PatternKind> {
        let compact = normalize_compact(text);
        let plain = normalize_plain(text);

        self.classifiers
            .iter()
            .filter(|(kind, regex)| {
                let target = match kind {
                    PatternKind::EmailAddress => plain.as_str(),
                    _ => compact.as_str(),
                };
                regex.is_match(target)
            })
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// いずれかの分類器にマッチするか
    pub fn is_match(&self, text: &str) -> bool {
        !self.matching_kinds(text).is_empty()
    }

    /// 有効な分類器の数
    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    /// 分類器が1つも無いか
    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }
}

/// 分類器毎の正規表現パターン
///
/// コンパクト形 (区切り除去済み) に対して照合するため、
/// 電話番号などは区切り文字を含まない形で書く。
fn pattern_for(kind: PatternKind) -> &'static str {
    match kind {
        PatternKind::DigitRun => r"\d{4,}",
        PatternKind::PhoneNumber => r"^0\d{9,10}$",
        PatternKind::PersonalNumber => r"^\d{12}$",
        PatternKind::PostalCode => r"^\d{7}$",
        PatternKind::EmailAddress => r"[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}",
    }
}

/// 全角数字を半角に変換し小文字化
fn to_halfwidth_lower(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            _ => c,
        })
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// コンパクト正規化 (数字系パターン用)
///
/// 空白・ハイフン類・括弧・ピリオドを除去する。
/// "03-1234-5678" や "123 45" がひと続きの数字列になる。
fn normalize_compact(text: &str) -> String {
    to_halfwidth_lower(text)
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '‐' | '−' | 'ー' | '(' | ')' | '（' | '）' | '.'))
        .collect()
}

/// プレーン正規化 (メールアドレス用)
///
/// 空白のみ除去する。`.` や `-` はアドレスの一部なので残す。
fn normalize_plain(text: &str) -> String {
    to_halfwidth_lower(text)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}
