use crate::types::Word;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// 文字起こしコラボレータからの単語列の読み込み
///
/// 外部の文字起こしシステムが出力するJSONファイルを読む。
/// `[{"text", "start", "end"}, ...]` の配列そのもの、または
/// `{"words": [...]}` でラップされた形式の両方を受け付ける。
/// 空の配列も正当な入力。
///
/// # Errors
///
/// ファイルの読み込み失敗、JSONとして解析できない場合、
/// どちらの形式にも合致しない場合にエラーを返す。
///
/// # Examples
///
/// ```no_run
/// # use dcr_redact::transcript::load_words;
/// let words = load_words("transcript.json").unwrap();
/// ```
pub fn load_words<P: AsRef<Path>>(path: P) -> Result<Vec<Word>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("文字起こしファイルの読み込みに失敗: {:?}", path.as_ref()))?;
    parse_words(&content)
        .with_context(|| format!("文字起こしファイルのパースに失敗: {:?}", path.as_ref()))
}

fn parse_words(json: &str) -> Result<Vec<Word>> {
    let value: serde_json::Value = serde_json::from_str(json)?;

    let words_value = match value {
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(mut map) => match map.remove("words") {
            Some(words) => words,
            None => bail!("オブジェクト形式には \"words\" キーが必要です"),
        },
        _ => bail!("単語の配列または {{\"words\": [...]}} 形式が必要です"),
    };

    let words: Vec<Word> = serde_json::from_value(words_value)?;
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_bare_array() {
        let file = write_temp(
            r#"[
                {"text": "こちら", "start": 0.0, "end": 0.5},
                {"text": "本部", "start": 0.5, "end": 1.0}
            ]"#,
        );

        let words = load_words(file.path()).unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "こちら");
        assert_eq!(words[1].start, 0.5);
    }

    #[test]
    fn test_load_wrapped_object() {
        let file = write_temp(r#"{"words": [{"text": "1234", "start": 1.0, "end": 2.0}]}"#);

        let words = load_words(file.path()).unwrap();
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "1234");
    }

    #[test]
    fn test_empty_array_is_valid() {
        let file = write_temp("[]");
        let words = load_words(file.path()).unwrap();
        assert!(words.is_empty());
    }

    #[test]
    fn test_invalid_json_rejected() {
        let file = write_temp("{not json");
        assert!(load_words(file.path()).is_err());
    }

    #[test]
    fn test_object_without_words_key_rejected() {
        let file = write_temp(r#"{"transcript": []}"#);
        assert!(load_words(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_rejected() {
        assert!(load_words("no-such-transcript.json").is_err());
    }
}
