//! 缓存键派生

use blake3::Hasher;

/// 为 (文本, 源语言, 目标语言) 三元组生成确定性缓存键
///
/// 纯函数，进程重启后对相同输入产生相同结果。字段之间写入长度前缀，
/// 避免 ("ab","c") 与 ("a","bc") 这类拼接歧义。
pub fn derive_key(text: &str, source_lang: &str, target_lang: &str) -> String {
    let mut hasher = Hasher::new();
    for field in [text, source_lang, target_lang] {
        hasher.update(&(field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    format!("tm:{}", hasher.finalize().to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic() {
        let a = derive_key("Hello", "en", "fr");
        let b = derive_key("Hello", "en", "fr");
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_varies_with_each_field() {
        let base = derive_key("Hello", "en", "fr");
        assert_ne!(base, derive_key("Hello!", "en", "fr"));
        assert_ne!(base, derive_key("Hello", "de", "fr"));
        assert_ne!(base, derive_key("Hello", "en", "es"));
    }

    #[test]
    fn test_no_concatenation_ambiguity() {
        assert_ne!(derive_key("ab", "c", "fr"), derive_key("a", "bc", "fr"));
    }

    #[test]
    fn test_empty_text_has_defined_key() {
        let key = derive_key("", "en", "fr");
        assert!(key.starts_with("tm:"));
    }
}
