const NEGATIVE_KEYWORDS: [&str; 18] = [
    "不好用", "崩溃", "用不了", "出错", "浪费", "退订", "卸载", "避雷", "糟糕", "垃圾", "坑", "问题",
    "卡顿", "闪退", "慢", "麻烦", "差", "失望",
];

const POSITIVE_KEYWORDS: [&str; 12] = [
    "好用", "方便", "省事", "稳定", "推荐", "喜欢", "满意", "提升效率", "赞", "不错", "可以", "值得",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Good,
    Bad,
    Neutral,
}

/// Keyword sentiment. Negative keywords are checked first, so mixed feedback is
/// counted as a bad experience.
pub fn classify(text: &str) -> Sentiment {
    if NEGATIVE_KEYWORDS.iter().any(|w| text.contains(w)) {
        Sentiment::Bad
    } else if POSITIVE_KEYWORDS.iter().any(|w| text.contains(w)) {
        Sentiment::Good
    } else {
        Sentiment::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_takes_precedence() {
        assert_eq!(classify("界面很好用但是经常闪退"), Sentiment::Bad);
        // "不好用" contains "好用"; the negative list sees it first.
        assert_eq!(classify("真的不好用"), Sentiment::Bad);
    }

    #[test]
    fn test_positive() {
        assert_eq!(classify("同步很稳定，推荐"), Sentiment::Good);
        assert_eq!(classify("还不错"), Sentiment::Good);
    }

    #[test]
    fn test_neutral() {
        assert_eq!(classify("今天天气晴"), Sentiment::Neutral);
        assert_eq!(classify(""), Sentiment::Neutral);
    }
}
