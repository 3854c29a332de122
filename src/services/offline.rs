//! Report synthesis without a model: keyword sentiment, most-liked quotes and a
//! token frequency list, laid out with the same headings the model is asked for.

use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use crate::models::{ContentIndex, SampledComment};
use crate::services::classifier::{classify, Sentiment};

pub const REPORT_TITLE: &str = "# 用户反馈分析报告";
const QUOTES_PER_SECTION: usize = 5;
const QUOTE_MAX_CHARS: usize = 120;
const TOP_TOKENS: usize = 5;

const STOPWORDS: [&str; 21] = [
    "的", "了", "是", "在", "就", "也", "都", "和", "很", "不", "这个", "那个", "我", "你", "他", "她",
    "它", "呢", "吧", "啊", "嘛",
];

fn token_regex() -> &'static Regex {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    TOKEN_RE.get_or_init(|| {
        Regex::new(r"[\x{4e00}-\x{9fff}A-Za-z0-9]{2,}").expect("token pattern is valid")
    })
}

pub fn synthesize_offline(comments: &[SampledComment], index: &ContentIndex) -> String {
    let posts: BTreeSet<&str> = comments
        .iter()
        .filter_map(|c| c.note_id.as_deref())
        .filter(|id| !id.is_empty())
        .collect();

    let mut goods: Vec<&SampledComment> = Vec::new();
    let mut bads: Vec<&SampledComment> = Vec::new();
    for comment in comments {
        match classify(&comment.content) {
            Sentiment::Good => goods.push(comment),
            Sentiment::Bad => bads.push(comment),
            Sentiment::Neutral => {}
        }
    }
    // Stable sorts: equal like counts keep sample order.
    goods.sort_by(|a, b| b.like_count.cmp(&a.like_count));
    bads.sort_by(|a, b| b.like_count.cmp(&a.like_count));

    let good_quotes = format_quotes(&goods, index);
    let bad_quotes = format_quotes(&bads, index);
    let tokens = top_tokens(comments.iter().map(|c| c.content.as_str()), TOP_TOKENS);

    let mut report = String::new();
    report.push_str(REPORT_TITLE);
    report.push_str("\n\n## 1. 核心结论速览\n");
    report.push_str(&format!(
        "- 数据量：评论 {} 条，覆盖笔记 {} 条\n",
        comments.len(),
        posts.len()
    ));
    report.push_str(&format!(
        "- 体验较好样本：{} 条；体验不好样本：{} 条\n\n",
        goods.len(),
        bads.len()
    ));
    report.push_str("## 2. “体验较好”的场景拆解\n");
    report.push_str(&or_placeholder(good_quotes, "- 暂无明显“体验较好”的样本"));
    report.push_str("\n\n## 3. “体验不好”的场景拆解\n");
    report.push_str(&or_placeholder(bad_quotes, "- 暂无明显“体验不好”的样本"));
    report.push_str("\n\n## 5. 用户故事与卡点\n");
    report.push_str("- 离线模式生成基础版报告：基于关键词与点赞数的启发式提炼\n");
    report.push_str("- 若需更详细的场景卡与证据链，请配置有效的模型密钥\n\n");
    report.push_str("## 6. 高频词 TOP5\n");
    if tokens.is_empty() {
        report.push_str("- 无\n");
    } else {
        report.push_str(&format!("- {}\n", tokens.join(" / ")));
    }
    report
}

fn format_quotes(comments: &[&SampledComment], index: &ContentIndex) -> Vec<String> {
    comments
        .iter()
        .take(QUOTES_PER_SECTION)
        .map(|c| {
            let text = truncate_quote(c.content.trim());
            let tag = c
                .comment_id
                .as_deref()
                .map(|id| format!("[#{id}] "))
                .unwrap_or_default();
            let url = c
                .note_id
                .as_deref()
                .and_then(|id| index.get(id))
                .map(|meta| meta.note_url.as_str())
                .filter(|u| !u.is_empty());
            match url {
                Some(url) => format!("- {tag}{text} （{url}）"),
                None => format!("- {tag}{text}"),
            }
        })
        .collect()
}

fn truncate_quote(text: &str) -> String {
    if text.chars().count() > QUOTE_MAX_CHARS {
        let head: String = text.chars().take(QUOTE_MAX_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

fn or_placeholder(lines: Vec<String>, placeholder: &str) -> String {
    if lines.is_empty() {
        placeholder.to_string()
    } else {
        lines.join("\n")
    }
}

/// Most frequent tokens; equal counts keep first-seen order.
pub fn top_tokens<'a, I>(texts: I, top_n: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let re = token_regex();
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for text in texts {
        for m in re.find_iter(text) {
            let token = m.as_str();
            if STOPWORDS.contains(&token) {
                continue;
            }
            match position.get(token) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    position.insert(token, counts.len());
                    counts.push((token, 1));
                }
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(top_n)
        .map(|(token, _)| token.to_string())
        .collect()
}
