//! 章节正文清洗与排版

use regex::Regex;
use std::sync::LazyLock;

use crate::references::CitationResolver;
use crate::types::outline::SectionKind;
use crate::utils::text_metrics::CODE_FENCE;

static ABSTRACT_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^#+\s*(摘要|Abstract)\s*").expect("valid abstract heading pattern")
});

static DIRTY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"[\(（]接上文[\)）]",
        r"[\(（]空两格[\)）]",
        r"^\.\.\.",
        r"接上文：",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid marker pattern"))
    .collect()
});

static CN_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([零一二三四五六七八九]{4})年").expect("valid year pattern"));

const PARAGRAPH_INDENT: &str = "　　";

/// 去掉摘要开头模型自带的标题
pub fn strip_abstract_heading(text: &str) -> String {
    ABSTRACT_HEADING.replace(text, "").trim().to_string()
}

/// 去掉重复输出的本章节标题行
pub fn strip_self_title(text: &str, section_title: &str) -> String {
    let title = section_title.trim();
    if title.is_empty() {
        return text.to_string();
    }
    text.lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            !(trimmed.starts_with('#')
                && trimmed.trim_start_matches('#').trim().starts_with(title))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 去掉“（接上文）”之类的元说明
pub fn strip_dirty_markers(text: &str) -> String {
    DIRTY_PATTERNS
        .iter()
        .fold(text.to_string(), |acc, pattern| {
            pattern.replace_all(&acc, "").into_owned()
        })
}

/// 数字规范化：中文年份转阿拉伯数字，全角数字字母转半角，代码块保持原样
pub fn convert_cn_numbers(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last = 0;
    for code in CODE_FENCE.find_iter(text) {
        result.push_str(&normalize_numerals(&text[last..code.start()]));
        result.push_str(code.as_str());
        last = code.end();
    }
    result.push_str(&normalize_numerals(&text[last..]));
    result
}

fn normalize_numerals(text: &str) -> String {
    let halfwidth: String = text.chars().map(to_halfwidth).collect();
    let years = CN_YEAR.replace_all(&halfwidth, |caps: &regex::Captures| {
        let digits: String = caps[1].chars().map(cn_digit).collect();
        format!("{}年", digits)
    });
    years.replace("百分之", "").replace('％', "%")
}

fn to_halfwidth(c: char) -> char {
    match c {
        '０'..='９' | 'Ａ'..='Ｚ' | 'ａ'..='ｚ' | '％' => {
            char::from_u32(c as u32 - 0xFEE0).unwrap_or(c)
        }
        _ => c,
    }
}

fn cn_digit(c: char) -> char {
    match c {
        '零' => '0',
        '一' => '1',
        '二' => '2',
        '三' => '3',
        '四' => '4',
        '五' => '5',
        '六' => '6',
        '七' => '7',
        '八' => '8',
        '九' => '9',
        other => other,
    }
}

/// 段落排版：正文行首缩进两个全角空格，行间以空行分隔
pub fn format_paragraphs(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            let line = line.trim();
            let keep = line.is_empty()
                || line.starts_with(PARAGRAPH_INDENT)
                || line.starts_with('#')
                || line.starts_with('|')
                || line.starts_with("```")
                || line.contains("import");
            if keep {
                line.to_string()
            } else {
                format!("{}{}", PARAGRAPH_INDENT, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 章节正文完整清洗流程，引用解析在数字规范化之前完成
pub fn clean_chapter(
    raw_content: &str,
    section_title: &str,
    kind: SectionKind,
    resolver: &mut CitationResolver,
) -> String {
    let mut content = if kind == SectionKind::Abstract {
        strip_abstract_heading(raw_content)
    } else {
        raw_content.to_string()
    };
    content = strip_self_title(&content, section_title);
    content = strip_dirty_markers(&content);
    content = resolver.resolve(&content);
    format_paragraphs(&convert_cn_numbers(&content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::TargetLanguage;
    use crate::types::reference::Reference;

    #[test]
    fn test_strip_abstract_heading() {
        assert_eq!(strip_abstract_heading("## 摘要\n本研究……"), "本研究……");
        assert_eq!(strip_abstract_heading("# abstract\nThis study"), "This study");
        assert_eq!(strip_abstract_heading("正文 ## 摘要"), "正文 ## 摘要");
    }

    #[test]
    fn test_strip_self_title() {
        let text = "### 1.1 研究背景\n正文第一段\n### 其他标题";
        assert_eq!(
            strip_self_title(text, "1.1 研究背景"),
            "正文第一段\n### 其他标题"
        );
    }

    #[test]
    fn test_strip_dirty_markers() {
        assert_eq!(strip_dirty_markers("（接上文）正文(空两格)内容"), "正文内容");
        assert_eq!(strip_dirty_markers("...开头"), "开头");
        assert_eq!(strip_dirty_markers("接上文：继续"), "继续");
        assert_eq!(strip_dirty_markers("中间...保留"), "中间...保留");
    }

    #[test]
    fn test_convert_cn_numbers() {
        assert_eq!(convert_cn_numbers("二零二三年增长百分之１５％"), "2023年增长15%");
        assert_eq!(convert_cn_numbers("ＧＤＰ达到１２３亿"), "GDP达到123亿");
        // 中文标点与概数保持不变
        assert_eq!(convert_cn_numbers("三大类，共五六个。"), "三大类，共五六个。");
    }

    #[test]
    fn test_convert_cn_numbers_keeps_code_blocks() {
        let text = "二零二零年\n```python\nlabel = '二零二零年 ５'\n```\n结尾二零二一年";
        assert_eq!(
            convert_cn_numbers(text),
            "2020年\n```python\nlabel = '二零二零年 ５'\n```\n结尾2021年"
        );
    }

    #[test]
    fn test_format_paragraphs() {
        let text = "第一段\n\n| a | b |\n　　已有缩进\n## 小标题\nimport pandas as pd";
        assert_eq!(
            format_paragraphs(text),
            "　　第一段\n\n\n\n| a | b |\n\n　　已有缩进\n\n## 小标题\n\nimport pandas as pd"
        );
    }

    #[test]
    fn test_clean_chapter_order() {
        let mut resolver = CitationResolver::new(
            vec![Reference::new(3, "张三. 论A. 2020")],
            TargetLanguage::Chinese,
        );
        let raw = "## 摘要\n（接上文）二零二二年的研究表明[REF]。";
        let cleaned = clean_chapter(raw, "摘要", SectionKind::Abstract, &mut resolver);
        assert_eq!(cleaned, "　　2022年的研究表明[3]。");
        assert_eq!(resolver.remaining(), 0);
    }
}
