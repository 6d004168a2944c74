//! 章节提示词
//!
//! 章节类型由标题分类一次得到，模板按类型分派；引用统一使用位置型占位符，
//! 模型不接触文献编号。

use crate::generator::rewriter::RewriteRequest;
use crate::i18n::TargetLanguage;
use crate::types::outline::{ChartDirective, OutlineNode, SectionKind};
use crate::utils::text_metrics::tail_chars;

/// 一次章节生成所需的全部输入
#[derive(Debug, Clone)]
pub struct SectionSpec {
    pub thesis_title: String,
    pub section_title: String,
    pub kind: SectionKind,
    pub chapter_number: String,
    pub target_words: i64,
    pub chart_directive: ChartDirective,
    pub language: TargetLanguage,
    /// 分配给本章节的文献原文，已按编号升序
    pub references: Vec<String>,
    pub placeholder: String,
    pub full_outline: String,
    pub context: String,
    /// 用户数据与检索事实，已拼接好标题
    pub data_payload: String,
    pub extra_instructions: String,
}

/// 提示词模板
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    pub system_prompt: String,
    pub opening_instruction: String,
    pub closing_instruction: String,
}

impl PromptTemplate {
    /// 拼成 (系统指令, 用户提示词)
    pub fn render(self, body: &str) -> (String, String) {
        let user_prompt = format!(
            "{}\n{}\n{}",
            self.opening_instruction, body, self.closing_instruction
        );
        (self.system_prompt, user_prompt.trim().to_string())
    }
}

/// 构建章节提示词，返回 (系统指令, 用户提示词)
pub fn build_prompt(spec: &SectionSpec) -> (String, String) {
    let template = match spec.language {
        TargetLanguage::Chinese => chinese_template(spec),
        TargetLanguage::English => english_template(spec),
    };
    template.render(&request_body(spec))
}

fn request_body(spec: &SectionSpec) -> String {
    match spec.language {
        TargetLanguage::Chinese => format!(
            "题目：{}\n章节：{}\n前文摘要：{}\n【重要约束】目标字数：{}字\n{}",
            spec.thesis_title,
            spec.section_title,
            spec.context,
            spec.target_words,
            spec.data_payload
        ),
        TargetLanguage::English => format!(
            "Thesis: {}\nSection: {}\nPreceding context: {}\n[Constraint] Target length: {} words\n{}",
            spec.thesis_title,
            spec.section_title,
            spec.context,
            spec.target_words,
            spec.data_payload
        ),
    }
}

fn chinese_template(spec: &SectionSpec) -> PromptTemplate {
    let section_rule = match spec.kind {
        SectionKind::Abstract => {
            "当前任务：撰写摘要。不要输出标题，直接写成一段完整的文字，依次交代研究背景、方法、关键发现与理论贡献，文末给出“关键词：词1；词2；词3”。"
        }
        SectionKind::Background => {
            "当前任务：撰写研究背景。结合近年真实存在的政策、行业报告或社会事件，指出现实中尚未解决的矛盾，不得编造文件名称。"
        }
        SectionKind::Significance => {
            "当前任务：撰写研究意义。分别说明理论意义与实践意义，避免“填补空白”之类的夸大表述。"
        }
        SectionKind::LiteratureReview => {
            "当前任务：撰写研究现状。采用总-分-总结构：先概述研究热点，再按给定文献顺序逐一评述并用逻辑连接词串联，最后指出现有研究的不足。"
        }
        SectionKind::Methodology => {
            "当前任务：撰写研究方法。说明所用方法、适用理由与具体实施步骤，本节可以分点叙述。"
        }
        SectionKind::Conclusion => {
            "当前任务：撰写结论。概括主要发现与创新点，客观说明研究局限并提出展望。"
        }
        SectionKind::References | SectionKind::Acknowledgment | SectionKind::Generic => {
            "当前任务：撰写正文分析。每一段都要有观点、有论据、有结论。"
        }
    };

    let word_rule = if spec.kind == SectionKind::Abstract {
        "字数遵循摘要标准。".to_string()
    } else {
        let min_words = spec.target_words * 3 / 4;
        let max_words = spec.target_words * 5 / 4;
        format!(
            "目标字数 {} 字，输出控制在 {} ~ {} 字之间，不得重复凑字。",
            spec.target_words, min_words, max_words
        )
    };

    let system_prompt = format!(
        "你是一位资深的学术论文写作专家，熟悉学术论文写作规范。\n\
        {}\n\
        所有段落开头空两个全角空格，不要使用Markdown标题，不要输出“（接上文）”“（空两格）”等说明文字，只撰写当前章节“{}”的内容。\n\
        统计数据与年份使用阿拉伯数字。",
        spec.language.prompt_instruction(),
        spec.section_title
    );

    let mut opening = format!("{}\n{}\n", section_rule, word_rule);
    opening.push_str(&chinese_citation_rule(spec));
    opening.push_str(&chinese_chart_rule(spec));
    if !spec.full_outline.is_empty() {
        opening.push_str(&format!("全文大纲（用于把握当前写作位置）：\n{}\n", spec.full_outline));
    }

    let mut closing = String::new();
    if !spec.extra_instructions.trim().is_empty() {
        closing.push_str(&format!("附加要求：{}\n", spec.extra_instructions.trim()));
    }
    closing.push_str("请直接输出正文。");

    PromptTemplate {
        system_prompt,
        opening_instruction: opening,
        closing_instruction: closing,
    }
}

fn chinese_citation_rule(spec: &SectionSpec) -> String {
    if spec.references.is_empty() {
        return format!(
            "本章节没有分配参考文献，不要输出 {} 或任何引用编号。\n",
            spec.placeholder
        );
    }
    let listing = spec
        .references
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{{文献{}}}: {}", i + 1, r))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "本章节必须按列表顺序引用以下 {} 篇文献，每引用一篇就在句末写一个 {}，共 {} 个，不要自己编写编号。\
        引用时写明作者与年份，例如“张三（2023）指出……{}”。\n待引用文献：\n{}\n",
        spec.references.len(),
        spec.placeholder,
        spec.references.len(),
        spec.placeholder,
        listing
    )
}

fn chinese_chart_rule(spec: &SectionSpec) -> String {
    let number = &spec.chapter_number;
    match spec.chart_directive {
        ChartDirective::Table => format!(
            "本节必须包含一个Markdown三线表，表格上方写“**表{}.X 表名**”，正文中用“如表{}.X所示”进行分析，不要生成绘图代码。\n",
            number, number
        ),
        ChartDirective::Plot => format!(
            "本节必须包含一段完整的Python绘图代码（matplotlib/seaborn，数据在代码内定义，不调用plt.show()），\
            代码块下方写“**图{}.X 图名**”，正文中用“如图{}.X所示”进行分析，不要使用表格展示核心数据。\n",
            number, number
        ),
        ChartDirective::None => "本章节无需生成图表或表格。\n".to_string(),
    }
}

fn english_template(spec: &SectionSpec) -> PromptTemplate {
    let section_rule = match spec.kind {
        SectionKind::Abstract => {
            "Task: write the abstract as a single coherent paragraph without a heading, covering background, method, results and contribution, then end with \"Keywords: a; b; c\"."
        }
        SectionKind::Background => {
            "Task: write the research background, grounded in real policies, industry reports or events, without inventing document names."
        }
        SectionKind::Significance => {
            "Task: write the theoretical and practical significance without overstating the contribution."
        }
        SectionKind::LiteratureReview => {
            "Task: write the literature review: an overview paragraph, then discuss the given references in order with logical transitions, then a critical summary of gaps."
        }
        SectionKind::Methodology => {
            "Task: describe the research methods, why they fit, and how they are applied. Lists are allowed here."
        }
        SectionKind::Conclusion => {
            "Task: write the conclusion: main findings, contributions, limitations and future work."
        }
        SectionKind::References | SectionKind::Acknowledgment | SectionKind::Generic => {
            "Task: write the analytical body. Every paragraph needs a claim, evidence and a conclusion."
        }
    };

    let system_prompt = format!(
        "You are an experienced academic writer.\n{}\nDo not output Markdown headings or meta remarks such as \"(continued)\". Only write the section \"{}\".",
        spec.language.prompt_instruction(),
        spec.section_title
    );

    let mut opening = format!("{}\n", section_rule);
    if spec.kind != SectionKind::Abstract {
        opening.push_str(&format!(
            "Aim for about {} words and do not pad with repetition.\n",
            spec.target_words
        ));
    }
    if spec.references.is_empty() {
        opening.push_str(&format!(
            "No references are assigned to this section. Do not output {} or citation numbers.\n",
            spec.placeholder
        ));
    } else {
        let listing = spec
            .references
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{{Ref {}}}: {}", i + 1, r))
            .collect::<Vec<_>>()
            .join("\n");
        opening.push_str(&format!(
            "Cite the following {} references in the listed order. Write {} once after each citing sentence and never write numbers yourself.\nReferences:\n{}\n",
            spec.references.len(),
            spec.placeholder,
            listing
        ));
    }
    match spec.chart_directive {
        ChartDirective::Table => opening.push_str(&format!(
            "Include one Markdown three-line table titled \"**Table {}.X Name**\" and discuss it in the text.\n",
            spec.chapter_number
        )),
        ChartDirective::Plot => opening.push_str(&format!(
            "Include one complete Python plotting snippet (matplotlib/seaborn, data defined inline, no plt.show()) followed by \"**Figure {}.X Name**\".\n",
            spec.chapter_number
        )),
        ChartDirective::None => {
            opening.push_str("No charts or tables are needed in this section.\n")
        }
    }
    if !spec.full_outline.is_empty() {
        opening.push_str(&format!("Full outline:\n{}\n", spec.full_outline));
    }

    let mut closing = String::new();
    if !spec.extra_instructions.trim().is_empty() {
        closing.push_str(&format!("Additional requirements: {}\n", spec.extra_instructions.trim()));
    }
    closing.push_str("Output the section body only.");

    PromptTemplate {
        system_prompt,
        opening_instruction: opening,
        closing_instruction: closing,
    }
}

/// 辅助检索事实资料的提示词
pub fn build_research_prompt(thesis_title: &str, section_title: &str) -> (String, String) {
    let topic = format!("{} - {} 数据", thesis_title, section_title);
    (
        "严谨数据分析师。列出关于主题的真实数据、政策。".to_string(),
        format!("检索关于'{}'的真实事实：", topic),
    )
}

/// 字数规划提示词
pub fn build_word_plan_prompt(total_words: u32, outline_text: &str) -> (String, String) {
    (
        "你是一位经验丰富的学术论文编辑，负责为论文大纲分配字数并判断各章节是否需要真实数据支撑。".to_string(),
        format!(
            "将总字数 {} 字分配给以下各章节，分配之和必须等于总字数。\
            核心章节（实证、分析、设计）约占60%-70%，综述与理论约占20%-30%，摘要与结论约占10%-15%。\
            标题涉及现状、分析、实证、统计、调研、应用、对比、实验、结果的章节需要数据，\
            绪论、概念、理论基础、研究方法、文献综述、结论、致谢不需要。\
            title 字段必须与大纲中的完整标题一致。\n\n待规划大纲：\n{}",
            total_words, outline_text
        ),
    )
}

/// 重写时参考的前文长度
pub const REWRITE_CONTEXT_CHARS: usize = 800;

/// 前文短于该长度视为开篇
const OPENING_CONTEXT_CHARS: usize = 50;

/// 结论类章节只参考前文末尾
const CLOSING_CONTEXT_CHARS: usize = 300;

/// 重写时保留的原文长度
const ORIGINAL_CONTENT_CHARS: usize = 2000;

const VISUAL_KEYWORDS: &[&str] = &[
    "绘图", "画图", "统计图", "图表", "重绘", "绘制", "三线表", "可视化", "plot", "chart", "数据图",
];

/// 章节在全文中的位置，决定衔接方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RewritePosition<'a> {
    Opening,
    Closing(&'a str),
    Middle(&'a str),
}

fn rewrite_position<'a>(section_title: &str, context: &'a str) -> RewritePosition<'a> {
    if context.trim().chars().count() < OPENING_CONTEXT_CHARS {
        RewritePosition::Opening
    } else if SectionKind::classify(section_title) == SectionKind::Conclusion
        || ["展望", "结语", "Summary"].iter().any(|k| section_title.contains(k))
    {
        RewritePosition::Closing(tail_chars(context, CLOSING_CONTEXT_CHARS))
    } else {
        RewritePosition::Middle(context)
    }
}

fn head_chars(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(offset, _)| &text[..offset])
}

/// 章节重写提示词，返回 (系统指令, 用户提示词)
///
/// 前文先截取末尾 [`REWRITE_CONTEXT_CHARS`] 个字符，再按章节位置决定衔接要求；
/// 只有修改意见提到绘图或表格时才加入可视化规范。
pub fn build_rewrite_prompt(request: &RewriteRequest) -> (String, String) {
    let context = tail_chars(request.context.trim(), REWRITE_CONTEXT_CHARS);
    let position = rewrite_position(&request.section_title, context);
    let original = head_chars(request.original_content.trim(), ORIGINAL_CONTENT_CHARS);
    let wants_visuals = VISUAL_KEYWORDS
        .iter()
        .any(|k| request.instruction.contains(k));
    let chapter_number = OutlineNode::new(request.section_title.as_str(), 0)
        .chapter_number()
        .unwrap_or("X")
        .to_string();

    let template = match request.language {
        TargetLanguage::Chinese => {
            chinese_rewrite_template(request, position, original, wants_visuals, &chapter_number)
        }
        TargetLanguage::English => {
            english_rewrite_template(request, position, original, wants_visuals, &chapter_number)
        }
    };
    let body = match request.language {
        TargetLanguage::Chinese => format!(
            "论文题目：{}\n请修改章节：{}\n用户的具体修改意见：{}",
            request.title, request.section_title, request.instruction
        ),
        TargetLanguage::English => format!(
            "Thesis: {}\nSection to revise: {}\nRevision request: {}",
            request.title, request.section_title, request.instruction
        ),
    };
    template.render(&body)
}

fn chinese_rewrite_template(
    request: &RewriteRequest,
    position: RewritePosition<'_>,
    original: &str,
    wants_visuals: bool,
    chapter_number: &str,
) -> PromptTemplate {
    let flow_rule = match position {
        RewritePosition::Opening => {
            "当前为论文或章节的起始部分。必须开篇明义直接引入主题，不得使用“承接上文”“综上所述”“如前所述”等过渡词。"
                .to_string()
        }
        RewritePosition::Closing(tail) => format!(
            "当前为结论或收尾部分。前文摘要：“...{}...”。需要在前文分析的基础上总结升华并展望未来，不得简单重复。",
            tail
        ),
        RewritePosition::Middle(context) => format!(
            "当前为论文中间章节。前文摘要：“...{}...”。必须紧密承接前文的逻辑，使用恰当的学术过渡词保证文气贯通。",
            context
        ),
    };

    let base_rule = if original.is_empty() {
        "本章节暂无原文，请按修改意见直接撰写完整内容。".to_string()
    } else {
        format!(
            "原文内容：\n```\n{}\n```\n除非修改意见明确要求“完全重写”或“推翻重来”，否则保留原文的核心观点和数据，重点优化表达、逻辑结构和学术规范；原文过于简陋时进行扩写和深化。",
            original
        )
    };

    let mut system_prompt = format!(
        "你是一位资深的学术论文评审与修改专家，擅长修正论文逻辑，确保论证严密、主题聚焦。\n\
        你正在重写论文《{title}》中的“{section}”章节。\n\
        1. 所有内容必须服务于论文题目《{title}》，不得撰写与主题无关的内容。\n\
        2. 内容只聚焦“{section}”本身的论点，不得越界撰写其他章节的内容。\n\
        3. {flow}\n\
        4. {base}\n\
        5. 正文使用全角中文标点；统计数据、年份、百分比使用阿拉伯数字；书籍、法规、文章题目使用书名号。\n",
        title = request.title,
        section = request.section_title,
        flow = flow_rule,
        base = base_rule,
    );
    if !request.custom_data.trim().is_empty() {
        system_prompt.push_str(&format!(
            "可参考的用户数据：\n{}\n",
            request.custom_data.trim()
        ));
    }
    if wants_visuals {
        system_prompt.push_str(&format!(
            "6. 修改意见包含绘图要求。请根据本节数据编写完整的 Python 绘图代码（matplotlib/seaborn，数据在代码内定义，不调用 plt.show()），代码块下方输出 **图{n}.X 图名**；或者输出 Markdown 三线表，表格上方输出 **表{n}.X 表名**。代码块外不要输出步骤说明。\n",
            n = chapter_number
        ));
    }
    system_prompt.push_str(request.language.prompt_instruction());

    PromptTemplate {
        system_prompt,
        opening_instruction: String::new(),
        closing_instruction: "请直接输出修改后的章节正文，不要输出章节标题。".to_string(),
    }
}

fn english_rewrite_template(
    request: &RewriteRequest,
    position: RewritePosition<'_>,
    original: &str,
    wants_visuals: bool,
    chapter_number: &str,
) -> PromptTemplate {
    let flow_rule = match position {
        RewritePosition::Opening => {
            "This section opens the paper or chapter. Introduce the topic directly without transitional phrases such as \"as mentioned above\"."
                .to_string()
        }
        RewritePosition::Closing(tail) => format!(
            "This is a closing section. Preceding context: \"...{}...\". Synthesize the earlier analysis and look ahead instead of repeating it.",
            tail
        ),
        RewritePosition::Middle(context) => format!(
            "This is a middle section. Preceding context: \"...{}...\". Continue its line of argument with clear academic transitions.",
            context
        ),
    };

    let base_rule = if original.is_empty() {
        "There is no existing text. Write the full section following the request.".to_string()
    } else {
        format!(
            "Existing text:\n```\n{}\n```\nKeep its core arguments and data unless the request asks for a complete rewrite. Improve wording, structure and rigor, and expand it if it is thin.",
            original
        )
    };

    let mut system_prompt = format!(
        "You are a senior academic reviewer and editor.\n\
        You are revising the section \"{section}\" of the paper \"{title}\".\n\
        1. Everything must serve the paper title and stay on topic.\n\
        2. Stay within the scope of \"{section}\" and do not write other sections.\n\
        3. {flow}\n\
        4. {base}\n",
        title = request.title,
        section = request.section_title,
        flow = flow_rule,
        base = base_rule,
    );
    if !request.custom_data.trim().is_empty() {
        system_prompt.push_str(&format!(
            "User data for reference:\n{}\n",
            request.custom_data.trim()
        ));
    }
    if wants_visuals {
        system_prompt.push_str(&format!(
            "5. The request asks for a figure. Provide complete Python plotting code (matplotlib/seaborn, data defined inline, no plt.show()) captioned **Figure {n}.X Title** below the code block, or a Markdown three-line table captioned **Table {n}.X Title** above it.\n",
            n = chapter_number
        ));
    }
    system_prompt.push_str(request.language.prompt_instruction());

    PromptTemplate {
        system_prompt,
        opening_instruction: String::new(),
        closing_instruction: "Output only the revised section text without its heading."
            .to_string(),
    }
}
