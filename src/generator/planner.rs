//! 全文字数规划

use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::generator::prompts::build_word_plan_prompt;
use crate::llm::LLMClient;
use crate::types::outline::Outline;

/// 单个章节的规划结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SectionAllocation {
    /// 章节完整标题，与大纲一致
    pub title: String,
    /// 分配字数
    pub words: i64,
    /// 是否需要真实数据支撑
    #[serde(default)]
    pub needs_data: bool,
}

/// 模型返回的字数规划
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WordPlan {
    pub sections: Vec<SectionAllocation>,
}

impl WordPlan {
    /// 去掉汇总项后按总字数等比缩放，取整误差补到字数最多的章节
    pub fn normalize(self, total_words: u32) -> Self {
        let mut sections: Vec<SectionAllocation> = self
            .sections
            .into_iter()
            .filter(|s| !s.title.to_lowercase().contains("total"))
            .collect();

        let current_total: i64 = sections.iter().map(|s| s.words).sum();
        if current_total <= 0 {
            return Self { sections };
        }

        let total = i64::from(total_words);
        let ratio = total as f64 / current_total as f64;
        for section in sections.iter_mut() {
            section.words = (section.words as f64 * ratio) as i64;
        }

        let diff = total - sections.iter().map(|s| s.words).sum::<i64>();
        if diff != 0 {
            let largest = sections
                .iter()
                .enumerate()
                .fold(None::<(usize, i64)>, |best, (i, s)| match best {
                    Some((_, words)) if words >= s.words => best,
                    _ => Some((i, s.words)),
                });
            if let Some((i, _)) = largest {
                sections[i].words += diff;
            }
        }
        Self { sections }
    }

    /// 把规划写回大纲中标题匹配的叶子节点，返回更新的节点数
    pub fn apply_to_outline(&self, outline: &mut Outline) -> usize {
        let mut updated = 0;
        for node in outline.nodes_mut().iter_mut().filter(|n| !n.is_parent) {
            if let Some(section) = self
                .sections
                .iter()
                .find(|s| s.title.trim() == node.title.trim())
            {
                node.target_word_count = section.words;
                node.use_data_flag = section.needs_data;
                updated += 1;
            }
        }
        updated
    }
}

/// 字数规划器
pub struct WordPlanner {
    llm_client: LLMClient,
}

impl WordPlanner {
    pub fn new(llm_client: LLMClient) -> Self {
        Self { llm_client }
    }

    /// 请求模型规划字数并归一化
    pub async fn plan(&self, total_words: u32, outline: &Outline) -> Result<WordPlan> {
        let outline_text = outline.leaf_titles().join("\n");
        let (system_prompt, user_prompt) = build_word_plan_prompt(total_words, &outline_text);
        let plan: WordPlan = self.llm_client.extract(&system_prompt, &user_prompt).await?;
        Ok(plan.normalize(total_words))
    }
}
