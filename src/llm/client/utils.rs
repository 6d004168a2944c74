use crate::{config::LLMConfig, utils::text_metrics::TokenEstimator};

use std::sync::LazyLock;

static TOKEN_ESTIMATOR: LazyLock<TokenEstimator> = LazyLock::new(TokenEstimator::new);

/// 估算规模超过该值的提示词直接交给高质量模型
const EFFICIENT_MODEL_TOKEN_LIMIT: usize = 16 * 1024;

/// 选择合适的模型，返回 (首选模型, 失败后的备选模型)
pub fn evaluate_befitting_model(
    llm_config: &LLMConfig,
    system_prompt: &str,
    user_prompt: &str,
) -> (String, Option<String>) {
    let estimated = TOKEN_ESTIMATOR.estimate_tokens(system_prompt)
        + TOKEN_ESTIMATOR.estimate_tokens(user_prompt);

    if estimated <= EFFICIENT_MODEL_TOKEN_LIMIT {
        let fallover = (llm_config.model_powerful != llm_config.model_efficient)
            .then(|| llm_config.model_powerful.clone());
        return (llm_config.model_efficient.clone(), fallover);
    }
    (llm_config.model_powerful.clone(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(efficient: &str, powerful: &str) -> LLMConfig {
        LLMConfig {
            model_efficient: efficient.to_string(),
            model_powerful: powerful.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_short_prompt_prefers_efficient_model() {
        let (model, fallover) = evaluate_befitting_model(&config("small", "large"), "sys", "hi");
        assert_eq!(model, "small");
        assert_eq!(fallover.as_deref(), Some("large"));
    }

    #[test]
    fn test_same_models_have_no_fallover() {
        let (_, fallover) = evaluate_befitting_model(&config("same", "same"), "sys", "hi");
        assert!(fallover.is_none());
    }

    #[test]
    fn test_huge_prompt_goes_to_powerful_model() {
        let user_prompt = "研".repeat(40_000);
        let (model, fallover) =
            evaluate_befitting_model(&config("small", "large"), "sys", &user_prompt);
        assert_eq!(model, "large");
        assert!(fallover.is_none());
    }
}
