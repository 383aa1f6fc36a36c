//! Chat assistant over an OpenAI-compatible `chat/completions` API.

use serde::Deserialize;
use serde_json::Value;

use crate::config::LlmConfig;
use crate::error::{AppError, AppResult};

pub const PROMPT_ASSET: &str = "chatbot-response.txt";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

/// Order shown to the assistant for a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub order_id: String,
    pub date: String,
    pub products: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub id: i32,
    pub name: Option<String>,
    pub email: String,
    pub orders: Vec<OrderSummary>,
}

pub fn system_prompt(base: &str, user: Option<&UserContext>) -> String {
    let Some(user) = user else {
        return base.to_string();
    };

    let history = if user.orders.is_empty() {
        "- No orders yet".to_string()
    } else {
        user.orders
            .iter()
            .map(|o| {
                format!(
                    "- Order ID: {}, Date: {}, Products: {}",
                    o.order_id,
                    o.date,
                    o.products.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "{base}\n\nCurrent User Information:\n- Name: {}\n- Email: {}\n- User ID: {}\n\nOrder History:\n{history}\n\nPlease use this information to provide personalized responses. When discussing orders or materials, refer to the user's specific purchases and history.",
        user.name.as_deref().unwrap_or("Customer"),
        user.email,
        user.id
    )
}

pub fn completion_url(cfg: &LlmConfig) -> String {
    format!("{}/chat/completions", cfg.base_url)
}

pub fn completion_body(cfg: &LlmConfig, system: &str, message: &str) -> Value {
    serde_json::json!({
        "model": cfg.model,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": message},
        ],
    })
}

/// `choices[0].message.content`, or an upstream error for any other shape.
pub fn extract_reply(response: &Value) -> AppResult<String> {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::upstream("Unexpected API response structure"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn cfg() -> LlmConfig {
        LlmConfig {
            api_key: "k".into(),
            base_url: "https://api.deepseek.com".into(),
            model: "deepseek-chat".into(),
        }
    }

    #[test]
    fn anonymous_prompt_is_base() {
        assert_eq!(system_prompt("You are BioBot.", None), "You are BioBot.");
    }

    #[test]
    fn signed_in_prompt_lists_orders() {
        let user = UserContext {
            id: 3,
            name: None,
            email: "a@b.c".into(),
            orders: vec![OrderSummary {
                order_id: "order_1".into(),
                date: "2026-01-01".into(),
                products: vec!["AS Mindmap".into(), "A2 Notes".into()],
            }],
        };
        let prompt = system_prompt("Base", Some(&user));
        assert!(prompt.starts_with("Base\n\nCurrent User Information:"));
        assert!(prompt.contains("- Name: Customer"));
        assert!(prompt.contains("- User ID: 3"));
        assert!(prompt.contains("- Order ID: order_1, Date: 2026-01-01, Products: AS Mindmap, A2 Notes"));
    }

    #[test]
    fn body_and_url() {
        let body = completion_body(&cfg(), "sys", "hi");
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(completion_url(&cfg()), "https://api.deepseek.com/chat/completions");
    }

    #[test]
    fn reply_extraction() {
        let ok = json!({"choices": [{"message": {"role": "assistant", "content": "Hello"}}]});
        assert_eq!(extract_reply(&ok).unwrap(), "Hello");
        assert_eq!(extract_reply(&json!({"choices": []})).unwrap_err().status(), 500);
    }
}
