//! Typed configuration built from a key lookup.
//!
//! The Worker looks keys up in its `Env`; tests use a map.

use crate::error::{AppError, AppResult};

pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;
pub const DEFAULT_APP_URL: &str = "http://localhost:3000";
pub const DEFAULT_PAYPAL_API_BASE: &str = "https://api-m.sandbox.paypal.com";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_LLM_MODEL: &str = "deepseek-chat";
pub const DEFAULT_WX_PAY_URL: &str = "https://api.mch.weixin.qq.com/v3/pay/transactions/native";

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: Option<String>,
    pub token_ttl_secs: i64,
    pub app_url: String,
    pub migrations_token: Option<String>,
    pub paypal: Option<PayPalConfig>,
    pub mail: Option<MailConfig>,
    pub llm: Option<LlmConfig>,
    pub wechat: Option<WeChatConfig>,
}

#[derive(Debug, Clone)]
pub struct PayPalConfig {
    pub client_id: String,
    pub secret: String,
    pub api_base: String,
    /// When set, webhook events are verified with PayPal before use.
    pub webhook_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct WeChatConfig {
    pub mchid: String,
    pub appid: String,
    pub serial_no: String,
    pub notify_url: String,
    pub pay_url: String,
    /// API v3 key, 32 bytes.
    pub api_v3_key: String,
    /// PKCS#8 PEM.
    pub private_key_pem: String,
}

impl Config {
    /// Build from any lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let paypal = match (get("PAYPAL_CLIENT_ID"), get("PAYPAL_SECRET")) {
            (Some(client_id), Some(secret)) => Some(PayPalConfig {
                client_id,
                secret,
                api_base: get("PAYPAL_API_BASE")
                    .unwrap_or_else(|| DEFAULT_PAYPAL_API_BASE.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                webhook_id: get("PAYPAL_WEBHOOK_ID"),
            }),
            _ => None,
        };

        let mail = match (
            get("BREVO_API_KEY"),
            get("BREVO_SENDER_EMAIL").or_else(|| get("EMAIL_USER")),
        ) {
            (Some(api_key), Some(sender_email)) => Some(MailConfig {
                api_key,
                sender_email,
                sender_name: get("BREVO_SENDER_NAME"),
            }),
            _ => None,
        };

        let llm = get("OPENAI_API_KEY")
            .or_else(|| get("DEEPSEEK_API_KEY"))
            .map(|api_key| LlmConfig {
                api_key,
                base_url: get("LLM_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            });

        let wechat = match (
            get("WX_MCHID"),
            get("WX_APPID"),
            get("WX_SERIAL_NO"),
            get("WX_NOTIFY_URL"),
            get("WX_API_KEY"),
            get("WX_PRIVATE_KEY"),
        ) {
            (
                Some(mchid),
                Some(appid),
                Some(serial_no),
                Some(notify_url),
                Some(api_v3_key),
                Some(private_key_pem),
            ) => Some(WeChatConfig {
                mchid,
                appid,
                serial_no,
                notify_url,
                pay_url: get("WX_PAY_URL").unwrap_or_else(|| DEFAULT_WX_PAY_URL.to_string()),
                api_v3_key,
                // Secrets pasted into dashboards often carry literal `\n`.
                private_key_pem: private_key_pem.replace("\\n", "\n"),
            }),
            _ => None,
        };

        let token_ttl_secs = get("TOKEN_TTL_SECS")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS);

        Self {
            jwt_secret: get("JWT_SECRET"),
            token_ttl_secs,
            app_url: get("APP_URL")
                .unwrap_or_else(|| DEFAULT_APP_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            migrations_token: get("MIGRATIONS_TOKEN"),
            paypal,
            mail,
            llm,
            wechat,
        }
    }

    pub fn jwt_secret(&self) -> AppResult<&[u8]> {
        self.jwt_secret
            .as_deref()
            .map(str::as_bytes)
            .ok_or_else(|| AppError::Config("JWT_SECRET is required".to_string()))
    }

    pub fn paypal(&self) -> AppResult<&PayPalConfig> {
        self.paypal
            .as_ref()
            .ok_or_else(|| AppError::Config("PayPal is not configured".to_string()))
    }

    pub fn mail(&self) -> AppResult<&MailConfig> {
        self.mail
            .as_ref()
            .ok_or_else(|| AppError::Config("email is not configured".to_string()))
    }

    pub fn llm(&self) -> AppResult<&LlmConfig> {
        self.llm
            .as_ref()
            .ok_or_else(|| AppError::Config("LLM API key is not configured".to_string()))
    }

    pub fn wechat(&self) -> AppResult<&WeChatConfig> {
        self.wechat
            .as_ref()
            .ok_or_else(|| AppError::Config("WeChat Pay is not configured".to_string()))
    }
}
