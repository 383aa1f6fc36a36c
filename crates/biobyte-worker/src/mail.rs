//! Outgoing email: message templates and the Brevo transactional payload.

use serde::Serialize;

use crate::config::MailConfig;
use crate::util::format_cents;

pub const BREVO_SEND_URL: &str = "https://api.brevo.com/v3/smtp/email";

const FOOTER: &str = r#"<hr style="margin:40px 0;border:none;border-top:1px solid #eee;">
<p style="font-size:12px;color:#888;text-align:center;">&copy; BioByte. All rights reserved.<br/>Contact: <a href="mailto:biomindbot@gmail.com" style="color:#888;">biomindbot@gmail.com</a></p>"#;

/// A deliverable to attach, by asset path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to_email: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<AttachmentRef>,
}

/// One line of an order confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub title: String,
    pub chapter: String,
    pub price_cents: i64,
    pub file_path: Option<String>,
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn wrap(body: &str) -> String {
    format!(
        r#"<div style="background-color:#f9f9f9;padding:30px 0;"><div style="max-width:600px;margin:auto;background:white;padding:40px;border-radius:8px;font-family:Arial,sans-serif;color:#333;">{body}<p style="color:#333;font-size:14px;margin-top:20px;">Best regards,<br/>The BioByte Team</p></div></div>{FOOTER}"#
    )
}

pub fn verification_code_email(to: &str, code: &str) -> EmailMessage {
    let body = format!(
        r#"<h2 style="color:#1a1a1a;">Here is your verification code</h2><div style="color:#555;font-size:16px;">Your verification code is: <strong>{code}</strong>. It will expire in 10 minutes.</div>"#
    );
    EmailMessage {
        to_email: to.to_string(),
        to_name: None,
        subject: "Verification Code".to_string(),
        html: wrap(&body),
        attachments: Vec::new(),
    }
}

pub fn reset_link(app_url: &str, token: &str) -> String {
    format!("{app_url}/reset-password?token={token}")
}

pub fn password_reset_email(to: &str, link: &str) -> EmailMessage {
    let link = escape_html(link);
    let body = format!(
        r#"<h2 style="color:#1a1a1a;">Password Reset</h2><p style="font-size:16px;">Click the following link to reset your password:</p><div style="text-align:center;margin:30px 0;"><a href="{link}" style="background-color:#000;color:#fff;padding:12px 30px;text-decoration:none;display:inline-block;">Reset Password</a></div><p style="color:#666;font-size:14px;">If the button above doesn't work, copy this link into your browser:</p><p style="word-break:break-all;color:#0066cc;font-size:14px;">{link}</p>"#
    );
    EmailMessage {
        to_email: to.to_string(),
        to_name: None,
        subject: "Password Reset".to_string(),
        html: wrap(&body),
        attachments: Vec::new(),
    }
}

fn file_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// Order confirmation with each line's deliverable attached.
pub fn order_confirmation_email(
    name: &str,
    to: &str,
    order_id: Option<&str>,
    lines: &[OrderLine],
    total_cents: i64,
) -> EmailMessage {
    let rows: String = lines
        .iter()
        .map(|l| {
            format!(
                "<li>{} (Chapter {}) - ${}</li>",
                escape_html(&l.title),
                escape_html(&l.chapter),
                format_cents(l.price_cents.max(0))
            )
        })
        .collect();
    let order_line = order_id
        .map(|id| format!("<p>Order ID: <strong>{}</strong></p>", escape_html(id)))
        .unwrap_or_default();
    let body = format!(
        r#"<h2 style="color:#1a1a1a;">Thank you for your order, {}!</h2>{order_line}<ul>{rows}</ul><p>Total: <strong>${}</strong></p><p>Your study materials are attached to this email.</p>"#,
        escape_html(name),
        format_cents(total_cents.max(0))
    );

    let attachments = lines
        .iter()
        .filter_map(|l| l.file_path.as_deref())
        .filter(|p| !p.trim().is_empty())
        .map(|p| AttachmentRef {
            name: file_name(p),
            path: p.trim_start_matches('/').to_string(),
        })
        .collect();

    EmailMessage {
        to_email: to.to_string(),
        to_name: Some(name.to_string()),
        subject: "Your Order Confirmation".to_string(),
        html: wrap(&body),
        attachments,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoEmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct BrevoAttachment {
    name: String,
    /// base64
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoSendEmailBody {
    sender: BrevoEmailAddress,
    to: Vec<BrevoEmailAddress>,
    subject: String,
    html_content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachment: Vec<BrevoAttachment>,
}

/// Brevo `smtp/email` body. `attachments` pairs a file name with base64 content.
pub fn brevo_payload(
    cfg: &MailConfig,
    msg: &EmailMessage,
    attachments: Vec<(String, String)>,
) -> serde_json::Value {
    let body = BrevoSendEmailBody {
        sender: BrevoEmailAddress {
            email: cfg.sender_email.clone(),
            name: cfg.sender_name.clone(),
        },
        to: vec![BrevoEmailAddress {
            email: msg.to_email.clone(),
            name: msg.to_name.clone(),
        }],
        subject: msg.subject.clone(),
        html_content: msg.html.clone(),
        attachment: attachments
            .into_iter()
            .map(|(name, content)| BrevoAttachment { name, content })
            .collect(),
    };
    serde_json::to_value(body).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cfg() -> MailConfig {
        MailConfig {
            api_key: "k".into(),
            sender_email: "shop@biobyte.io".into(),
            sender_name: Some("BioByte".into()),
        }
    }

    #[test]
    fn verification_email_contains_code() {
        let msg = verification_code_email("a@b.c", "012345");
        assert_eq!(msg.subject, "Verification Code");
        assert!(msg.html.contains("012345"));
        assert!(msg.html.contains("10 minutes"));
    }

    #[test]
    fn reset_email_embeds_link() {
        let link = reset_link("https://biobyte.io", "abc");
        assert_eq!(link, "https://biobyte.io/reset-password?token=abc");
        assert!(password_reset_email("a@b.c", &link).html.contains(&link));
    }

    #[test]
    fn order_email_lists_lines_and_attachments() {
        let lines = vec![
            OrderLine {
                title: "AS Mindmap <1>".into(),
                chapter: "1".into(),
                price_cents: 499,
                file_path: Some("/files/as-1.pdf".into()),
            },
            OrderLine {
                title: "Notes".into(),
                chapter: "All".into(),
                price_cents: 0,
                file_path: None,
            },
        ];
        let msg = order_confirmation_email("Ann", "a@b.c", Some("order_1_x"), &lines, 499);
        assert!(msg.html.contains("AS Mindmap &lt;1&gt;"));
        assert!(msg.html.contains("$4.99"));
        assert!(msg.html.contains("order_1_x"));
        assert_eq!(
            msg.attachments,
            vec![AttachmentRef {
                name: "as-1.pdf".into(),
                path: "files/as-1.pdf".into()
            }]
        );
    }

    #[test]
    fn brevo_payload_shape() {
        let msg = verification_code_email("a@b.c", "1");
        let v = brevo_payload(&cfg(), &msg, Vec::new());
        assert_eq!(v["sender"]["email"], "shop@biobyte.io");
        assert_eq!(v["to"][0]["email"], "a@b.c");
        assert!(v["to"][0].get("name").is_none());
        assert!(v.get("attachment").is_none());
        assert_eq!(v["subject"], "Verification Code");
        assert!(v["htmlContent"].as_str().unwrap().contains("1"));

        let v = brevo_payload(&cfg(), &msg, vec![("f.pdf".into(), "AAA=".into())]);
        assert_eq!(v["attachment"][0]["name"], "f.pdf");
    }
}
