use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::config::LINE_PUSH_URL;
use crate::error::{AppError, Result};
use crate::types::SaleCandidate;

/// Push-notification transport. Trait seam so cycles can run with a no-op
/// notifier in tests.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, candidates: &[SaleCandidate]) -> Result<()>;
}

/// LINE Messaging API client. Sends a headline text push followed by a flex
/// carousel; falls back to a plain-text summary when the flex push fails.
pub struct LineNotifier {
    client: reqwest::Client,
    channel_access_token: String,
    user_id: String,
}

impl LineNotifier {
    pub fn new(channel_access_token: String, user_id: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self { client, channel_access_token, user_id })
    }

    async fn push(&self, message: serde_json::Value) -> Result<()> {
        let resp = self
            .client
            .post(LINE_PUSH_URL)
            .bearer_auth(&self.channel_access_token)
            .json(&json!({
                "to": self.user_id,
                "messages": [message],
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Notification(format!("LINE push failed: {status}: {body}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for LineNotifier {
    async fn notify(&self, candidates: &[SaleCandidate]) -> Result<()> {
        if candidates.is_empty() {
            return Ok(());
        }
        if self.channel_access_token.is_empty() || self.user_id.is_empty() {
            warn!("LINE credentials not configured — notification skipped");
            return Ok(());
        }

        let headline = format!("📚 {}冊のKindleセール本が見つかりました！", candidates.len());
        self.push(json!({ "type": "text", "text": headline })).await?;

        let flex = json!({
            "type": "flex",
            "altText": "Kindleセール情報",
            "contents": flex_carousel(candidates),
        });
        if let Err(e) = self.push(flex).await {
            warn!("flex push failed, falling back to text: {e}");
            self.push(json!({ "type": "text", "text": text_summary(candidates) }))
                .await?;
        }

        info!("notified {} sale items", candidates.len());
        Ok(())
    }
}

/// Plain-text summary used when the rich message cannot be delivered.
pub fn text_summary(candidates: &[SaleCandidate]) -> String {
    let mut message = String::from("📚 Kindleセール情報 📚\n\n");
    for c in candidates {
        message.push_str(&format!("{}\n", c.title));
        message.push_str(&format!(
            "定価：¥{}、現在価格：¥{}\n",
            format_yen(c.list_price),
            format_yen(c.current_price),
        ));
        message.push_str(&format!(
            "ポイント：{}pt（{:.1}%オフ）\n",
            c.point_value as i64, c.discount_percentage,
        ));
        message.push_str(&format!("{}\n\n", c.url));
    }
    message
}

/// One carousel bubble per candidate: discount header, title, price rows and
/// a product link button.
pub fn flex_carousel(candidates: &[SaleCandidate]) -> serde_json::Value {
    let bubbles: Vec<serde_json::Value> = candidates
        .iter()
        .map(|c| {
            json!({
                "type": "bubble",
                "header": {
                    "type": "box",
                    "layout": "vertical",
                    "contents": [{
                        "type": "text",
                        "text": format!("{:.1}%オフ", c.discount_percentage),
                        "color": "#ffffff",
                        "weight": "bold",
                        "size": "xl"
                    }],
                    "backgroundColor": "#DD3333"
                },
                "body": {
                    "type": "box",
                    "layout": "vertical",
                    "contents": [
                        {
                            "type": "text",
                            "text": c.title,
                            "weight": "bold",
                            "size": "md",
                            "wrap": true,
                            "maxLines": 2
                        },
                        {
                            "type": "box",
                            "layout": "vertical",
                            "margin": "lg",
                            "contents": [
                                price_row("定価", &format!("¥{}", format_yen(c.list_price)), "#999999", true),
                                price_row("現在価格", &format!("¥{}", format_yen(c.current_price)), "#333333", false),
                                price_row("ポイント", &format!("{}pt", c.point_value as i64), "#333333", false),
                                price_row("実質価格", &format!("¥{}", format_yen(c.effective_price)), "#DD3333", false),
                            ]
                        }
                    ]
                },
                "footer": {
                    "type": "box",
                    "layout": "vertical",
                    "contents": [{
                        "type": "button",
                        "style": "primary",
                        "action": {
                            "type": "uri",
                            "label": "商品を見る",
                            "uri": c.url
                        }
                    }]
                }
            })
        })
        .collect();

    json!({ "type": "carousel", "contents": bubbles })
}

fn price_row(label: &str, value: &str, color: &str, strikethrough: bool) -> serde_json::Value {
    let mut value_text = json!({
        "type": "text",
        "text": value,
        "color": color,
        "size": "sm",
        "flex": 2
    });
    if strikethrough {
        value_text["decoration"] = json!("line-through");
    }
    json!({
        "type": "box",
        "layout": "baseline",
        "contents": [
            {
                "type": "text",
                "text": label,
                "color": color,
                "size": "sm",
                "flex": 1
            },
            value_text
        ]
    })
}

/// Comma-grouped yen amount: 12345.0 → "12,345".
pub fn format_yen(amount: f64) -> String {
    let whole = amount.round() as i64;
    let negative = whole < 0;
    let digits = whole.abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if negative {
        format!("-{out}")
    } else {
        out
    }
}
