//! Link cards: ```` ```cardlink ```` fences holding YAML link metadata.
//!
//! Rendering is pure, so this integration is always available. Malformed
//! or incomplete YAML renders as an error element instead of failing.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use super::{fenced_block_pattern, Integration, IntegrationContext, PatternDescriptor, PatternMatch};

pub const MISSING_PARAMS: &str = "required params[url, title] are not found.";

const STYLESHEET: &str = r#".auto-card-link-container {
  border: 1px solid var(--lightgray);
  border-radius: 8px;
  overflow: hidden;
  margin: 1rem 0;
}
.auto-card-link-card {
  display: flex;
  color: inherit;
  text-decoration: none;
}
.auto-card-link-main {
  flex: 1;
  padding: 0.75rem 1rem;
  min-width: 0;
}
.auto-card-link-title {
  font-weight: 600;
}
.auto-card-link-description {
  font-size: 0.9em;
  opacity: 0.8;
}
.auto-card-link-host {
  display: flex;
  align-items: center;
  gap: 0.4rem;
  font-size: 0.8em;
}
.auto-card-link-favicon {
  width: 1em;
  height: 1em;
}
.auto-card-link-thumbnail-img {
  max-width: 12rem;
  height: 100%;
  object-fit: cover;
}
.auto-card-link-error-container {
  border: 1px solid var(--darkgray);
  padding: 0.5rem 1rem;
}
"#;

#[derive(Debug, Default, Deserialize)]
struct CardLinkParams {
    url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    host: Option<String>,
    favicon: Option<String>,
    image: Option<String>,
}

pub struct CardLinkIntegration;

#[async_trait]
impl Integration for CardLinkIntegration {
    fn id(&self) -> &str {
        "auto-card-link"
    }

    fn setting_key(&self) -> &str {
        "auto_card_link"
    }

    fn priority(&self) -> i32 {
        50
    }

    fn stylesheet(&self) -> Option<&str> {
        Some(STYLESHEET)
    }

    fn is_available(&self) -> Result<bool> {
        Ok(true)
    }

    fn patterns(&self) -> Vec<PatternDescriptor> {
        vec![PatternDescriptor::block(
            "cardlink",
            fenced_block_pattern(&["cardlink"]),
        )]
    }

    async fn compile(&self, matched: &PatternMatch, ctx: &IntegrationContext<'_>) -> Result<String> {
        let body = matched.capture(2).unwrap_or_default();
        match parse_params(body) {
            Ok(params) => Ok(render_card(&params).unwrap_or_else(|| {
                tracing::debug!(path = ctx.path, "card link without url or title");
                error_element(MISSING_PARAMS)
            })),
            Err(message) => {
                tracing::debug!(path = ctx.path, error = %message, "invalid card link yaml");
                Ok(error_element(&message))
            }
        }
    }
}

fn parse_params(body: &str) -> std::result::Result<CardLinkParams, String> {
    let value: serde_yaml::Value = serde_yaml::from_str(body).map_err(|e| e.to_string())?;
    if value.is_null() {
        return Ok(CardLinkParams::default());
    }
    serde_yaml::from_value(value).map_err(|e| e.to_string())
}

/// Card markup, or `None` when `url` or `title` is missing.
fn render_card(params: &CardLinkParams) -> Option<String> {
    let url = params.url.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    let title = params.title.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    let host = params
        .host
        .clone()
        .filter(|h| !h.trim().is_empty())
        .or_else(|| url::Url::parse(url).ok()?.host_str().map(str::to_string));

    let mut html = String::from(r#"<div class="auto-card-link-container">"#);
    html.push_str(&format!(
        r#"<a class="auto-card-link-card" href="{}">"#,
        attr(url)
    ));
    html.push_str(r#"<div class="auto-card-link-main">"#);
    html.push_str(&format!(
        r#"<div class="auto-card-link-title">{}</div>"#,
        html_escape::encode_text(title)
    ));
    if let Some(description) = params.description.as_deref() {
        html.push_str(&format!(
            r#"<div class="auto-card-link-description">{}</div>"#,
            html_escape::encode_text(description.trim())
        ));
    }
    if let Some(host) = host.as_deref() {
        html.push_str(r#"<div class="auto-card-link-host">"#);
        if let Some(favicon) = params.favicon.as_deref() {
            html.push_str(&format!(
                r#"<img class="auto-card-link-favicon" src="{}">"#,
                attr(favicon.trim())
            ));
        }
        html.push_str(&format!("<span>{}</span></div>", html_escape::encode_text(host)));
    }
    html.push_str("</div>");
    if let Some(image) = params.image.as_deref() {
        html.push_str(&format!(
            r#"<div class="auto-card-link-thumbnail"><img class="auto-card-link-thumbnail-img" src="{}" draggable="false"></div>"#,
            attr(image.trim())
        ));
    }
    html.push_str("</a></div>");
    Some(html)
}

fn attr(value: &str) -> std::borrow::Cow<'_, str> {
    html_escape::encode_double_quoted_attribute(value)
}

fn error_element(message: &str) -> String {
    format!(
        r#"<div class="auto-card-link-error-container"><span class="auto-card-link-error">{}</span></div>"#,
        html_escape::encode_text(message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::PublishSettings;
    use crate::vault::memory::InMemoryVault;

    async fn compile(body: &str) -> String {
        let matched = PatternMatch {
            descriptor: CardLinkIntegration.patterns().remove(0),
            full_match: format!("```cardlink\n{}\n```", body),
            captures: vec![Some("cardlink".into()), Some(body.to_string())],
        };
        let vault = InMemoryVault::new();
        let settings = PublishSettings::default();
        let ctx = IntegrationContext {
            path: "links.md",
            vault: &vault,
            settings: &settings,
        };
        CardLinkIntegration.compile(&matched, &ctx).await.unwrap()
    }

    #[tokio::test]
    async fn renders_card_with_derived_host() {
        let html = compile(
            "url: https://example.com/a?b=1&c=2\ntitle: Example <Site>\ndescription: Hello\nimage: https://example.com/i.png",
        )
        .await;
        assert!(html.contains(r#"href="https://example.com/a?b=1&amp;c=2""#));
        assert!(html.contains("Example &lt;Site&gt;"));
        assert!(html.contains("<span>example.com</span>"));
        assert!(html.contains(r#"class="auto-card-link-thumbnail-img""#));
        assert!(!html.contains('\n'));
    }

    #[tokio::test]
    async fn missing_required_keys_render_error_element() {
        let html = compile("url: https://example.com").await;
        assert!(html.contains("auto-card-link-error"));
        assert!(html.contains(MISSING_PARAMS));

        let html = compile("").await;
        assert!(html.contains(MISSING_PARAMS));
    }

    #[tokio::test]
    async fn yaml_errors_render_error_element() {
        let html = compile("url: [unclosed\ntitle: x").await;
        assert!(html.starts_with(r#"<div class="auto-card-link-error-container">"#));
        assert!(!html.contains(MISSING_PARAMS));
    }

    #[test]
    fn always_available() {
        assert!(CardLinkIntegration.is_available().unwrap());
    }
}
