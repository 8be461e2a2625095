//! Integration pass: whole-file transforms, then pattern replacement.
//!
//! All matches are collected from one snapshot of the text, taken after
//! the whole-file transforms. Each replacement then substitutes the first
//! occurrence of the match text in the growing output, in integration
//! priority order. Output of an earlier replacement can therefore be hit
//! by a later one that happens to contain the same text.

use regex::Regex;

use crate::integration::{IntegrationContext, IntegrationRegistry, PatternMatch};
use crate::models::SourceDocument;

/// Run every enabled integration over `text`.
///
/// A failing transform or match compile is logged and leaves its input
/// unchanged; it never stops the other matches or integrations.
pub async fn apply_integrations(
    doc: &SourceDocument,
    text: String,
    registry: &IntegrationRegistry,
    ctx: &IntegrationContext<'_>,
) -> String {
    let enabled = registry.enabled(ctx.settings);
    let mut text = text;

    for integration in &enabled {
        if !integration.should_transform_file(doc) {
            continue;
        }
        match integration.transform_file(doc, &text, ctx).await {
            Ok(transformed) => text = transformed,
            Err(e) => {
                tracing::warn!(path = ctx.path, integration = integration.id(), error = %e, "file transform failed")
            }
        }
    }

    let snapshot = text.clone();
    for integration in &enabled {
        for descriptor in integration.patterns() {
            let regex = match Regex::new(&descriptor.pattern) {
                Ok(re) => re,
                Err(e) => {
                    tracing::warn!(
                        integration = integration.id(),
                        pattern = %descriptor.id,
                        error = %e,
                        "invalid integration pattern"
                    );
                    continue;
                }
            };
            let matches: Vec<PatternMatch> = regex
                .captures_iter(&snapshot)
                .map(|caps| PatternMatch {
                    descriptor: descriptor.clone(),
                    full_match: caps[0].to_string(),
                    captures: caps
                        .iter()
                        .skip(1)
                        .map(|c| c.map(|m| m.as_str().to_string()))
                        .collect(),
                })
                .collect();

            for matched in matches {
                match integration.compile(&matched, ctx).await {
                    Ok(replacement) => {
                        text = text.replacen(&matched.full_match, &replacement, 1);
                    }
                    Err(e) => tracing::warn!(
                        path = ctx.path,
                        integration = integration.id(),
                        pattern = %descriptor.id,
                        error = %e,
                        "integration failed; leaving match as is"
                    ),
                }
            }
        }
    }
    text
}
