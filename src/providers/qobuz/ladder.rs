//! Quality tiers and the downgrade ladder.

use std::future::Future;

use crate::providers::ProviderError;

/// Map legacy or empty tiers onto the 16-bit default.
pub fn normalize_quality(quality: &str) -> String {
    match quality.trim() {
        "" | "5" => "6".to_string(),
        q => q.to_string(),
    }
}

/// Tiers to try, in order, for a requested quality.
pub fn quality_ladder(requested: &str, allow_fallback: bool) -> Vec<String> {
    let requested = normalize_quality(requested);
    if !allow_fallback {
        return vec![requested];
    }
    match requested.as_str() {
        "27" => vec!["27".into(), "7".into(), "6".into()],
        "7" => vec!["7".into(), "6".into()],
        _ => vec![requested],
    }
}

/// Run `attempt` for each tier until one succeeds.
///
/// Returns the value and the tier that produced it. The error of the last
/// tier is returned when the whole ladder fails.
pub async fn resolve_with_fallback<T, F, Fut>(
    tiers: &[String],
    mut attempt: F,
) -> Result<(T, String), ProviderError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut last_error = None;

    for (i, tier) in tiers.iter().enumerate() {
        if i > 0 {
            tracing::warn!(
                "⚠ Quality {} failed, trying fallback to {}...",
                tiers[i - 1],
                tier
            );
        }

        match attempt(tier.clone()).await {
            Ok(value) => {
                if i > 0 {
                    tracing::info!("✓ Success with fallback quality {}", tier);
                }
                return Ok((value, tier.clone()));
            }
            Err(e) => {
                tracing::debug!("Quality {} failed: {}", tier, e);
                last_error = Some(e);
            }
        }
    }

    Err(ProviderError::Exhausted(format!(
        "All APIs and fallbacks failed to provide a download URL ({})",
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no quality tiers".to_string())
    )))
}
