use std::{env, sync::OnceLock, time::Duration};

const DEBUG_DELAY_ENV: &str = "VLOGS_EXPORT_DEBUG_DELAY_MS";

/// Sleeps for the configured debug delay, if any, so the in-flight state can
/// be observed by hand.
pub(super) async fn debug_transfer_delay() {
    if let Some(delay) = debug_transfer_delay_duration() {
        tracing::trace!(
            delay_ms = delay.as_millis() as u64,
            "Applying debug transfer delay"
        );
        tokio::time::sleep(delay).await;
    }
}

fn debug_transfer_delay_duration() -> Option<Duration> {
    static DELAY: OnceLock<Option<Duration>> = OnceLock::new();
    *DELAY.get_or_init(|| {
        let Ok(raw) = env::var(DEBUG_DELAY_ENV) else {
            return None;
        };
        parse_delay(&raw)
    })
}

fn parse_delay(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<u64>() {
        Ok(0) => None,
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(_) => {
            tracing::warn!(
                env = DEBUG_DELAY_ENV,
                value = %raw,
                "Invalid debug transfer delay"
            );
            None
        }
    }
}
