//! Saves raw YoLink response bytes to `{dir}/{endpoint}/{timestamp}_{suffix}.json`
//! for offline analysis.
//!
//! Errors are logged and swallowed; capture is best-effort and never
//! interrupts a poll.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

/// Write `bytes` under `dir`.
///
/// - `endpoint`: sub-directory name, e.g. `"token"` or `"THSensor.getState"`.
/// - `suffix`: appended after the timestamp, e.g. a device ID. Pass `""` to omit.
pub async fn save(dir: &Path, endpoint: &str, suffix: &str, bytes: &[u8]) {
    let ts = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let path = target(dir, endpoint, &ts.to_string(), suffix);

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent).await {
            warn!(path = %path.display(), error = %e, "response_store: failed to create directory");
            return;
        }
    }

    // Pretty-print when the body is JSON, raw bytes otherwise.
    let content = serde_json::from_slice::<serde_json::Value>(bytes)
        .ok()
        .and_then(|v| serde_json::to_vec_pretty(&v).ok())
        .unwrap_or_else(|| bytes.to_vec());

    match fs::write(&path, &content).await {
        Ok(()) => debug!(path = %path.display(), bytes = content.len(), "response_store: saved"),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "response_store: failed to write response file")
        }
    }
}

fn target(dir: &Path, endpoint: &str, ts: &str, suffix: &str) -> PathBuf {
    let filename = if suffix.is_empty() {
        format!("{ts}.json")
    } else {
        format!("{ts}_{suffix}.json")
    };
    dir.join(endpoint).join(filename)
}
