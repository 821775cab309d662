//! JSON output of a [`Digest`].
//!
//! Files are organized by date with edition names:
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── morning.json
//!     ├── afternoon.json
//!     └── evening.json
//! ```
//!
//! A later run in the same edition overwrites the earlier file.

use crate::models::Digest;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write `digest` to `{json_output_dir}/{local_date}/{time_of_day}.json`.
///
/// # Arguments
///
/// * `digest` - The aggregated batch plus its local date and time of day
/// * `json_output_dir` - Root directory; a dated subdirectory is created under it
///
/// # Returns
///
/// The path of the file written. Any existing digest for the same slot is
/// overwritten.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_digest(digest: &Digest, json_output_dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(digest)?;

    let full_json_dir = PathBuf::from(json_output_dir).join(&digest.local_date);
    info!(full_json_dir = %full_json_dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&full_json_dir).await {
        error!(full_json_dir = %full_json_dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let output_json_filename = full_json_dir.join(format!("{}.json", digest.time_of_day));
    info!(path = %output_json_filename.display(), "Writing JSON");
    fs::write(&output_json_filename, json).await?;
    info!(
        path = %output_json_filename.display(),
        articles = digest.articles.len(),
        origin = %digest.origin,
        "Wrote JSON digest"
    );

    Ok(output_json_filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Origin;

    #[tokio::test]
    async fn test_writes_dated_edition_file() {
        let tmp = tempfile::tempdir().unwrap();
        let digest = Digest {
            local_date: "2025-05-06".to_string(),
            time_of_day: "morning".to_string(),
            local_time: "08:15:00".to_string(),
            origin: Origin::Empty,
            articles: Vec::new(),
        };

        let path = write_digest(&digest, tmp.path().to_str().unwrap()).await.unwrap();
        assert_eq!(path, tmp.path().join("2025-05-06").join("morning.json"));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["origin"], "empty");
        assert_eq!(written["time_of_day"], "morning");
        assert!(written["articles"].as_array().unwrap().is_empty());
    }
}
