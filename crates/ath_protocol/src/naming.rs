//! Storage keys and public URLs of published artifacts.

use crate::types::RenderingFormat;

/// Storage key of one rendered artifact: `{sample_file_name}/{artifact_name}.{ext}`.
pub fn plot_key(sample_file_name: &str, artifact_name: &str, format: RenderingFormat) -> String {
    format!(
        "{}/{}.{}",
        sample_file_name,
        artifact_name,
        format.extension()
    )
}

/// Public retrieval address of an object: `{base_url}/{bucket}/{key}`.
pub fn object_url(base_url: &str, bucket: &str, key: &str) -> String {
    format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        bucket.trim_matches('/'),
        key.trim_start_matches('/')
    )
}
