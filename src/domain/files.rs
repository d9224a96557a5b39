//! File validation, hashing, and naming helpers for invoice uploads.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Maximum accepted upload size (10 MB)
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Content types accepted for invoice documents
pub const ALLOWED_CONTENT_TYPES: [&str; 4] =
    ["image/jpeg", "image/jpg", "image/png", "application/pdf"];

/// Validate an upload's content type and size.
///
/// The returned message is surfaced verbatim in the 400 response.
pub fn validate_file(content_type: &str, size: usize) -> Result<(), String> {
    if !ALLOWED_CONTENT_TYPES.contains(&content_type) {
        return Err("Invalid file type. Only JPEG, PNG, and PDF files are allowed.".to_string());
    }

    if size > MAX_FILE_SIZE {
        return Err("File too large. Maximum size is 10MB.".to_string());
    }

    Ok(())
}

/// SHA-256 of the raw file bytes, hex encoded. Used as the document hash
/// for exact-duplicate detection.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Storage object path: `{user_id}/{millis}_{uuid}.{ext}`.
///
/// The user-id prefix keeps objects partitioned per user in the bucket.
pub fn unique_object_path(user_id: Uuid, file_name: &str) -> String {
    let extension = file_name.rsplit('.').next().filter(|e| !e.is_empty() && *e != file_name);
    let millis = chrono::Utc::now().timestamp_millis();
    format!(
        "{}/{}_{}.{}",
        user_id,
        millis,
        Uuid::new_v4(),
        extension.unwrap_or("bin")
    )
}

/// Human-readable file size: 1024-based units, at most two decimals,
/// trailing zeros trimmed.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let exponent = (((bytes as f64).ln() / 1024_f64.ln()).floor() as usize).min(UNITS.len() - 1);
    let value = bytes as f64 / 1024_f64.powi(exponent as i32);

    let formatted = format!("{:.2}", value);
    let formatted = formatted.trim_end_matches('0').trim_end_matches('.');

    format!("{} {}", formatted, UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_exactly_the_allowed_types() {
        for ty in ["image/jpeg", "image/jpg", "image/png", "application/pdf"] {
            assert!(validate_file(ty, 1024).is_ok(), "should accept {}", ty);
        }

        for ty in ["image/gif", "text/plain", "application/zip", "image/webp", ""] {
            let err = validate_file(ty, 1024).unwrap_err();
            assert!(err.contains("Invalid file type"), "should reject {}", ty);
        }
    }

    #[test]
    fn rejects_files_over_ten_megabytes() {
        assert!(validate_file("image/png", MAX_FILE_SIZE).is_ok());
        let err = validate_file("image/png", MAX_FILE_SIZE + 1).unwrap_err();
        assert!(err.contains("File too large"));
    }

    #[test]
    fn formats_sizes_like_the_dashboard_expects() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(500), "500 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1024 * 1024), "1 MB");
        assert_eq!(format_file_size(10 * 1024 * 1024), "10 MB");
    }

    #[test]
    fn sha256_is_stable_and_hex_encoded() {
        let hash = sha256_hex(b"hello world");
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn object_paths_are_user_prefixed_and_keep_the_extension() {
        let user = Uuid::new_v4();
        let path = unique_object_path(user, "rechnung.pdf");
        assert!(path.starts_with(&format!("{}/", user)));
        assert!(path.ends_with(".pdf"));

        // No extension falls back to .bin
        let path = unique_object_path(user, "scan");
        assert!(path.ends_with(".bin"));
    }
}
