use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::util::ts_to_rfc3339;

pub const WATERMARK: &str = "\u{a9} BioByte - For online viewing only";
pub const TERMS: &str = "This content is protected by copyright. Downloading, copying, or redistribution is prohibited.";

/// Response headers for protected content.
pub const SECURE_HEADERS: &[(&str, &str)] = &[
    ("Cache-Control", "no-cache, no-store, must-revalidate"),
    ("Pragma", "no-cache"),
    ("Expires", "0"),
    ("X-Content-Type-Options", "nosniff"),
    ("X-Frame-Options", "SAMEORIGIN"),
    (
        "Content-Security-Policy",
        "default-src 'self'; script-src 'self' 'unsafe-inline'",
    ),
];

/// Validate a client-supplied file name before it is joined onto an asset directory.
pub fn safe_file_name(raw: Option<&str>) -> AppResult<String> {
    let name = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::bad_request("File parameter is required"))?;

    if name.starts_with('/')
        || name.contains('\\')
        || name.contains('\0')
        || name.split('/').any(|seg| seg == ".." || seg == ".")
    {
        return Err(AppError::bad_request("Invalid file parameter"));
    }
    Ok(name.to_string())
}

/// Asset paths tried in order for a view-content request.
pub fn view_content_paths(file: &str) -> [String; 2] {
    [format!("syllabus_analysis/{file}"), format!("output/{file}")]
}

/// Add the `_metadata` watermark block to a JSON document.
///
/// Non-object documents are wrapped as `{"content": ..}` first.
pub fn watermark(doc: Value, user_id: Option<i32>, now: i64) -> Value {
    let mut obj = match doc {
        Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("content".to_string(), other);
            map
        }
    };
    obj.insert(
        "_metadata".to_string(),
        serde_json::json!({
            "accessTime": ts_to_rfc3339(now),
            "userId": user_id,
            "watermark": WATERMARK,
            "terms": TERMS,
        }),
    );
    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("1_Cell.json")]
    #[case("as/1_Cell.json")]
    #[case("notes..v2.json")]
    fn accepts_plain_names(#[case] name: &str) {
        assert_eq!(safe_file_name(Some(name)).unwrap(), name);
    }

    #[rstest]
    #[case("../secret.json")]
    #[case("a/../../b.json")]
    #[case("/etc/passwd")]
    #[case("a\\b.json")]
    fn rejects_traversal(#[case] name: &str) {
        assert_eq!(safe_file_name(Some(name)).unwrap_err().status(), 400);
    }

    #[test]
    fn view_content_falls_back_to_output() {
        assert_eq!(
            view_content_paths("as/1_Cell.json"),
            [
                "syllabus_analysis/as/1_Cell.json".to_string(),
                "output/as/1_Cell.json".to_string(),
            ]
        );
    }

    #[test]
    fn missing_file_is_bad_request() {
        let err = safe_file_name(Some("  ")).unwrap_err();
        assert_eq!(err.to_string(), "File parameter is required");
    }

    #[test]
    fn watermark_adds_metadata() {
        let doc = watermark(json!({"title": "Cells"}), Some(4), 0);
        assert_eq!(doc["title"], "Cells");
        assert_eq!(doc["_metadata"]["userId"], 4);
        assert_eq!(doc["_metadata"]["watermark"], WATERMARK);
        assert_eq!(doc["_metadata"]["accessTime"], "1970-01-01T00:00:00+00:00");

        let doc = watermark(json!([1, 2]), None, 0);
        assert_eq!(doc["content"], json!([1, 2]));
        assert!(doc["_metadata"]["userId"].is_null());
    }
}
