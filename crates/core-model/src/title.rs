use serde_json::Value;

/// Display title used when an upstream value carries nothing printable.
pub const FALLBACK_TITLE: &str = "Mystery Spot";

/// Coerce an arbitrary JSON value into a displayable title.
///
/// * strings pass through (trimmed); blank strings use the fallback
/// * `null` uses the fallback
/// * numbers and booleans use their textual form
/// * objects prefer a nested `title`, then `message`, else compact JSON
/// * arrays use compact JSON
pub fn safe_title(value: Option<&Value>, fallback: &str) -> String {
    let Some(value) = value else {
        return fallback.to_string();
    };
    match value {
        Value::Null => fallback.to_string(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                fallback.to_string()
            } else {
                trimmed.to_string()
            }
        }
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => {
            for key in ["title", "message"] {
                if let Some(Value::String(s)) = map.get(key)
                    && !s.trim().is_empty()
                {
                    return s.trim().to_string();
                }
            }
            serde_json::to_string(value).unwrap_or_else(|_| fallback.to_string())
        }
        Value::Array(_) => serde_json::to_string(value).unwrap_or_else(|_| fallback.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_strings_pass_through() {
        assert_eq!(safe_title(Some(&json!("  Pho Real ")), FALLBACK_TITLE), "Pho Real");
    }

    #[test]
    fn missing_null_and_blank_use_fallback() {
        assert_eq!(safe_title(None, FALLBACK_TITLE), FALLBACK_TITLE);
        assert_eq!(safe_title(Some(&Value::Null), FALLBACK_TITLE), FALLBACK_TITLE);
        assert_eq!(safe_title(Some(&json!("   ")), "x"), "x");
    }

    #[test]
    fn scalars_are_stringified() {
        assert_eq!(safe_title(Some(&json!(42)), FALLBACK_TITLE), "42");
        assert_eq!(safe_title(Some(&json!(true)), FALLBACK_TITLE), "true");
    }

    #[test]
    fn objects_prefer_title_then_message() {
        let v = json!({"title": "Nested Diner", "message": "ignored"});
        assert_eq!(safe_title(Some(&v), FALLBACK_TITLE), "Nested Diner");
        let v = json!({"message": "quota exceeded"});
        assert_eq!(safe_title(Some(&v), FALLBACK_TITLE), "quota exceeded");
        let v = json!({"id": 7});
        assert_eq!(safe_title(Some(&v), FALLBACK_TITLE), "{\"id\":7}");
    }
}
