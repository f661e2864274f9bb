//! Secret redaction and triviality checks for rendered values.

use serde_json::{Map, Value};

/// Replacement text for secret values.
pub const REDACTED: &str = "xxxxxxxx";

const SECRET_MARKERS: [&str; 4] = ["password", "credential", "secret", "private"];

/// True if `name` contains one of `password`, `credential`, `secret`, `private`.
///
/// Substring match, case-sensitive. A marker also matches as a camelCase hump
/// (`Secret` right after a lowercase letter or digit). This widens a plain
/// substring check: `apiSecretToken` and `rootPassword` are secret too, while a
/// capitalised marker at the start of a name (`Password`) still is not.
/// ```rust
/// use entityvisor::introspect::is_secret;
///
/// assert!(is_secret("db.password"));
/// assert!(is_secret("aws.secretKey"));
/// assert!(is_secret("apiSecretToken"));
/// assert!(is_secret("rootPassword"));
/// assert!(!is_secret("Password"));
/// assert!(!is_secret("Secrets"));
/// assert!(!is_secret("username"));
/// ```
pub fn is_secret(name: &str) -> bool {
    SECRET_MARKERS
        .iter()
        .any(|marker| name.contains(marker) || contains_hump(name, marker))
}

fn contains_hump(name: &str, marker: &str) -> bool {
    let mut chars = marker.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let hump: String = first.to_ascii_uppercase().to_string() + chars.as_str();

    name.match_indices(&hump).any(|(at, _)| {
        name[..at]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    })
}

/// True for values that carry no information: null, `""`, `[]`, `{}`.
///
/// `0` and `false` are not trivial.
pub fn is_trivial(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Copy of `input` with every secret key's value replaced by [`REDACTED`].
pub fn sanitize(input: &Map<String, Value>) -> Map<String, Value> {
    input
        .iter()
        .map(|(key, value)| {
            let value = if is_secret(key) {
                Value::String(REDACTED.to_string())
            } else {
                value.clone()
            };
            (key.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_matches_substrings_case_sensitively() {
        let input = json!({
            "password123": "x",
            "apiSecretToken": "y",
            "username": "z",
            "Password": "w",
        });
        let Value::Object(input) = input else {
            unreachable!()
        };

        let out = sanitize(&input);
        assert_eq!(out["password123"], REDACTED);
        assert_eq!(out["apiSecretToken"], REDACTED);
        assert_eq!(out["username"], "z");
        assert_eq!(out["Password"], "w");
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_camel_case_humps_widen_the_match() {
        assert!(is_secret("rootPassword"));
        assert!(is_secret("db2Credential"));
        assert!(is_secret("sshPrivateKey"));
        assert!(!is_secret("Password"));
        assert!(!is_secret("root.Password"));
        assert!(!is_secret("PRIVATE_KEY"));
    }

    #[test]
    fn test_trivial_values() {
        assert!(is_trivial(&Value::Null));
        assert!(is_trivial(&json!("")));
        assert!(is_trivial(&json!([])));
        assert!(is_trivial(&json!({})));

        assert!(!is_trivial(&json!("a")));
        assert!(!is_trivial(&json!([0])));
        assert!(!is_trivial(&json!({"k": null})));
        assert!(!is_trivial(&json!(0)));
        assert!(!is_trivial(&json!(false)));
    }
}
