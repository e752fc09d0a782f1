//! Request shaping: `@token` path templates and query-string flattening.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde_json::{Map, Value};

use crate::HttpError;

/// Placeholder replaced by the caller's token in a path template.
pub const TOKEN_SLOT: &str = "@token";

/// Substitute the token into the template's single `@token` slot.
///
/// The text is inserted as given; wire-level escaping happens in
/// [`HttpClient::resolve`](crate::HttpClient::resolve) through
/// [`encode_token`]. Templates without a token (e.g. `identities`) come back
/// unchanged.
///
/// ```
/// use idlink_http::render_path;
///
/// assert_eq!(render_path("identities/@token/link", Some("abc")), "identities/abc/link");
/// assert_eq!(render_path("identities", None), "identities");
/// ```
pub fn render_path(template: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => template.replacen(TOKEN_SLOT, token, 1),
        None => template.to_string(),
    }
}

/// Path percent-encode set, plus the characters that would let a token
/// leave its segment (`/`, `\`) or be read as an escape (`%`).
const TOKEN_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\')
    .add(b'%');

/// Percent-encode a token so it occupies exactly one path segment.
///
/// `.` and `..` are rejected: URL parsing treats them (encoded or not) as
/// dot segments, so they can never address a resource.
///
/// ```
/// use idlink_http::encode_token;
///
/// assert_eq!(encode_token("a#b?c/d").unwrap(), "a%23b%3Fc%2Fd");
/// assert!(encode_token("..").is_err());
/// ```
pub fn encode_token(token: &str) -> Result<String, HttpError> {
    if token == "." || token == ".." {
        return Err(HttpError::Url(format!("token `{token}` cannot be a path segment")));
    }
    Ok(utf8_percent_encode(token, TOKEN_ENCODE_SET).to_string())
}

/// Flatten a params object into query pairs.
///
/// Scalars are stringified, `null` is dropped, nested objects use bracket
/// notation (`user[user_token]`) and arrays repeat the key with `[]`.
pub fn query_pairs(params: Option<&Map<String, Value>>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    if let Some(map) = params {
        for (key, value) in map {
            flatten_into(key.clone(), value, &mut out);
        }
    }
    out
}

fn flatten_into(key: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Bool(b) => out.push((key, b.to_string())),
        Value::Number(n) => out.push((key, n.to_string())),
        Value::String(s) => out.push((key, s.clone())),
        Value::Array(items) => {
            for item in items {
                flatten_into(format!("{key}[]"), item, out);
            }
        }
        Value::Object(map) => {
            for (inner, v) in map {
                flatten_into(format!("{key}[{inner}]"), v, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn substitutes_only_the_first_slot() {
        assert_eq!(
            render_path("identities/@token/@token", Some("x")),
            "identities/x/@token"
        );
    }

    #[test]
    fn template_substitution_keeps_token_text() {
        assert_eq!(render_path("identities/@token", Some("Ab-9_x")), "identities/Ab-9_x");
    }

    #[test]
    fn encoded_token_stays_in_one_segment() {
        assert_eq!(encode_token("victim#x").unwrap(), "victim%23x");
        assert_eq!(encode_token("a?b").unwrap(), "a%3Fb");
        assert_eq!(encode_token("../x").unwrap(), "..%2Fx");
        assert_eq!(encode_token(r"a\b").unwrap(), "a%5Cb");
        assert_eq!(encode_token("50%").unwrap(), "50%25");
        assert_eq!(encode_token("é").unwrap(), "%C3%A9");
    }

    #[test]
    fn plain_tokens_are_not_rewritten() {
        let token = "1f2e3d4c-aaaa-bbbb-cccc-0123456789ab";
        assert_eq!(encode_token(token).unwrap(), token);
    }

    #[test]
    fn dot_segments_are_rejected() {
        assert!(matches!(encode_token("."), Err(HttpError::Url(_))));
        assert!(matches!(encode_token(".."), Err(HttpError::Url(_))));
        assert_eq!(encode_token("...").unwrap(), "...");
    }

    #[test]
    fn missing_token_leaves_template_alone() {
        assert_eq!(render_path("identities/@token", None), "identities/@token");
    }

    #[test]
    fn flattens_scalars_and_skips_null() {
        let params = obj(json!({ "page": 3, "confirm_deletion": "true", "flag": false, "gone": null }));
        let mut pairs = query_pairs(Some(&params));
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("confirm_deletion".to_string(), "true".to_string()),
                ("flag".to_string(), "false".to_string()),
                ("page".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn flattens_nested_objects_and_arrays() {
        let params = obj(json!({ "user": { "user_token": "u1" }, "ids": ["a", "b"] }));
        let mut pairs = query_pairs(Some(&params));
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("ids[]".to_string(), "a".to_string()),
                ("ids[]".to_string(), "b".to_string()),
                ("user[user_token]".to_string(), "u1".to_string()),
            ]
        );
    }

    #[test]
    fn absent_params_produce_no_pairs() {
        assert!(query_pairs(None).is_empty());
    }
}
