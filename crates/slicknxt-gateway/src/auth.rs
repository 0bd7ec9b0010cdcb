use slicknxt_core::config::GatewayConfig;

/// Result of a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    /// No token configured.
    Anonymous,
    /// Caller presented the configured token.
    Token,
}

/// Bearer header first, then `?token=`. An empty configured token counts as unset.
pub fn validate_auth(
    config: &GatewayConfig,
    bearer: Option<&str>,
    query_token: Option<&str>,
) -> Option<AuthResult> {
    let expected = match config.token.as_deref() {
        Some(t) if !t.is_empty() => t,
        _ => return Some(AuthResult::Anonymous),
    };

    let presented = bearer.or(query_token)?;
    (presented == expected).then_some(AuthResult::Token)
}

/// Extract token from the query string (?token=...).
pub fn extract_token_from_query(query: &str) -> Option<&str> {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(token: Option<&str>) -> GatewayConfig {
        GatewayConfig {
            bind: "127.0.0.1:0".to_string(),
            token: token.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_no_token_is_open() {
        let config = gateway(None);
        assert_eq!(validate_auth(&config, None, None), Some(AuthResult::Anonymous));
        assert_eq!(
            validate_auth(&config, Some("anything"), None),
            Some(AuthResult::Anonymous)
        );
    }

    #[test]
    fn test_empty_token_is_open() {
        let config = gateway(Some(""));
        assert!(validate_auth(&config, None, None).is_some());
    }

    #[test]
    fn test_token_auth() {
        let config = gateway(Some("secret"));
        assert!(validate_auth(&config, None, None).is_none());
        assert!(validate_auth(&config, Some("wrong"), None).is_none());
        assert_eq!(
            validate_auth(&config, Some("secret"), None),
            Some(AuthResult::Token)
        );
        assert!(validate_auth(&config, None, Some("secret")).is_some());
    }

    #[test]
    fn test_bearer_wins_over_query() {
        let config = gateway(Some("secret"));
        assert!(validate_auth(&config, Some("wrong"), Some("secret")).is_none());
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(extract_token_from_query("token=abc"), Some("abc"));
        assert_eq!(extract_token_from_query("foo=bar&token=abc"), Some("abc"));
        assert_eq!(extract_token_from_query("foo=bar"), None);
    }
}
