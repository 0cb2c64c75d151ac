use trellis_core::config::GatewayConfig;

/// Check a request's credentials against the configured token.
///
/// The bearer header wins over `?token=`; with no token configured every
/// request is allowed.
pub fn is_authorized(config: &GatewayConfig, bearer: Option<&str>, query_token: Option<&str>) -> bool {
    let Some(expected) = config.token.as_deref() else {
        return true;
    };
    match bearer {
        Some(given) => given == expected,
        None => query_token == Some(expected),
    }
}

/// Extract token from the query string (?token=...).
pub fn extract_token_from_query(query: &str) -> Option<&str> {
    query.split('&').find_map(|pair| pair.strip_prefix("token="))
}
