//! Input Validation

use url::Url;

/// Loose address check: one `@`, non-empty local part, dotted domain, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Absolute http(s) URL
pub fn is_valid_meeting_url(link: &str) -> bool {
    Url::parse(link)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

/// Trimmed, non-empty display name
pub fn normalize_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("taro@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.co.jp"));
        assert!(!is_valid_email("taro@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("taro@@example.com"));
        assert!(!is_valid_email("taro @example.com"));
        assert!(!is_valid_email("taro.example.com"));
    }

    #[test]
    fn test_meeting_url_validation() {
        assert!(is_valid_meeting_url("https://zoom.us/j/123"));
        assert!(is_valid_meeting_url("http://localhost:8080/room"));
        assert!(!is_valid_meeting_url("ftp://files.example.com"));
        assert!(!is_valid_meeting_url("zoom.us/j/123"));
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Hanako "), Some("Hanako".into()));
        assert_eq!(normalize_name("   "), None);
    }
}
