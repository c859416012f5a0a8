use regex::Regex;
use std::sync::OnceLock;

const PREFIX_LEN: usize = 20;

fn invalid_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9-]+").expect("static regex"))
}

/// Last group of a random v4 uuid (12 hex characters).
pub fn short_uuid() -> String {
    let id = uuid::Uuid::new_v4().to_string();
    id.rsplit('-').next().unwrap_or_default().to_string()
}

/// Cloud-safe identifier derived from a caller id: the first 20 characters,
/// lowercased with invalid characters replaced, followed by a short random
/// suffix. Cache identifiers must start with a letter.
pub fn short_resource_name(id: &str) -> String {
    let prefix: String = id.chars().take(PREFIX_LEN).collect();
    let mut prefix = invalid_chars()
        .replace_all(&prefix.to_lowercase(), "-")
        .to_string();
    if !prefix.starts_with(|c: char| c.is_ascii_lowercase()) {
        prefix.insert(0, 'r');
    }
    format!("{}{}", prefix, short_uuid())
}

pub fn security_group_name(prefix: &str, id: &str) -> String {
    format!("{}-sg-{}", prefix, id)
}

pub fn subnet_group_name(prefix: &str, id: &str) -> String {
    format!("{}-subg-{}", prefix, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_truncates_and_appends_suffix() {
        let name = short_resource_name("my-application-cache-primary");
        assert!(name.starts_with("my-application-cache"));
        assert_eq!(name.len(), 20 + 12);
        assert_ne!(name, short_resource_name("my-application-cache-primary"));
    }

    #[test]
    fn short_name_is_sanitized() {
        let name = short_resource_name("9_App.Cache");
        assert!(name.starts_with("r9-app-cache"));
        assert!(name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn dependent_group_names() {
        assert_eq!(security_group_name("db", "app"), "db-sg-app");
        assert_eq!(subnet_group_name("cache", "app"), "cache-subg-app");
    }
}
