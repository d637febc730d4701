//! Trigger-name normalization shared by matching and caching: lowercase,
//! strip url-like tokens (`controlup://...`) and punctuation, collapse
//! whitespace. Two inputs that normalize to the same string are treated as
//! identical by the matcher and share a cache entry.

pub fn normalize(input: &str) -> String {
    let lowered = input.to_lowercase();

    let without_urls: Vec<&str> = lowered
        .split_whitespace()
        .filter(|token| !token.contains("://"))
        .collect();
    let joined = without_urls.join(" ");

    let stripped: String = joined
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_url_tokens_and_punctuation() {
        assert_eq!(
            normalize("High CPU! controlup://trigger/123  on   HostA"),
            "high cpu on hosta"
        );
    }

    #[test]
    fn normalizing_twice_is_stable() {
        let once = normalize("High-CPU_Usage (warning)");
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize("a    b\tc\nd"), "a b c d");
    }
}
