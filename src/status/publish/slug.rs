const EMPTY_SLUG: &str = "unknown-service";

/// Filesystem-safe file stem for a service name.
///
/// Distinct names can collide (`"A/B"` and `"A B"` both become `a-b`). That is
/// left visible rather than disambiguated: the later file wins.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '&' => slug.push_str("and"),
            '/' | '\\' | '|' | ':' => slug.push('-'),
            '?' | '*' | '<' | '>' | '"' => {}
            c if c.is_whitespace() => slug.push('-'),
            c => slug.extend(c.to_lowercase()),
        }
    }

    if slug.is_empty() {
        return EMPTY_SLUG.to_string();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESERVED: [char; 10] = ['/', '\\', '&', '|', ':', '?', '*', '<', '>', '"'];

    #[test]
    fn slugs_known_service_names() {
        assert_eq!(slugify("iCloud"), "icloud");
        assert_eq!(slugify("Apple Music & Radio"), "apple-music-and-radio");
        assert_eq!(slugify("Sign in with Apple"), "sign-in-with-apple");
        assert_eq!(slugify("Mac App Store / iTunes: Sync"), "mac-app-store---itunes--sync");
        assert_eq!(slugify("What's <New>? \"Beta*\""), "what's-new-beta");
        assert_eq!(slugify("a\\b|c"), "a-b-c");
    }

    #[test]
    fn slugs_are_lowercase_and_free_of_reserved_characters() {
        let names = [
            "App Store Connect",
            "APNS | Sandbox",
            "Developer ID Notary Service",
            "C:\\Program Files\\*",
            "Ümlaut & ÉCOLE",
            "<<>>",
            "\t tabs\nand lines ",
            "",
        ];
        for name in names {
            let slug = slugify(name);
            assert!(!slug.is_empty(), "slug for {name:?} should not be empty");
            assert_eq!(slug, slug.to_lowercase(), "slug for {name:?} should be lowercase");
            assert!(
                !slug.chars().any(|c| RESERVED.contains(&c) || c.is_whitespace()),
                "slug {slug:?} for {name:?} contains a reserved character"
            );
        }
    }

    #[test]
    fn names_without_safe_characters_get_a_fixed_slug() {
        assert_eq!(slugify("?*"), "unknown-service");
        assert_eq!(slugify(""), "unknown-service");
    }

    #[test]
    fn colliding_names_share_a_slug() {
        assert_eq!(slugify("Maps/Routing"), slugify("Maps Routing"));
    }
}
