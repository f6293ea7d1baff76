//! Thin wrapper around the `robotstxt` crate matching the contract
//! spec.md §4.4 needs: evaluate a cached robots.txt body against a URL
//! path, in-process, with a permissive fallback for anything that doesn't
//! parse.

use robotstxt::DefaultMatcher;

#[derive(Debug, Clone)]
pub struct ParsedRobots {
    body: Option<String>,
}

impl ParsedRobots {
    pub fn from_body(body: String) -> Self {
        Self { body: Some(body) }
    }

    /// Used when robots.txt could not be fetched (network error, 404, or
    /// any non-2xx) — permissive default per spec.md §4.4.
    pub fn allow_all() -> Self {
        Self { body: None }
    }

    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        let Some(body) = &self.body else {
            return true;
        };
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(body, user_agent, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_all_permits_everything() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_allowed("/admin", "podcrawler"));
    }

    #[test]
    fn disallow_all_blocks_everything() {
        let robots = ParsedRobots::from_body("User-agent: *\nDisallow: /".to_string());
        assert!(!robots.is_allowed("/page", "podcrawler"));
    }

    #[test]
    fn specific_path_disallowed() {
        let robots =
            ParsedRobots::from_body("User-agent: *\nDisallow: /private".to_string());
        assert!(robots.is_allowed("/public", "podcrawler"));
        assert!(!robots.is_allowed("/private/doc", "podcrawler"));
    }

    #[test]
    fn malformed_body_falls_back_permissive() {
        let robots = ParsedRobots::from_body("{{{not robots".to_string());
        assert!(robots.is_allowed("/anything", "podcrawler"));
    }
}
