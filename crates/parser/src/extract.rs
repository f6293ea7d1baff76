//! HTML extraction contract, per spec.md §4.6: input HTML bytes + final
//! URL; output extracted text, a set of absolute links resolved against the
//! final URL, and an optional title. `scraper` does the actual parsing,
//! grounded on the teacher's own HTML extraction pass.

use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

pub struct ExtractedPage {
    pub text: String,
    pub links: HashSet<String>,
    pub title: Option<String>,
}

pub trait HtmlExtractor: Send + Sync {
    fn extract(&self, html_bytes: &[u8], final_url: &str) -> ExtractedPage;
}

#[derive(Default)]
pub struct ScraperHtmlExtractor;

impl HtmlExtractor for ScraperHtmlExtractor {
    fn extract(&self, html_bytes: &[u8], final_url: &str) -> ExtractedPage {
        let html_str = String::from_utf8_lossy(html_bytes);
        let document = Html::parse_document(&html_str);
        let base = Url::parse(final_url).ok();

        let title = selector("title")
            .and_then(|s| document.select(&s).next())
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());

        let text = selector("body")
            .and_then(|s| document.select(&s).next())
            .map(|el| {
                el.text()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        let links = base
            .as_ref()
            .map(|base| extract_links(&document, base))
            .unwrap_or_default();

        ExtractedPage { text, links, title }
    }
}

fn selector(s: &str) -> Option<Selector> {
    Selector::parse(s).ok()
}

fn extract_links(document: &Html, base: &Url) -> HashSet<String> {
    let Some(sel) = selector("a[href]") else {
        return HashSet::new();
    };
    document
        .select(&sel)
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| {
            !(href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
                || href.starts_with("tel:")
                || href.starts_with("data:"))
        })
        .filter_map(|href| base.join(href).ok())
        .filter(|resolved| matches!(resolved.scheme(), "http" | "https"))
        .map(|resolved| resolved.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_text_and_links() {
        let html = r#"
            <html><head><title> My Page </title></head>
            <body>
                Hello <a href="/a">A</a> <a href="https://other.test/b">B</a>
                <a href="#frag">skip</a>
                <a href="javascript:void(0)">skip</a>
            </body></html>
        "#;
        let extractor = ScraperHtmlExtractor;
        let page = extractor.extract(html.as_bytes(), "https://site.test/index");

        assert_eq!(page.title.as_deref(), Some("My Page"));
        assert!(page.text.contains("Hello"));
        assert!(page.links.contains("https://site.test/a"));
        assert!(page.links.contains("https://other.test/b"));
        assert_eq!(page.links.len(), 2);
    }

    #[test]
    fn non_html_input_has_no_links_or_title() {
        let extractor = ScraperHtmlExtractor;
        let page = extractor.extract(b"not really html", "https://site.test/");
        assert!(page.title.is_none());
        assert!(page.links.is_empty());
    }
}
