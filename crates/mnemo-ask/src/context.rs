//! Context blocks handed to the model.

use mnemo_core::{ContentType, ScrapedPage, SearchResult, Source, WebResult};

/// One web result with the text gathered for it.
#[derive(Debug, Clone, PartialEq)]
pub struct WebPage {
    pub title: String,
    pub url: String,
    pub text: String,
}

impl WebPage {
    /// Page text from a scrape, falling back to the search snippet when the
    /// scrape produced nothing.
    pub fn from_scrape(result: &WebResult, page: Option<ScrapedPage>, max_chars: usize) -> Self {
        let (title, text) = match page {
            Some(page) if !page.content.trim().is_empty() => {
                let title = if page.title.trim().is_empty() {
                    result.title.clone()
                } else {
                    page.title
                };
                (title, page.content)
            }
            _ => (result.title.clone(), result.snippet.clone()),
        };
        Self {
            title,
            url: result.url.clone(),
            text: truncate_chars(text.trim(), max_chars),
        }
    }

    pub fn source(&self) -> Source {
        Source::web(self.title.clone(), self.url.clone())
    }
}

/// Cut to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Numbered personal context, one entry per result.
pub fn personal_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let doc = &r.document;
            let kind = match doc.content_type {
                ContentType::Todo => "Todo",
                ContentType::Memory => "Memory",
                ContentType::Web => "Web page",
            };
            let mut entry = format!("[{}] {}: {}", i + 1, kind, doc.title.trim());
            if !doc.content.trim().is_empty() {
                entry.push('\n');
                entry.push_str(doc.content.trim());
            }
            for (key, value) in &doc.metadata {
                entry.push_str(&format!("\n{}: {}", key, value));
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Web context with URL attribution.
pub fn web_context(pages: &[WebPage]) -> String {
    pages
        .iter()
        .filter(|p| !p.text.trim().is_empty())
        .map(|p| format!("Source: {} ({})\n{}", p.title, p.url, p.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Append sources, skipping web pages already present by URL.
pub fn merge_sources(sources: &mut Vec<Source>, incoming: impl IntoIterator<Item = Source>) {
    for source in incoming {
        let duplicate = source.url.is_some()
            && source.content_type == ContentType::Web
            && sources
                .iter()
                .any(|s| s.content_type == ContentType::Web && s.url == source.url);
        if !duplicate {
            sources.push(source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::Document;
    use uuid::Uuid;

    fn web_result() -> WebResult {
        WebResult {
            title: "Search title".to_string(),
            url: "https://example.com/a".to_string(),
            snippet: "Snippet text".to_string(),
        }
    }

    #[test]
    fn test_scrape_preferred_over_snippet() {
        let page = ScrapedPage {
            title: "Page title".to_string(),
            content: "Full page text".to_string(),
        };
        let p = WebPage::from_scrape(&web_result(), Some(page), 100);
        assert_eq!(p.title, "Page title");
        assert_eq!(p.text, "Full page text");
    }

    #[test]
    fn test_snippet_fallback() {
        let p = WebPage::from_scrape(&web_result(), None, 100);
        assert_eq!(p.title, "Search title");
        assert_eq!(p.text, "Snippet text");

        let empty = ScrapedPage {
            title: "t".to_string(),
            content: "   ".to_string(),
        };
        assert_eq!(
            WebPage::from_scrape(&web_result(), Some(empty), 100).text,
            "Snippet text"
        );
    }

    #[test]
    fn test_page_text_capped() {
        let page = ScrapedPage {
            title: String::new(),
            content: "é".repeat(50),
        };
        let p = WebPage::from_scrape(&web_result(), Some(page), 10);
        assert_eq!(p.text.chars().count(), 10);
    }

    #[test]
    fn test_personal_context_numbering() {
        let results = vec![
            SearchResult::vector(
                Document::new(ContentType::Todo, Uuid::nil(), Uuid::nil(), "Renew passport", "")
                    .with_metadata("status", "pending"),
                0.9,
            ),
            SearchResult::vector(
                Document::new(ContentType::Memory, Uuid::nil(), Uuid::nil(), "Consulate", "Open 9-5"),
                0.8,
            ),
        ];
        let ctx = personal_context(&results);
        assert!(ctx.starts_with("[1] Todo: Renew passport\nstatus: pending"));
        assert!(ctx.contains("[2] Memory: Consulate\nOpen 9-5"));
    }

    #[test]
    fn test_merge_sources_dedupes_urls() {
        let mut sources = vec![Source::web("A", "https://a")];
        merge_sources(
            &mut sources,
            vec![Source::web("A again", "https://a"), Source::web("B", "https://b")],
        );
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].url.as_deref(), Some("https://b"));
    }
}
