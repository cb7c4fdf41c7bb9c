//! Paging envelopes
//!
//! Two conventions are in use across the collections we read:
//! - next-link: `{"value": [...], "@odata.nextLink": "..."}`
//! - cursor: `{"d": {"results": [...], "__next": "..."}}`
//!
//! Whichever continuation field is present drives the next request.

use serde::Deserialize;

/// One decoded page
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default = "Option::default")]
    value: Option<Vec<T>>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
    #[serde(default = "Option::default")]
    d: Option<CursorBody<T>>,
}

#[derive(Debug, Deserialize)]
struct CursorBody<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(rename = "__next", default)]
    next: Option<String>,
}

impl<T> Envelope<T> {
    /// Flatten to items plus continuation; `None` when neither envelope matched
    pub(crate) fn into_page(self) -> Option<Page<T>> {
        let next_link = self.next_link.filter(|link| !link.trim().is_empty());
        match (self.value, self.d) {
            (Some(items), _) => Some(Page {
                items,
                next: next_link,
            }),
            (None, Some(body)) => Some(Page {
                items: body.results,
                next: body
                    .next
                    .filter(|link| !link.trim().is_empty())
                    .or(next_link),
            }),
            (None, None) => None,
        }
    }
}
