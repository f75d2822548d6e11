//! Best-effort element discovery against an unstable host DOM.
//!
//! The host application ships hashed class names that change per build, so
//! callers pass several candidate selectors or class-name fragments and take
//! whatever matches first. Nothing here fails loudly.

use super::document::{Document, NodeId};
use super::page::HostPage;
use super::selector::{escape_attr_value, SelectorList};
use std::time::Duration;

/// Tries each selector in order and returns the first element found.
///
/// Selector priority follows list order, not document order. Invalid
/// selectors are skipped.
pub fn find_element_by_selectors<S: AsRef<str>>(
    doc: &Document,
    root: NodeId,
    selectors: &[S],
) -> Option<NodeId> {
    selectors.iter().find_map(|selector| {
        let selector = selector.as_ref();
        match doc.query_selector(root, selector) {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping invalid selector");
                None
            }
        }
    })
}

/// Finds the first element whose class list contains one of `patterns` as a
/// substring.
///
/// The combined `[class*=..]` query can match an element through the whole
/// class attribute rather than one class token (e.g. a pattern spanning two
/// classes), so the match is re-checked against the individual classes.
pub fn find_element_by_class_pattern<S: AsRef<str>>(
    doc: &Document,
    root: NodeId,
    patterns: &[S],
) -> Option<NodeId> {
    let patterns: Vec<&str> = patterns
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| !p.is_empty())
        .collect();
    if patterns.is_empty() {
        return None;
    }

    let combined = patterns
        .iter()
        .map(|p| format!("[class*=\"{}\"]", escape_attr_value(p)))
        .collect::<Vec<_>>()
        .join(", ");

    let selector = match SelectorList::parse(&combined) {
        Ok(selector) => selector,
        Err(e) => {
            tracing::debug!(error = %e, "Class pattern selector rejected");
            return None;
        }
    };

    let candidate = doc.select_first(root, &selector)?;
    let verified = doc
        .class_list(candidate)
        .iter()
        .any(|class| patterns.iter().any(|p| class.contains(p)));

    if verified {
        Some(candidate)
    } else {
        tracing::debug!(
            element = candidate.index(),
            "Class pattern matched attribute text but no single class"
        );
        None
    }
}

/// Calls `find` up to `attempts` times, sleeping `delay` between tries, and
/// returns the first hit.
pub async fn retry_until<T>(
    attempts: u32,
    delay: Duration,
    mut find: impl FnMut() -> Option<T>,
) -> Option<T> {
    for attempt in 1..=attempts {
        if let Some(found) = find() {
            return Some(found);
        }
        tracing::debug!(attempt, attempts, "Element not found yet");
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }
    None
}

/// Retries [`find_element_by_selectors`] against the page body up to
/// `attempts` times, sleeping `delay` between tries.
pub async fn wait_for_element<S: AsRef<str>>(
    page: &HostPage,
    selectors: &[S],
    attempts: u32,
    delay: Duration,
) -> Option<NodeId> {
    retry_until(attempts, delay, || {
        page.read(|doc| find_element_by_selectors(doc, doc.body(), selectors))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::document::ElementSpec;

    #[test]
    fn test_selectors_priority_follows_list_order() {
        let mut doc = Document::new();
        let body = doc.body();
        let first_in_doc = doc.append(body, ElementSpec::new("div").class("fallback"));
        let preferred = doc.append(body, ElementSpec::new("nav").id("main-sidebar"));

        let found = find_element_by_selectors(&doc, body, &["#main-sidebar", ".fallback"]);
        assert_eq!(found, Some(preferred));

        let found = find_element_by_selectors(&doc, body, &["#missing", ".fallback", "nav"]);
        assert_eq!(found, Some(first_in_doc));
    }

    #[test]
    fn test_selectors_empty_and_invalid() {
        let mut doc = Document::new();
        let body = doc.body();
        let nav = doc.append(body, ElementSpec::new("nav"));

        let empty: [&str; 0] = [];
        assert_eq!(find_element_by_selectors(&doc, body, &empty), None);
        assert_eq!(find_element_by_selectors(&doc, body, &["nav[", "nav"]), Some(nav));
        assert_eq!(find_element_by_selectors(&doc, body, &["aside"]), None);
    }

    #[test]
    fn test_class_pattern_matches_hashed_class() {
        let mut doc = Document::new();
        let body = doc.body();
        doc.append(body, ElementSpec::new("div").class("header"));
        let menu = doc.append(body, ElementSpec::new("div").class("_sideMenu_a1b2c open"));

        let found = find_element_by_class_pattern(&doc, body, &["_menuFooter_", "_sideMenu_"]);
        assert_eq!(found, Some(menu));
    }

    #[test]
    fn test_class_pattern_rejects_cross_class_match() {
        let mut doc = Document::new();
        let body = doc.body();
        // "open _side" spans two tokens: matches [class*=..] but no single class.
        doc.append(body, ElementSpec::new("div").class("open _sideMenu"));

        assert_eq!(find_element_by_class_pattern(&doc, body, &["open _side"]), None);
    }

    #[test]
    fn test_class_pattern_empty_list() {
        let doc = Document::new();
        let empty: Vec<String> = Vec::new();
        assert_eq!(find_element_by_class_pattern(&doc, doc.body(), &empty), None);
        assert_eq!(find_element_by_class_pattern(&doc, doc.body(), &[""]), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_element_retries() {
        let page = HostPage::new();
        let late = page.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            late.append_child(late.body(), ElementSpec::new("aside").id("late"));
        });

        let found = wait_for_element(&page, &["#late"], 5, Duration::from_millis(100)).await;
        assert!(found.is_some());

        let missing = wait_for_element(&page, &["#never"], 3, Duration::from_millis(100)).await;
        assert_eq!(missing, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_counts_attempts() {
        let mut calls = 0;
        let found = retry_until(4, Duration::from_millis(50), || {
            calls += 1;
            (calls == 3).then_some(calls)
        })
        .await;
        assert_eq!(found, Some(3));

        let mut calls = 0;
        let none: Option<()> = retry_until(4, Duration::from_millis(50), || {
            calls += 1;
            None
        })
        .await;
        assert_eq!(none, None);
        assert_eq!(calls, 4);
    }
}
