//! Field extraction helpers shared by the page parsers.
//!
//! Every helper returns `None` when the node, cell or attribute is absent.
//! A node that exists but holds only whitespace yields `Some("")`.

use regex::Regex;
use scraper::{ElementRef, Selector};

/// Trimmed descendant text of an element, `None` if it has no text nodes
pub fn text(elem: ElementRef<'_>) -> Option<String> {
    let mut parts = elem.text().peekable();
    parts.peek()?;
    Some(parts.collect::<String>().trim().to_string())
}

/// Trimmed text of the first match of `selector` under `scope`
pub fn select_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope.select(selector).next().and_then(text)
}

/// Attribute value of the first match of `selector` under `scope`
pub fn select_attr(scope: ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    scope
        .select(selector)
        .next()
        .and_then(|e| e.value().attr(attr))
        .map(|v| v.trim().to_string())
}

/// Text of the cell at `offset`
pub fn cell_text(cells: &[ElementRef<'_>], offset: usize) -> Option<String> {
    cells.get(offset).copied().and_then(text)
}

/// Text of the first match of `selector` inside the cell at `offset`
pub fn cell_select_text(cells: &[ElementRef<'_>], offset: usize, selector: &Selector) -> Option<String> {
    cells.get(offset).and_then(|c| select_text(*c, selector))
}

/// Attribute of the first match of `selector` inside the cell at `offset`
pub fn cell_select_attr(
    cells: &[ElementRef<'_>],
    offset: usize,
    selector: &Selector,
    attr: &str,
) -> Option<String> {
    cells.get(offset).and_then(|c| select_attr(*c, selector, attr))
}

/// Direct element children named `name`, like XPath `./td`
pub fn child_elements<'a>(elem: ElementRef<'a>, name: &'static str) -> impl Iterator<Item = ElementRef<'a>> {
    elem.children()
        .filter_map(ElementRef::wrap)
        .filter(move |e| e.value().name() == name)
}

/// Named capture group of `re` applied to `input`.
///
/// An absent input and a non-matching pattern both give `None`.
pub fn capture(input: Option<&str>, re: &Regex, group: &str) -> Option<String> {
    re.captures(input?)
        .and_then(|caps| caps.name(group))
        .map(|m| m.as_str().to_string())
}

/// Non-empty text, with empty strings collapsed to `None`
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Number with thousands separators removed (`1,234.5`)
pub fn parse_number<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    value?.replace(',', "").trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    #[test]
    fn test_text_absent_vs_empty() {
        let doc = Html::parse_fragment("<div><p>  hello </p><p>   </p><p></p></div>");
        let cells: Vec<_> = doc.select(&sel("p")).collect();

        assert_eq!(cell_text(&cells, 0).as_deref(), Some("hello"));
        assert_eq!(cell_text(&cells, 1).as_deref(), Some(""));
        assert_eq!(cell_text(&cells, 2), None);
        assert_eq!(cell_text(&cells, 9), None);
    }

    #[test]
    fn test_select_attr() {
        let doc = Html::parse_fragment(r#"<td><a href="/horse/2019104567/">ドウデュース</a></td>"#);
        let root = doc.root_element();

        assert_eq!(
            select_attr(root, &sel("a"), "href").as_deref(),
            Some("/horse/2019104567/")
        );
        assert_eq!(select_text(root, &sel("a")).as_deref(), Some("ドウデュース"));
        assert_eq!(select_attr(root, &sel("a"), "title"), None);
        assert_eq!(select_attr(root, &sel("span"), "href"), None);
    }

    #[test]
    fn test_capture() {
        let re = Regex::new(r"/horse/(?P<id>.+)/").unwrap();

        assert_eq!(
            capture(Some("/horse/2019104567/"), &re, "id").as_deref(),
            Some("2019104567")
        );
        assert_eq!(capture(Some("/jockey/01234/"), &re, "id"), None);
        assert_eq!(capture(None, &re, "id"), None);
        assert_eq!(capture(Some("/horse/1/"), &re, "missing"), None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number::<f64>(Some("6,000.0")), Some(6000.0));
        assert_eq!(parse_number::<u32>(Some("16")), Some(16));
        assert_eq!(parse_number::<u32>(Some("")), None);
        assert_eq!(parse_number::<u32>(None), None);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(Some("1-1-1".to_string())).as_deref(), Some("1-1-1"));
    }
}
