//! `Link` header pagination.

/// Page numbers advertised by a GitHub `Link` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkPagination {
    /// From `rel="next"`. Absent on the last page.
    pub next_page: Option<u32>,
}

/// Parse a `Link` header.
///
/// GitHub Link headers look like:
/// `<https://api.github.com/repositories/1/hooks?per_page=100&page=2>; rel="next", <...&page=3>; rel="last"`
pub fn parse_link_header(link_header: &str) -> LinkPagination {
    let mut info = LinkPagination::default();

    for part in link_header.split(',') {
        let mut url = None;
        let mut rel = None;

        for segment in part.trim().split(';') {
            let segment = segment.trim();
            if let Some(inner) = segment.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
                url = Some(inner);
            } else if let Some(rel_value) = segment.strip_prefix("rel=") {
                rel = Some(rel_value.trim_matches('"'));
            }
        }

        if let (Some(url), Some(rel)) = (url, rel)
            && let Some(page) = extract_page_from_url(url)
        {
            if rel == "next" {
                info.next_page = Some(page);
            }
        }
    }

    info
}

fn extract_page_from_url(url: &str) -> Option<u32> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .find_map(|param| param.strip_prefix("page="))
        .and_then(|value| value.parse().ok())
}
