//! RFC 5988 `Link` header parsing for paginated listings.

use url::Url;

/// Navigation relations found in a `Link` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLinks {
    pub next: Option<Url>,
    pub last: Option<Url>,
}

impl PageLinks {
    /// Parse a `Link` header value. Relative targets are resolved against
    /// `base`; malformed entries are skipped.
    pub fn parse(header: &str, base: &Url) -> Self {
        let mut links = PageLinks::default();

        for entry in split_entries(header) {
            let Some((target, params)) = entry.trim().split_once('>') else {
                continue;
            };
            let Some(target) = target.trim().strip_prefix('<') else {
                continue;
            };
            let Ok(url) = base.join(target.trim()) else {
                continue;
            };

            for rel in relations(params) {
                match rel {
                    "next" if links.next.is_none() => links.next = Some(url.clone()),
                    "last" if links.last.is_none() => links.last = Some(url.clone()),
                    _ => {}
                }
            }
        }

        links
    }

    /// Page number advertised by the `last` relation.
    pub fn last_page(&self) -> Option<u32> {
        page_number(self.last.as_ref()?)
    }
}

/// Value of the `page` query parameter, if any.
pub fn page_number(url: &Url) -> Option<u32> {
    url.query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok())
}

// Commas may appear inside `<...>`, so split only outside angle brackets.
fn split_entries(header: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in header.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                entries.push(&header[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    entries.push(&header[start..]);
    entries
}

fn relations(params: &str) -> impl Iterator<Item = &str> {
    params
        .split(';')
        .filter_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("rel")
                .then(|| value.trim().trim_matches('"'))
        })
        .flat_map(str::split_whitespace)
}
