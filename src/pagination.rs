//! RFC 5988 `Link` headers for offset-paginated listings.

use url::form_urlencoded;

/// Where a page sits inside a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub skip: u64,
    pub limit: u64,
    pub total: u64,
}

impl Pagination {
    pub fn new(skip: u64, limit: u64, total: u64) -> Self {
        Self { skip, limit, total }
    }

    /// Offset of the following page, if any rows remain.
    pub fn next_skip(&self) -> Option<u64> {
        let next = self.skip.saturating_add(self.limit);
        (next < self.total).then_some(next)
    }

    /// Offset of the preceding page, clamped at 0.
    pub fn prev_skip(&self) -> Option<u64> {
        (self.skip > 0).then(|| self.skip.saturating_sub(self.limit))
    }

    fn url(&self, base_url: &str, params: &[(&str, String)], skip: u64) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
            .append_pair("skip", &skip.to_string())
            .append_pair("limit", &self.limit.to_string())
            .finish();
        format!("<{base_url}?{query}>")
    }

    /// `Link` header value with `rel="next"` and/or `rel="prev"`.
    ///
    /// `params` are the filters of the current request, already stripped of
    /// absent values; multi-valued filters appear once per value. Returns an
    /// empty string when neither link applies.
    pub fn link_header(&self, base_url: &str, params: &[(&str, String)]) -> String {
        let mut links = Vec::with_capacity(2);
        if let Some(skip) = self.next_skip() {
            links.push(format!("{}; rel=\"next\"", self.url(base_url, params, skip)));
        }
        if let Some(skip) = self.prev_skip() {
            links.push(format!("{}; rel=\"prev\"", self.url(base_url, params, skip)));
        }
        links.join(", ")
    }
}
