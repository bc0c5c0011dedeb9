use serde::Serialize;

use super::validation::ValidationError;

/// Validated, 1-indexed page selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Parses raw query values; absent values fall back to page 1 and `default_limit`.
    pub fn parse(
        page: Option<&str>,
        limit: Option<&str>,
        default_limit: u32,
        max_limit: u32,
    ) -> Result<Self, ValidationError> {
        let page = match page.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|page| *page >= 1)
                .ok_or_else(|| ValidationError::InvalidPage {
                    value: raw.to_string(),
                })?,
            None => 1,
        };

        let limit = match limit.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|limit| (1..=max_limit).contains(limit))
                .ok_or_else(|| ValidationError::InvalidLimit {
                    value: raw.to_string(),
                    max: max_limit,
                })?,
            None => default_limit,
        };

        Ok(Self { page, limit })
    }

    /// Builds a request from already-trusted numbers, clamping them into range.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Rows to skip before this page starts.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// Response envelope for list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            data,
            total,
            page: request.page(),
            limit: request.limit(),
            total_pages: total.div_ceil(u64::from(request.limit())),
        }
    }
}

/// Applies a page to an already ranked, fully materialized list.
pub fn slice_page<T>(ranked: Vec<T>, request: PageRequest) -> (Vec<T>, u64) {
    let total = ranked.len() as u64;
    let skip = usize::try_from(request.offset()).unwrap_or(usize::MAX);
    let items = ranked
        .into_iter()
        .skip(skip)
        .take(request.limit() as usize)
        .collect();
    (items, total)
}
