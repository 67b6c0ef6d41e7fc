//! Lenient pagination parameters for the student listing
//!
//! Raw query values are read the way a browser-facing API usually reads them: the
//! leading integer is taken (`"3abc"` is 3, `"2.9"` is 2) and anything unusable falls
//! back to the default instead of failing the request.

/// Page used when none (or an unusable one) is given
pub const DEFAULT_PAGE: i64 = 1;

/// Page size used when none (or an unusable one) is given
pub const DEFAULT_LIMIT: i64 = 5;

/// Read the leading integer of `raw`
///
/// Leading whitespace and one sign are accepted; parsing stops at the first
/// non-digit. Values beyond `i64` saturate. Returns `None` when no digit follows.
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut seen_digit = false;
    let mut value: i64 = 0;
    for byte in digits.bytes().take_while(u8::is_ascii_digit) {
        seen_digit = true;
        let digit = i64::from(byte - b'0');
        value = if negative {
            value.saturating_mul(10).saturating_sub(digit)
        } else {
            value.saturating_mul(10).saturating_add(digit)
        };
    }

    seen_digit.then_some(value)
}

/// A normalized listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number, always positive
    pub page: i64,
    /// Rows per page, always positive
    pub limit: i64,
    /// Substring matched against student names; empty means no filter
    pub search: String,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            search: String::new(),
        }
    }
}

impl PageRequest {
    /// Build a request, replacing non-positive values with the defaults
    pub fn new(page: i64, limit: i64, search: impl Into<String>) -> Self {
        Self {
            page: if page > 0 { page } else { DEFAULT_PAGE },
            limit: if limit > 0 { limit } else { DEFAULT_LIMIT },
            search: search.into(),
        }
    }

    /// Build a request from raw query-string values
    pub fn from_raw(page: Option<&str>, limit: Option<&str>, search: Option<&str>) -> Self {
        Self::new(
            page.and_then(parse_leading_int).unwrap_or(DEFAULT_PAGE),
            limit.and_then(parse_leading_int).unwrap_or(DEFAULT_LIMIT),
            search.unwrap_or_default(),
        )
    }

    /// Rows skipped before this page
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Pages needed to show `total_count` rows at this page size
    pub fn total_pages(&self, total_count: i64) -> i64 {
        let total_count = total_count.max(0);
        total_count / self.limit + i64::from(total_count % self.limit != 0)
    }

    /// `%search%` pattern, or `None` when no filter applies
    pub fn search_pattern(&self) -> Option<String> {
        if self.search.is_empty() {
            None
        } else {
            Some(format!("%{}%", self.search))
        }
    }
}
