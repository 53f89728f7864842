//! Request-scoped listing controls and the pagination summary derived from them.

use crate::error::DomainError;
use crate::validation::ValidationErrors;

pub const MAX_PAGE: i64 = 10_000_000;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Sort keys accepted for forum listings. A leading `-` means descending.
pub const FORUM_SORT_SAFELIST: &[&str] = &[
    "id",
    "topic",
    "created_at",
    "-id",
    "-topic",
    "-created_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

impl Filters {
    pub fn new(page: i64, page_size: i64, sort: impl Into<String>) -> Self {
        Self {
            page,
            page_size,
            sort: sort.into(),
            sort_safelist: FORUM_SORT_SAFELIST,
        }
    }

    pub fn validate(&self, v: &mut ValidationErrors) {
        v.check(self.page > 0, "page", "must be greater than zero");
        v.check(self.page <= MAX_PAGE, "page", "must be a maximum of 10 million");
        v.check(self.page_size > 0, "page_size", "must be greater than zero");
        v.check(
            self.page_size <= MAX_PAGE_SIZE,
            "page_size",
            "must be a maximum of 100",
        );
        v.check(
            self.sort_safelist.contains(&self.sort.as_str()),
            "sort",
            "invalid sort value",
        );
    }

    /// The safelisted column name for `sort`, stripped of its direction prefix.
    ///
    /// Returns a `'static` str taken from the safelist so the value can be
    /// spliced into SQL without ever echoing client input.
    pub fn sort_column(&self) -> Result<&'static str, DomainError> {
        self.sort_safelist
            .iter()
            .find(|candidate| **candidate == self.sort)
            .map(|candidate| candidate.trim_start_matches('-'))
            .ok_or_else(|| DomainError::Internal(format!("unsafe sort parameter: {}", self.sort)))
    }

    pub fn sort_direction(&self) -> SortDirection {
        if self.sort.starts_with('-') {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

impl Default for Filters {
    fn default() -> Self {
        Self::new(1, 20, "id")
    }
}

/// Pagination summary. All zeroes when the result set is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metadata {
    pub current_page: i64,
    pub page_size: i64,
    pub first_page: i64,
    pub last_page: i64,
    pub total_records: i64,
}

impl Metadata {
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records == 0 || page_size <= 0 {
            return Self::default();
        }
        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_records == 0
    }
}
