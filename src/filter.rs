//! Name filters and pagination for list queries.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Result, StoreError};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
}

impl FilterOp {
    const ALL: [FilterOp; 4] = [
        FilterOp::Equals,
        FilterOp::Contains,
        FilterOp::StartsWith,
        FilterOp::EndsWith,
    ];

    fn keyword(&self) -> &'static str {
        match self {
            FilterOp::Equals => "equals",
            FilterOp::Contains => "contains",
            FilterOp::StartsWith => "startswith",
            FilterOp::EndsWith => "endswith",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringFilter {
    pub op: FilterOp,
    pub value: String,
}

impl StringFilter {
    pub fn equals(value: impl Into<String>) -> Self {
        Self {
            op: FilterOp::Equals,
            value: value.into(),
        }
    }

    /// SQL fragment and bound parameter for `column`.
    pub fn to_sql(&self, column: &str) -> (String, String) {
        match self.op {
            FilterOp::Equals => (format!("{column} = ?"), self.value.clone()),
            FilterOp::Contains => (
                format!("{column} LIKE ? ESCAPE '\\'"),
                format!("%{}%", escape_like(&self.value)),
            ),
            FilterOp::StartsWith => (
                format!("{column} LIKE ? ESCAPE '\\'"),
                format!("{}%", escape_like(&self.value)),
            ),
            FilterOp::EndsWith => (
                format!("{column} LIKE ? ESCAPE '\\'"),
                format!("%{}", escape_like(&self.value)),
            ),
        }
    }
}

impl FromStr for StringFilter {
    type Err = String;

    /// Parse `op:value`; a value without a known operator prefix means equality.
    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        for op in FilterOp::ALL {
            if let Some(rest) = raw.strip_prefix(op.keyword())
                && let Some(value) = rest.strip_prefix(':')
            {
                return Ok(Self {
                    op,
                    value: value.to_string(),
                });
            }
        }
        Ok(Self::equals(raw))
    }
}

impl fmt::Display for StringFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.op.keyword(), self.value)
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Created,
    Updated,
    Name,
}

impl SortBy {
    pub fn column(&self) -> &'static str {
        match self {
            SortBy::Created => "created",
            SortBy::Updated => "updated",
            SortBy::Name => "name",
        }
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "created" => Ok(SortBy::Created),
            "updated" => Ok(SortBy::Updated),
            "name" => Ok(SortBy::Name),
            other => Err(format!(
                "This resource can not be sorted by '{other}'; use created, updated or name"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    pub name: Option<StringFilter>,
    pub page: u32,
    pub size: u32,
    pub sort_by: SortBy,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            name: None,
            page: 1,
            size: DEFAULT_PAGE_SIZE,
            sort_by: SortBy::default(),
        }
    }
}

impl ListFilter {
    pub fn with_name(mut self, filter: StringFilter) -> Self {
        self.name = Some(filter);
        self
    }

    pub fn with_page(mut self, page: u32, size: u32) -> Self {
        self.page = page;
        self.size = size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.page < 1 {
            return Err(StoreError::validation("Page number must be at least 1"));
        }
        if self.size < 1 || self.size > MAX_PAGE_SIZE {
            return Err(StoreError::validation(format!(
                "Page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.size) * i64::from(self.page.saturating_sub(1))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub index: u32,
    pub size: u32,
    pub total: u64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.total == 0 {
            return 1;
        }
        self.total.div_ceil(u64::from(self.size.max(1)))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
