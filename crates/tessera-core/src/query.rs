//! Typed listing queries for staff dashboards.
//!
//! Free-form request parameters are validated here, once: sort keys outside
//! the allow-list fall back to `created_at DESC` instead of erroring, and
//! paging values are clamped into range. Backends only ever see the typed
//! result.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::{ApplicationStatus, PaymentStatus};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

// ─── Sorting ─────────────────────────────────────────────────────────────────

/// Columns a listing may be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
  #[default]
  CreatedAt,
  UpdatedAt,
  FullName,
  Status,
  PaymentStatus,
}

impl SortColumn {
  /// Parse a client-supplied key. Unknown keys fall back to `created_at`.
  pub fn parse(key: &str) -> Self {
    match key {
      "created_at" => Self::CreatedAt,
      "updated_at" => Self::UpdatedAt,
      "full_name" => Self::FullName,
      "status" => Self::Status,
      "payment_status" => Self::PaymentStatus,
      _ => Self::CreatedAt,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
  Asc,
  #[default]
  Desc,
}

impl SortOrder {
  /// `asc` in any case selects ascending order; anything else is descending.
  pub fn parse(value: &str) -> Self {
    if value.eq_ignore_ascii_case("asc") { Self::Asc } else { Self::Desc }
  }
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// Parameters for [`crate::store::ApplicationStore::list_applications`].
/// All filters are conjunctive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationQuery {
  pub status:            Option<ApplicationStatus>,
  pub assigned_staff_id: Option<Uuid>,
  pub payment_status:    Option<PaymentStatus>,
  /// Case-insensitive substring matched against applicant name, email and
  /// fiscal code.
  pub search:            Option<String>,
  pub sort_by:           SortColumn,
  pub sort_order:        SortOrder,
  page:                  u32,
  limit:                 u32,
}

impl Default for ApplicationQuery {
  fn default() -> Self {
    Self {
      status:            None,
      assigned_staff_id: None,
      payment_status:    None,
      search:            None,
      sort_by:           SortColumn::default(),
      sort_order:        SortOrder::default(),
      page:              1,
      limit:             DEFAULT_PAGE_SIZE,
    }
  }
}

impl ApplicationQuery {
  /// Set the 1-based page; values below 1 clamp to 1.
  pub fn with_page(mut self, page: i64) -> Self {
    self.page = page.clamp(1, i64::from(u32::MAX)) as u32;
    self
  }

  /// Set the page size, clamped to `1..=MAX_PAGE_SIZE`.
  pub fn with_limit(mut self, limit: i64) -> Self {
    self.limit = limit.clamp(1, i64::from(MAX_PAGE_SIZE)) as u32;
    self
  }

  pub fn page(&self) -> u32 { self.page }

  pub fn limit(&self) -> u32 { self.limit }

  /// Number of matching rows to skip before this page.
  pub fn offset(&self) -> u64 { u64::from(self.page - 1) * u64::from(self.limit) }

  /// The search term with surrounding whitespace removed, if non-empty.
  pub fn search_term(&self) -> Option<&str> {
    self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
  }
}

// ─── Results ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
  pub current_page:   u32,
  pub total_pages:    u64,
  pub total_items:    u64,
  pub items_per_page: u32,
  pub has_next:       bool,
  pub has_prev:       bool,
}

impl Pagination {
  /// Derive paging metadata from the total number of matching rows.
  pub fn new(query: &ApplicationQuery, total_items: u64) -> Self {
    let limit = u64::from(query.limit());
    let total_pages = total_items.div_ceil(limit);
    let current_page = query.page();
    Self {
      current_page,
      total_pages,
      total_items,
      items_per_page: query.limit(),
      has_next: u64::from(current_page) < total_pages,
      has_prev: current_page > 1,
    }
  }
}

/// One page of results plus its paging metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
  pub items:      Vec<T>,
  pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_sort_key_falls_back_to_created_at() {
    assert_eq!(SortColumn::parse("password"), SortColumn::CreatedAt);
    assert_eq!(SortColumn::parse("full_name"), SortColumn::FullName);
    assert_eq!(SortOrder::parse("drop table"), SortOrder::Desc);
    assert_eq!(SortOrder::parse("aSc"), SortOrder::Asc);
  }

  #[test]
  fn paging_values_are_clamped() {
    let query = ApplicationQuery::default().with_page(0).with_limit(10_000);
    assert_eq!(query.page(), 1);
    assert_eq!(query.limit(), MAX_PAGE_SIZE);

    let query = ApplicationQuery::default().with_page(-4).with_limit(0);
    assert_eq!(query.page(), 1);
    assert_eq!(query.limit(), 1);
  }

  #[test]
  fn third_page_of_forty_five() {
    let query = ApplicationQuery::default().with_page(3).with_limit(20);
    assert_eq!(query.offset(), 40);

    let pagination = Pagination::new(&query, 45);
    assert_eq!(pagination.total_pages, 3);
    assert!(!pagination.has_next);
    assert!(pagination.has_prev);
  }

  #[test]
  fn empty_result_has_no_pages() {
    let pagination = Pagination::new(&ApplicationQuery::default(), 0);
    assert_eq!(pagination.total_pages, 0);
    assert!(!pagination.has_next);
    assert!(!pagination.has_prev);
  }

  #[test]
  fn blank_search_is_ignored() {
    let query = ApplicationQuery { search: Some("   ".into()), ..Default::default() };
    assert_eq!(query.search_term(), None);
  }
}
