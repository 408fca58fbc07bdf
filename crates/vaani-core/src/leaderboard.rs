//! The leaderboard query: concerns for one exact (level, location) pair,
//! ranked by net votes.
//!
//! There is exactly one ordering rule: `net_votes` descending, then
//! `created_at` ascending (oldest first), then insertion order. Backends must
//! implement it in full so pages never overlap or skip items.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, concern::GeographicLevel};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Parameters for [`crate::store::ConcernStore::leaderboard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardQuery {
  pub level:     GeographicLevel,
  pub location:  String,
  /// Zero-based page index.
  pub page:      u32,
  pub page_size: u32,
}

impl LeaderboardQuery {
  pub fn new(
    level: GeographicLevel,
    location: impl Into<String>,
    page: u32,
    page_size: Option<u32>,
  ) -> Result<Self> {
    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
      return Err(Error::Validation(format!(
        "page size must be between 1 and {MAX_PAGE_SIZE}"
      )));
    }

    let location = location.into().trim().to_owned();
    if location.is_empty() {
      return Err(Error::Validation(
        "location identifier cannot be blank".into(),
      ));
    }

    Ok(Self { level, location, page, page_size })
  }

  pub fn limit(&self) -> u64 { u64::from(self.page_size) }

  pub fn offset(&self) -> u64 {
    u64::from(self.page) * u64::from(self.page_size)
  }
}

/// One page of results plus the total number of matching items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
  pub items:     Vec<T>,
  pub page:      u32,
  pub page_size: u32,
  pub total:     u64,
}

impl<T> Page<T> {
  pub fn total_pages(&self) -> u64 {
    self.total.div_ceil(u64::from(self.page_size.max(1)))
  }
}
