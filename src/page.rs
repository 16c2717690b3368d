use std::fmt;
use std::ops::RangeInclusive;

use serde::Serialize;

use crate::error::CredoError;
use crate::query::{Entity, Query};
use crate::store::Database;

/// One window over a query result.
///
/// A page keeps the query it was produced from so neighbouring windows can be
/// fetched on demand; a detached page (built with [`Page::detached`]) cannot
/// navigate.
pub struct Page<'db, E: Entity> {
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub items: Vec<E>,
    source: Option<(&'db Database, Query<E>)>,
}

impl<'db, E: Entity> Page<'db, E> {
    pub fn fetch(
        db: &'db Database,
        query: Query<E>,
        page: usize,
        per_page: usize,
    ) -> Result<Self, CredoError> {
        if page == 0 {
            return Err(CredoError::InvalidOption(
                "page numbers start at 1".to_string(),
            ));
        }
        if per_page == 0 {
            return Err(CredoError::InvalidOption(
                "per_page must be at least 1".to_string(),
            ));
        }

        let total = db.count(&query.count_sql())?;
        let offset = (page - 1).saturating_mul(per_page);
        let items = db.fetch_all(&query.window_sql(per_page, offset))?;
        Ok(Self {
            page,
            per_page,
            total,
            items,
            source: Some((db, query)),
        })
    }

    pub fn detached(items: Vec<E>, page: usize, per_page: usize, total: usize) -> Self {
        Self {
            page,
            per_page,
            total,
            items,
            source: None,
        }
    }

    pub fn pages(&self) -> usize {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(self.per_page)
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages()
    }

    pub fn prev_num(&self) -> Option<usize> {
        self.has_prev().then(|| self.page - 1)
    }

    pub fn next_num(&self) -> Option<usize> {
        self.has_next().then(|| self.page + 1)
    }

    pub fn prev(&self) -> Result<Self, CredoError> {
        if !self.has_prev() {
            return Err(CredoError::InvalidNavigation(
                "already on the first page".to_string(),
            ));
        }
        self.goto(self.page - 1)
    }

    pub fn next(&self) -> Result<Self, CredoError> {
        self.goto(self.page + 1)
    }

    pub fn goto(&self, page: usize) -> Result<Self, CredoError> {
        let (db, query) = self.source.as_ref().ok_or_else(|| {
            CredoError::InvalidNavigation("page is not backed by a query".to_string())
        })?;
        Self::fetch(*db, query.clone(), page, self.per_page)
    }

    pub fn iter_pages(&self) -> RangeInclusive<usize> {
        1..=self.pages()
    }

    pub fn is_detached(&self) -> bool {
        self.source.is_none()
    }

    pub fn summary(&self) -> PageSummary {
        PageSummary {
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            pages: self.pages(),
            has_prev: self.has_prev(),
            has_next: self.has_next(),
        }
    }
}

impl<E: Entity + fmt::Debug> fmt::Debug for Page<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("page", &self.page)
            .field("per_page", &self.per_page)
            .field("total", &self.total)
            .field("items", &self.items)
            .field("detached", &self.is_detached())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSummary {
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub pages: usize,
    pub has_prev: bool,
    pub has_next: bool,
}
