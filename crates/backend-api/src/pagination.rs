use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use wardline_config::PaginationConfig;
use wardline_supabase::{Page, QueryBuilder};

use crate::routes::models::{
    Announcement, AuditLogEntry, DailyMetric, Department, Document, Incident, Message, Profile,
    ThreadSummary, TransactionEntry,
};
use crate::validation::ValidationError;

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 1-based page number.
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    /// Apply defaults and the configured ceiling. Zero is rejected rather
    /// than clamped so callers notice off-by-one page numbering.
    pub fn resolve(params: &PageParams, config: &PaginationConfig) -> Result<Self, ValidationError> {
        let page = params.page.unwrap_or(1);
        if page == 0 {
            return Err(ValidationError::new("page", "must be greater than 0"));
        }

        let page_size = params.page_size.unwrap_or(config.default_page_size);
        if page_size == 0 {
            return Err(ValidationError::new("page_size", "must be greater than 0"));
        }

        Ok(Self {
            page,
            page_size: page_size.min(config.max_page_size),
        })
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn apply(&self, query: QueryBuilder) -> QueryBuilder {
        query.limit(self.limit()).offset(self.offset())
    }

    pub fn wrap<T>(&self, page: Page<T>) -> Paginated<T> {
        let total = page
            .total
            .unwrap_or_else(|| self.offset() + page.rows.len() as u64);
        self.paginate(page.rows, total)
    }

    pub fn paginate<T>(&self, items: Vec<T>, total: u64) -> Paginated<T> {
        let page_size = u64::from(self.page_size);
        Paginated {
            items,
            page: self.page,
            page_size: self.page_size,
            total,
            total_pages: total.div_ceil(page_size),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[aliases(
    AnnouncementPage = Paginated<Announcement>,
    AuditLogPage = Paginated<AuditLogEntry>,
    DailyMetricPage = Paginated<DailyMetric>,
    DepartmentPage = Paginated<Department>,
    DocumentPage = Paginated<Document>,
    IncidentPage = Paginated<Incident>,
    MessagePage = Paginated<Message>,
    ProfilePage = Paginated<Profile>,
    ThreadPage = Paginated<ThreadSummary>,
    TransactionPage = Paginated<TransactionEntry>
)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PaginationConfig {
        PaginationConfig {
            default_page_size: 20,
            max_page_size: 100,
        }
    }

    #[test]
    fn defaults_apply_when_params_missing() {
        let pagination = Pagination::resolve(&PageParams::default(), &config()).unwrap();
        assert_eq!(pagination, Pagination { page: 1, page_size: 20 });
        assert_eq!(pagination.offset(), 0);
        assert_eq!(pagination.limit(), 20);
    }

    #[test]
    fn page_size_is_capped() {
        let params = PageParams {
            page: Some(3),
            page_size: Some(500),
        };
        let pagination = Pagination::resolve(&params, &config()).unwrap();
        assert_eq!(pagination.page_size, 100);
        assert_eq!(pagination.offset(), 200);
    }

    #[test]
    fn zero_values_are_rejected() {
        let zero_page = PageParams {
            page: Some(0),
            page_size: None,
        };
        assert_eq!(
            Pagination::resolve(&zero_page, &config()).unwrap_err().field,
            "page"
        );

        let zero_size = PageParams {
            page: None,
            page_size: Some(0),
        };
        assert_eq!(
            Pagination::resolve(&zero_size, &config()).unwrap_err().field,
            "page_size"
        );
    }

    #[test]
    fn wrap_computes_total_pages() {
        let pagination = Pagination { page: 2, page_size: 10 };
        let page = Page {
            rows: vec![1, 2, 3],
            total: Some(23),
        };
        let wrapped = pagination.wrap(page);
        assert_eq!(wrapped.total, 23);
        assert_eq!(wrapped.total_pages, 3);
        assert_eq!(wrapped.items, vec![1, 2, 3]);
    }

    #[test]
    fn wrap_estimates_total_without_count() {
        let pagination = Pagination { page: 3, page_size: 10 };
        let wrapped = pagination.wrap(Page {
            rows: vec!["a"],
            total: None,
        });
        assert_eq!(wrapped.total, 21);
        assert_eq!(wrapped.total_pages, 3);
    }
}
