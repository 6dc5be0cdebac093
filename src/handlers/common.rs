use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use crate::{ApiResponse, PaginatedResponse};

const MAX_LIMIT: u64 = 100;

/// Pagination parameters for list operations
#[derive(Debug, Clone, Copy, Deserialize, Serialize, IntoParams)]
pub struct PaginationParams {
    /// Page number, starting at 1
    #[serde(default = "default_page")]
    pub page: u64,
    /// Items per page (max 100)
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PaginationParams {
    /// Clamps page to at least 1 and limit to `1..=100`.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, MAX_LIMIT),
        }
    }

    pub fn into_response<T>(self, items: Vec<T>, total: u64) -> PaginatedResponse<T> {
        let total_pages = if total == 0 {
            0
        } else {
            (total + self.limit - 1) / self.limit
        };
        PaginatedResponse {
            items,
            total,
            page: self.page,
            limit: self.limit,
            total_pages,
        }
    }
}

/// Standard created response
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_is_clamped_and_counted() {
        let params = PaginationParams { page: 0, limit: 500 }.normalized();
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, 100);

        let page = PaginationParams { page: 2, limit: 20 }.into_response(vec![1, 2, 3], 41);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 2);

        let empty = PaginationParams::default().into_response::<u8>(vec![], 0);
        assert_eq!(empty.total_pages, 0);
    }
}
