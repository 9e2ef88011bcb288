use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::executor::RequestExecutor;
use super::request::RequestSpec;
use crate::common::error::TaskError;
use crate::common::result::TaskResult;
use crate::domain::entities::item::Item;

pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// One page of a cursor-paginated collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
    pub is_last_page: bool,
    pub next_cursor: Option<u64>,
}

impl Page {
    /// Reads `values`, `isLastPage` and `nextPageStart`.
    ///
    /// A missing `isLastPage` counts as the last page, and a bare array is a complete,
    /// unpaginated collection.
    pub fn from_body(body: &Value) -> Self {
        match body {
            Value::Array(items) => Self {
                items: items.clone(),
                is_last_page: true,
                next_cursor: None,
            },
            Value::Object(map) => Self {
                items: map
                    .get("values")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
                is_last_page: map
                    .get("isLastPage")
                    .and_then(Value::as_bool)
                    .unwrap_or(true),
                next_cursor: map.get("nextPageStart").and_then(Value::as_u64),
            },
            _ => Self {
                items: Vec::new(),
                is_last_page: true,
                next_cursor: None,
            },
        }
    }
}

/// Drives a [`RequestExecutor`] over a paginated endpoint until the last page.
pub struct PaginatedLister<'a> {
    executor: &'a dyn RequestExecutor,
    page_size: u32,
}

impl<'a> PaginatedLister<'a> {
    pub fn new(executor: &'a dyn RequestExecutor, page_size: u32) -> Self {
        Self {
            executor,
            page_size: page_size.max(1),
        }
    }

    /// Every item of the collection at `url`, in server order, without de-duplication.
    ///
    /// `context` names the collection in error messages (`branches of repository FOO/bar`).
    pub fn list_all(
        &self,
        url: &Url,
        extra_query: &[(&str, &str)],
        context: &str,
    ) -> TaskResult<Vec<Item>> {
        let limit = self.page_size.to_string();
        let mut cursor: u64 = 0;
        let mut items = Vec::new();
        let mut pages = 0usize;

        loop {
            let start = cursor.to_string();
            let mut query = vec![("limit", limit.as_str()), ("start", start.as_str())];
            query.extend_from_slice(extra_query);
            let request = RequestSpec::get(url.clone()).with_query(&query);

            let response = self.executor.execute(&request)?;
            if response.status != 200 {
                return Err(TaskError::listing(
                    response.status,
                    context,
                    response.error_message(),
                ));
            }

            let Some(body) = response.json() else {
                return Err(TaskError::listing(
                    response.status,
                    context,
                    Some(format!(
                        "expected a JSON page, got {}",
                        response.text().map_or("an empty body", |_| "a non-JSON body")
                    )),
                ));
            };
            let page = Page::from_body(body);
            pages += 1;
            items.extend(page.items);

            if page.is_last_page {
                break;
            }
            match page.next_cursor {
                Some(next) if next > cursor => cursor = next,
                other => {
                    warn!(
                        "Stopping pagination of {}: nextPageStart {:?} does not advance past {}",
                        context, other, cursor
                    );
                    break;
                }
            }
        }

        debug!("Listed {} items of {} in {} page(s)", items.len(), context, pages);
        Ok(items)
    }
}
