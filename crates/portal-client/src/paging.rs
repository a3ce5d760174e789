//! Offset pagination over portal collections
//!
//! Collection responses carry `total` and `items` either at the top level
//! (`{"total": 3, "items": [...]}`) or under `data`
//! (`{"data": {"total": 3, "items": [...]}}`). [`Page::from_value`] accepts both.

use async_trait::async_trait;
use common::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// Largest page the portal serves
pub const MAX_BATCH_SIZE: u64 = 1000;

/// One page of a collection
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Server-reported size of the whole collection
    pub total: Option<u64>,
}

impl<T: DeserializeOwned> Page<T> {
    /// Decode a page from a response body
    pub fn from_value(body: Value) -> Result<Self> {
        let envelope = if body.get("items").is_some() {
            body
        } else if let Some(data) = body.get("data").filter(|d| d.get("items").is_some()) {
            data.clone()
        } else {
            return Err(Error::decode("response has no items array"));
        };

        let total = envelope
            .get("total")
            .and_then(Value::as_u64);

        let items = match envelope.get("items") {
            Some(Value::Array(items)) => items
                .iter()
                .cloned()
                .map(serde_json::from_value)
                .collect::<std::result::Result<Vec<T>, _>>()?,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(Error::decode(format!("items is not an array: {}", other)));
            }
        };

        Ok(Self { items, total })
    }
}

/// Something that can serve a page at an offset
#[async_trait]
pub trait PageSource<T: Send>: Send + Sync {
    /// Fetch `size` items starting at `offset`, sorted by id
    async fn fetch_page(&self, offset: u64, size: u64) -> Result<Page<T>>;
}

/// Fetch every item of a collection
///
/// Pages are requested one at a time with increasing offsets until the
/// accumulated count reaches the reported total. Any page failure aborts the
/// whole fetch; no partial result is returned.
///
/// If the server stops returning items before the total is reached (items
/// deleted mid-listing) the loop stops with what it has and logs a warning.
pub async fn fetch_all<T, S>(source: &S, batch_size: u64) -> Result<Vec<T>>
where
    T: Send,
    S: PageSource<T> + ?Sized,
{
    if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
        return Err(Error::invalid_input(format!(
            "batch size must be between 1 and {}, got {}",
            MAX_BATCH_SIZE, batch_size
        )));
    }

    let mut items: Vec<T> = Vec::new();
    let mut offset = 0u64;

    loop {
        let page = source.fetch_page(offset, batch_size).await?;
        let received = page.items.len();
        // Without a total the first page is the whole collection
        let total = page.total.unwrap_or(received as u64);
        items.extend(page.items);

        debug!(offset, received, total, accumulated = items.len(), "Fetched page");

        if items.len() as u64 >= total {
            break;
        }
        if received == 0 {
            warn!(
                accumulated = items.len(),
                total, "Empty page before reported total was reached, stopping"
            );
            break;
        }
        offset += batch_size;
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves `0..total` in pages and records requested offsets
    struct CountingSource {
        total: u64,
        nested: bool,
        fail_at_offset: Option<u64>,
        offsets: Mutex<Vec<u64>>,
    }

    impl CountingSource {
        fn new(total: u64) -> Self {
            Self {
                total,
                nested: false,
                fail_at_offset: None,
                offsets: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<u64> {
            self.offsets.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource<u64> for CountingSource {
        async fn fetch_page(&self, offset: u64, size: u64) -> Result<Page<u64>> {
            self.offsets.lock().unwrap().push(offset);
            if self.fail_at_offset == Some(offset) {
                return Err(Error::api(500, "boom"));
            }
            let end = (offset + size).min(self.total);
            let items: Vec<u64> = (offset..end).collect();
            let body = if self.nested {
                json!({"data": {"total": self.total, "items": items}})
            } else {
                json!({"total": self.total, "items": items})
            };
            Page::from_value(body)
        }
    }

    #[tokio::test]
    async fn test_issues_ceil_n_over_b_requests() {
        for (total, batch, expected_calls) in [(10u64, 3u64, 4usize), (9, 3, 3), (1, 1000, 1), (2500, 1000, 3)] {
            let source = CountingSource::new(total);
            let items = fetch_all(&source, batch).await.unwrap();

            assert_eq!(items.len() as u64, total);
            assert_eq!(items, (0..total).collect::<Vec<_>>());
            assert_eq!(source.calls().len(), expected_calls, "total={} batch={}", total, batch);
        }
    }

    #[tokio::test]
    async fn test_empty_collection_is_one_request() {
        let source = CountingSource::new(0);
        let items = fetch_all(&source, 50).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(source.calls(), vec![0]);
    }

    #[tokio::test]
    async fn test_nested_total_is_honoured() {
        let mut source = CountingSource::new(5);
        source.nested = true;
        let items = fetch_all(&source, 2).await.unwrap();
        assert_eq!(items, vec![0, 1, 2, 3, 4]);
        assert_eq!(source.calls(), vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn test_failure_mid_pagination_aborts() {
        let mut source = CountingSource::new(10);
        source.fail_at_offset = Some(4);
        let result = fetch_all(&source, 2).await;
        assert_matches!(result, Err(Error::Api { status: 500, .. }));
        assert_eq!(source.calls(), vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn test_invalid_batch_size() {
        let source = CountingSource::new(3);
        assert_matches!(fetch_all(&source, 0).await, Err(Error::InvalidInput(_)));
        assert_matches!(fetch_all(&source, 1001).await, Err(Error::InvalidInput(_)));
        assert!(source.calls().is_empty());
    }

    #[test]
    fn test_page_without_total_or_items() {
        let page: Page<u64> = Page::from_value(json!({"items": [1, 2]})).unwrap();
        assert_eq!(page.total, None);
        assert_eq!(page.items, vec![1, 2]);

        let err = Page::<u64>::from_value(json!({"errmsg": "nope"}));
        assert_matches!(err, Err(Error::Decode(_)));
    }
}
