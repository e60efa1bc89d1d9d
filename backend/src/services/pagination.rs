use crate::error::ApiError;
use futures::TryStreamExt;
use mongodb::bson::{doc, from_document, Bson, Document};
use mongodb::Collection;
use serde::de::DeserializeOwned;

pub const MAX_LIMIT: u32 = 100;

/// A page/limit window over an aggregated stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u32,
    pub limit: u32,
}

impl PageParams {
    /// Missing values fall back to page 1 and the endpoint's default size;
    /// out-of-range values are clamped rather than rejected.
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_LIMIT),
        }
    }

    pub fn skip(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

#[derive(Debug)]
pub struct Page<T> {
    pub total: u64,
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            (self.total + self.limit as u64 - 1) / self.limit as u64
        }
    }
}

/// The `$facet` stage appended to every paged pipeline: one branch counts
/// the full match, the other cuts the requested window.
pub fn facet_stage(params: &PageParams) -> Document {
    doc! {
        "$facet": {
            "metadata": [ { "$count": "total" } ],
            "items": [
                { "$skip": params.skip() as i64 },
                { "$limit": params.limit as i64 },
            ],
        }
    }
}

/// Run `pipeline` against `collection` with a pagination facet appended.
/// An empty match produces an empty page, not an error.
pub async fn run_paged<T: DeserializeOwned>(
    collection: &Collection<Document>,
    mut pipeline: Vec<Document>,
    params: &PageParams,
) -> Result<Page<T>, ApiError> {
    pipeline.push(facet_stage(params));

    let mut cursor = collection.aggregate(pipeline, None).await?;
    let facet = cursor.try_next().await?.unwrap_or_default();

    let total = facet
        .get_array("metadata")
        .ok()
        .and_then(|metadata| metadata.first())
        .and_then(Bson::as_document)
        .and_then(|counts| counts.get("total"))
        .and_then(bson_count)
        .unwrap_or(0);

    let mut items = Vec::new();
    if let Ok(raw_items) = facet.get_array("items") {
        for value in raw_items {
            if let Bson::Document(item) = value {
                items.push(from_document::<T>(item.clone())?);
            }
        }
    }

    Ok(Page {
        total,
        items,
        page: params.page,
        limit: params.limit,
    })
}

/// `$count` emits Int32 for small sets and Int64 past i32::MAX.
fn bson_count(value: &Bson) -> Option<u64> {
    match value {
        Bson::Int32(n) => u64::try_from(*n).ok(),
        Bson::Int64(n) => u64::try_from(*n).ok(),
        Bson::Double(n) if *n >= 0.0 => Some(*n as u64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_default_and_clamp() {
        let params = PageParams::new(None, None, 10);
        assert_eq!(params, PageParams { page: 1, limit: 10 });

        let params = PageParams::new(Some(0), Some(0), 10);
        assert_eq!(params, PageParams { page: 1, limit: 1 });

        let params = PageParams::new(Some(3), Some(100_000), 10);
        assert_eq!(
            params,
            PageParams {
                page: 3,
                limit: MAX_LIMIT
            }
        );
    }

    #[test]
    fn skip_is_zero_based_window_start() {
        assert_eq!(PageParams { page: 1, limit: 5 }.skip(), 0);
        assert_eq!(PageParams { page: 4, limit: 5 }.skip(), 15);
    }

    #[test]
    fn facet_stage_windows_the_stream() {
        let stage = facet_stage(&PageParams { page: 2, limit: 10 });
        let facet = stage.get_document("$facet").unwrap();
        let items = facet.get_array("items").unwrap();
        assert_eq!(
            items[0].as_document().unwrap().get_i64("$skip").unwrap(),
            10
        );
        assert_eq!(
            items[1].as_document().unwrap().get_i64("$limit").unwrap(),
            10
        );
        let metadata = facet.get_array("metadata").unwrap();
        assert!(metadata[0].as_document().unwrap().contains_key("$count"));
    }

    #[test]
    fn total_pages_rounds_up() {
        let page: Page<()> = Page {
            total: 0,
            items: vec![],
            page: 1,
            limit: 10,
        };
        assert_eq!(page.total_pages(), 0);

        let page: Page<()> = Page {
            total: 11,
            items: vec![],
            page: 1,
            limit: 10,
        };
        assert_eq!(page.total_pages(), 2);
    }

    #[test]
    fn count_reads_int32_and_int64() {
        assert_eq!(bson_count(&Bson::Int32(7)), Some(7));
        assert_eq!(bson_count(&Bson::Int64(7_000_000_000)), Some(7_000_000_000));
        assert_eq!(bson_count(&Bson::Int32(-1)), None);
        assert_eq!(bson_count(&Bson::String("7".into())), None);
    }
}
