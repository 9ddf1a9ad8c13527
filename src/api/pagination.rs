use serde::{Deserialize, Serialize};

use super::error::ApiError;

/// The `?page=N` query parameter, 1-based.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    /// Missing means page 1; anything that is not a positive integer is an
    /// invalid page rather than a malformed request.
    pub fn page(&self) -> Result<u64, ApiError> {
        match &self.page {
            None => Ok(1),
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|page| *page >= 1)
                .ok_or(ApiError::InvalidPage),
        }
    }
}

/// Page envelope for list responses.
#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub count: u64,
    pub next: Option<u64>,
    pub previous: Option<u64>,
    pub results: Vec<T>,
}

impl<T: Serialize> Page<T> {
    /// Assemble the envelope, rejecting pages past the end. An empty result
    /// set still has one valid (empty) first page.
    pub fn build(results: Vec<T>, count: u64, page: u64, per_page: u64) -> Result<Self, ApiError> {
        let pages = count.div_ceil(per_page.max(1)).max(1);
        if page > pages {
            return Err(ApiError::InvalidPage);
        }

        Ok(Self {
            count,
            next: (page < pages).then(|| page + 1),
            previous: (page > 1).then(|| page - 1),
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_parsing() {
        assert_eq!(PageQuery { page: None }.page().unwrap(), 1);
        assert_eq!(
            PageQuery {
                page: Some("3".to_string())
            }
            .page()
            .unwrap(),
            3
        );
        assert!(PageQuery {
            page: Some("0".to_string())
        }
        .page()
        .is_err());
        assert!(PageQuery {
            page: Some("abc".to_string())
        }
        .page()
        .is_err());
    }

    #[test]
    fn test_page_envelope_links() {
        let page = Page::build(vec![1, 2], 25, 2, 10).unwrap();
        assert_eq!(page.count, 25);
        assert_eq!(page.next, Some(3));
        assert_eq!(page.previous, Some(1));

        let last = Page::build(vec![1], 25, 3, 10).unwrap();
        assert_eq!(last.next, None);

        assert!(Page::build(Vec::<i32>::new(), 25, 4, 10).is_err());
    }

    #[test]
    fn test_empty_first_page_is_valid() {
        let page = Page::build(Vec::<i32>::new(), 0, 1, 10).unwrap();
        assert_eq!(page.count, 0);
        assert_eq!(page.next, None);
        assert_eq!(page.previous, None);

        assert!(Page::build(Vec::<i32>::new(), 0, 2, 10).is_err());
    }
}
