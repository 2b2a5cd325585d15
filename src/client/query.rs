/// Pagination, sorting and filter criteria for list requests, rendered to
/// query pairs the way the backend expects them: `page`/`size` as numbers,
/// one `sort` pair per criterion (`"id,desc"`), anything else a filter.
#[derive(Clone, Default, Debug)]
pub struct QueryParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Vec<String>,
    pub filters: Vec<(String, String)>,
}

impl QueryParams {
    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn sort(mut self, criterion: impl Into<String>) -> Self {
        self.sort.push(criterion.into());
        self
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub(crate) fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self.filters.clone();
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        if let Some(size) = self.size {
            pairs.push(("size".to_string(), size.to_string()));
        }
        for criterion in &self.sort {
            pairs.push(("sort".to_string(), criterion.clone()));
        }
        pairs
    }
}

/// Same shape as QueryParams plus the search term, for the `_search`
/// endpoints.
#[derive(Clone, Default, Debug)]
pub struct SearchParams {
    pub query: String,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Vec<String>,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn sort(mut self, criterion: impl Into<String>) -> Self {
        self.sort.push(criterion.into());
        self
    }

    pub(crate) fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("query".to_string(), self.query.clone())];
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        if let Some(size) = self.size {
            pairs.push(("size".to_string(), size.to_string()));
        }
        for criterion in &self.sort {
            pairs.push(("sort".to_string(), criterion.clone()));
        }
        pairs
    }
}

/// One page of a list response, with the backend's X-Total-Count when it
/// sent one.
#[derive(Clone, Debug)]
pub struct Page<E> {
    pub items: Vec<E>,
    pub total_count: Option<u64>,
}
