//! Request types shared by list endpoints

/// Largest page size a client may ask for
pub const MAX_PAGE_SIZE: u32 = 100;

/// Pagination query parameters (`?page=&size=`)
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct PageQuery {
    /// Page number (1-based, default: 1)
    #[serde(default = "default_page")]
    pub page: u32,

    /// Items per page (default: 10, max: 100)
    #[serde(default = "default_size")]
    pub size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_size() -> u32 {
    10
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            size: default_size(),
        }
    }
}

impl PageQuery {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }.clamped()
    }

    /// Page clamped to >= 1, size clamped to 1..=100
    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            size: self.size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Rows to skip for this page
    pub fn offset(&self) -> i64 {
        let q = self.clamped();
        (q.page as i64 - 1) * q.size as i64
    }

    /// Rows to take for this page
    pub fn limit(&self) -> i64 {
        self.clamped().size as i64
    }
}
