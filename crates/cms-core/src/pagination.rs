use serde::Serialize;

/// 列表查询的默认页大小
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// 列表查询的最大页大小
pub const MAX_PAGE_SIZE: u64 = 200;

/// 分页结果
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}
