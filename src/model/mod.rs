pub mod columns;
pub mod export;
pub mod query;
pub mod row;
pub mod row_cache;
