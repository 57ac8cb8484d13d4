pub mod aggregation;
pub mod pagination;
