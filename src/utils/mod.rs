pub mod json_merge;
pub mod username_filter;
