pub mod counts;

pub use counts::normalize_count;
