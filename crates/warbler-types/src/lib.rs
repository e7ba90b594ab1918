pub mod api;
pub mod envelope;
pub mod models;
pub mod session;

/// Most image URLs a single tweet may carry.
pub const MAX_TWEET_IMAGES: usize = 4;
