pub mod slides;
pub mod video;
