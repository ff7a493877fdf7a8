pub mod deck;
pub mod video;
