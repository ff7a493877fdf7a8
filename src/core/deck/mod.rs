//! 幻灯片生成
//!
//! 扫描帧输出目录（每个视频一个子目录），按目录名、文件名排序，
//! 生成 reveal.js markdown 或 JSON 描述。

pub mod assembler;
pub mod error;
pub mod model;
pub mod render;

pub use assembler::{assemble, parse_frame_name, relative_path, DeckAssembler};
pub use error::DeckError;
pub use model::{BackgroundSize, Deck, DeckOptions, Slide, Transition};
pub use render::{render_json, render_markdown, write_deck, SLIDE_SEPARATOR};
