use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    #[default]
    Slide,
    Fade,
    Zoom,
    Convex,
    Concave,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Slide => "slide",
            Transition::Fade => "fade",
            Transition::Zoom => "zoom",
            Transition::Convex => "convex",
            Transition::Concave => "concave",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundSize {
    #[default]
    Contain,
    Cover,
}

impl BackgroundSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundSize::Contain => "contain",
            BackgroundSize::Cover => "cover",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    /// Relative to the deck root, `/`-separated. `None` on the title slide.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    pub transition: Transition,
    pub background_size: BackgroundSize,
    pub background_color: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_secs: Option<f64>,
}

impl Slide {
    pub fn is_title(&self) -> bool {
        self.background_image.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub title: String,
    pub theme: String,
    pub slides: Vec<Slide>,
}

impl Deck {
    /// Slides backed by a frame image.
    pub fn content_slides(&self) -> impl Iterator<Item = &Slide> {
        self.slides.iter().filter(|s| !s.is_title())
    }

    pub fn sections(&self) -> Vec<&str> {
        let mut sections: Vec<&str> = Vec::new();
        for name in self.slides.iter().filter_map(|s| s.section.as_deref()) {
            if sections.last() != Some(&name) {
                sections.push(name);
            }
        }
        sections
    }
}

/// 幻灯片生成选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckOptions {
    pub title: String,
    pub theme: String,
    pub transition: Transition,
    pub background_size: BackgroundSize,
    pub background_color: String,
    /// Directory image paths are made relative to; the frames root if unset.
    pub deck_root: Option<PathBuf>,
}

impl Default for DeckOptions {
    fn default() -> Self {
        Self {
            title: "Presentation".to_string(),
            theme: "white".to_string(),
            transition: Transition::Slide,
            background_size: BackgroundSize::Contain,
            background_color: "black".to_string(),
            deck_root: None,
        }
    }
}

impl DeckOptions {
    pub fn new(title: impl Into<String>, theme: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            theme: theme.into(),
            ..Default::default()
        }
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transition = transition;
        self
    }

    pub fn with_deck_root(mut self, deck_root: impl Into<PathBuf>) -> Self {
        self.deck_root = Some(deck_root.into());
        self
    }
}
