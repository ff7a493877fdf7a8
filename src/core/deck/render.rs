//! Deck 序列化 - reveal.js markdown / JSON
//!
//! Markdown layout: each slide is a one-line `<!-- .slide: ... -->` directive,
//! a blank line and the body; slides are separated by a `---` line.

use super::error::DeckError;
use super::model::{Deck, Slide};
use log::info;
use std::fs;
use std::path::Path;

pub const SLIDE_SEPARATOR: &str = "---";

pub fn slide_directive(slide: &Slide) -> String {
    let mut attrs = Vec::new();
    if let Some(image) = &slide.background_image {
        attrs.push(format!("data-background=\"{}\"", escape_attr(image)));
        attrs.push(format!(
            "data-background-size=\"{}\"",
            slide.background_size.as_str()
        ));
        attrs.push(format!(
            "data-background-color=\"{}\"",
            escape_attr(&slide.background_color)
        ));
    }
    attrs.push(format!("data-transition=\"{}\"", slide.transition.as_str()));
    format!("<!-- .slide: {} -->", attrs.join(" "))
}

pub fn render_markdown(deck: &Deck) -> String {
    let blocks: Vec<String> = deck
        .slides
        .iter()
        .map(|slide| {
            if slide.body.is_empty() {
                format!("{}\n", slide_directive(slide))
            } else {
                format!("{}\n\n{}\n", slide_directive(slide), slide.body)
            }
        })
        .collect();
    blocks.join(&format!("\n{}\n\n", SLIDE_SEPARATOR))
}

pub fn render_json(deck: &Deck) -> Result<String, DeckError> {
    Ok(serde_json::to_string_pretty(deck)?)
}

/// Writes the deck to `path`; `.json` gets the JSON manifest, anything else
/// the markdown one.
pub fn write_deck(deck: &Deck, path: &Path) -> Result<(), DeckError> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let content = if is_json {
        render_json(deck)?
    } else {
        render_markdown(deck)
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| DeckError::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| DeckError::io(path, e))?;

    info!(
        "Generated slides: {} ({} frame slides)",
        path.display(),
        deck.content_slides().count()
    );
    Ok(())
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
