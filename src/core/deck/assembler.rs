//! 幻灯片组装 - 扫描帧目录生成有序的幻灯片描述
//!
//! The frames directory is the source of truth. Every call rescans it into an
//! ordered map (sections by directory name, frames by file name, both compared
//! byte-wise) so that assembling an unchanged tree always yields the same deck.

use super::error::DeckError;
use super::model::{Deck, DeckOptions, Slide};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Section name for images stored directly in the frames root.
pub const ROOT_SECTION: &str = "All Videos";

pub const PLACEHOLDER_BODY: &str = "<!-- Add your slide content here -->";

static FRAME_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^frame_(\d+)_t(\d+(?:\.\d+)?)s\.[A-Za-z0-9]+$").expect("valid frame name pattern")
});

/// Sequence number and timestamp encoded in a frame file name.
pub fn parse_frame_name(file_name: &str) -> Option<(u32, f64)> {
    let caps = FRAME_NAME.captures(file_name)?;
    let sequence = caps.get(1)?.as_str().parse().ok()?;
    let timestamp = caps.get(2)?.as_str().parse().ok()?;
    Some((sequence, timestamp))
}

type Sections = BTreeMap<String, BTreeMap<String, PathBuf>>;

pub struct DeckAssembler {
    options: DeckOptions,
}

impl DeckAssembler {
    pub fn new(options: DeckOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DeckOptions {
        &self.options
    }

    /// Builds the deck for `frames_root`: a title slide, then one slide per
    /// frame image. A missing or empty root yields the title slide alone.
    pub fn assemble(&self, frames_root: &Path) -> Result<Deck, DeckError> {
        let sections = scan_sections(frames_root)?;
        let deck_root = self
            .options
            .deck_root
            .clone()
            .unwrap_or_else(|| frames_root.to_path_buf());

        let mut slides = vec![self.title_slide()];
        for (section, frames) in &sections {
            debug!("section '{}': {} frames", section, frames.len());
            for (file_name, path) in frames {
                slides.push(self.frame_slide(section, file_name, &relative_path(&deck_root, path)));
            }
        }

        info!(
            "✅ assembled deck '{}': {} sections, {} slides",
            self.options.title,
            sections.len(),
            slides.len() - 1
        );
        Ok(Deck {
            title: self.options.title.clone(),
            theme: self.options.theme.clone(),
            slides,
        })
    }

    fn title_slide(&self) -> Slide {
        Slide {
            background_image: None,
            transition: self.options.transition,
            background_size: self.options.background_size,
            background_color: self.options.background_color.clone(),
            body: format!("# {}", self.options.title),
            section: None,
            sequence: None,
            timestamp_secs: None,
        }
    }

    fn frame_slide(&self, section: &str, file_name: &str, image_path: &str) -> Slide {
        let parsed = parse_frame_name(file_name);
        Slide {
            background_image: Some(image_path.to_string()),
            transition: self.options.transition,
            background_size: self.options.background_size,
            background_color: self.options.background_color.clone(),
            body: PLACEHOLDER_BODY.to_string(),
            section: Some(section.to_string()),
            sequence: parsed.map(|(seq, _)| seq),
            timestamp_secs: parsed.map(|(_, ts)| ts),
        }
    }
}

/// Shorthand for [`DeckAssembler::assemble`] with default display options.
pub fn assemble(frames_root: &Path, title: &str, theme: &str) -> Result<Deck, DeckError> {
    DeckAssembler::new(DeckOptions::new(title, theme)).assemble(frames_root)
}

fn scan_sections(frames_root: &Path) -> Result<Sections, DeckError> {
    let mut sections = Sections::new();
    if !frames_root.is_dir() {
        warn!("frames directory not found: {}", frames_root.display());
        return Ok(sections);
    }

    let mut root_images = BTreeMap::new();
    let mut has_subdirs = false;
    for (name, path) in list_dir(frames_root)? {
        if path.is_dir() {
            has_subdirs = true;
            let images = list_images(&path)?;
            if !images.is_empty() {
                sections.insert(name, images);
            }
        } else if is_image(&path) {
            root_images.insert(name, path);
        }
    }

    if !has_subdirs && !root_images.is_empty() {
        sections.insert(ROOT_SECTION.to_string(), root_images);
    }
    Ok(sections)
}

fn list_images(dir: &Path) -> Result<BTreeMap<String, PathBuf>, DeckError> {
    Ok(list_dir(dir)?
        .into_iter()
        .filter(|(_, path)| path.is_file() && is_image(path))
        .collect())
}

/// Visible entries of `dir`, hidden files and temporaries excluded.
fn list_dir(dir: &Path) -> Result<Vec<(String, PathBuf)>, DeckError> {
    let entries = std::fs::read_dir(dir).map_err(|e| DeckError::io(dir, e))?;
    let mut listed = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DeckError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        listed.push((name, entry.path()));
    }
    Ok(listed)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|ext| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Lexical relative path from directory `base` to `target`, `/`-separated.
pub fn relative_path(base: &Path, target: &Path) -> String {
    let base = absolute(base);
    let target = absolute(target);

    let base_parts: Vec<Component> = base.components().collect();
    let target_parts: Vec<Component> = target.components().collect();
    let common = base_parts
        .iter()
        .zip(target_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..base_parts.len() {
        parts.push("..".to_string());
    }
    for part in &target_parts[common..] {
        parts.push(part.as_os_str().to_string_lossy().into_owned());
    }
    parts.join("/")
}

fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::deck::model::Transition;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn image_paths(deck: &Deck) -> Vec<&str> {
        deck.content_slides()
            .filter_map(|s| s.background_image.as_deref())
            .collect()
    }

    #[test]
    fn test_parse_frame_name() {
        assert_eq!(parse_frame_name("frame_0003_t12.50s.jpg"), Some((3, 12.5)));
        assert_eq!(parse_frame_name("frame_0000_t0.00s.png"), Some((0, 0.0)));
        assert_eq!(parse_frame_name("cover.jpg"), None);
    }

    #[test]
    fn test_missing_root_gives_title_only() {
        let deck = assemble(Path::new("/no/such/frames"), "Talk", "black").unwrap();
        assert_eq!(deck.slides.len(), 1);
        assert!(deck.slides[0].is_title());
        assert_eq!(deck.slides[0].body, "# Talk");
        assert_eq!(deck.theme, "black");
    }

    #[test]
    fn test_empty_root_gives_title_only() {
        let dir = tempfile::tempdir().unwrap();
        let deck = assemble(dir.path(), "Presentation", "white").unwrap();
        assert_eq!(deck.slides.len(), 1);
    }

    #[test]
    fn test_section_and_frame_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b_part/frame_0001_t5.00s.jpg"));
        touch(&root.join("b_part/frame_0000_t0.00s.jpg"));
        touch(&root.join("a_intro/frame_0010_t50.00s.jpg"));
        touch(&root.join("a_intro/frame_0002_t10.00s.jpg"));
        touch(&root.join("a_intro/notes.txt"));
        touch(&root.join("a_intro/.frame_0003_t12.00s.jpg.tmp"));
        touch(&root.join("B_upper/frame_0000_t0.00s.PNG"));

        let deck = assemble(root, "Talk", "white").unwrap();
        assert_eq!(
            image_paths(&deck),
            vec![
                "B_upper/frame_0000_t0.00s.PNG",
                "a_intro/frame_0002_t10.00s.jpg",
                "a_intro/frame_0010_t50.00s.jpg",
                "b_part/frame_0000_t0.00s.jpg",
                "b_part/frame_0001_t5.00s.jpg",
            ]
        );
        assert_eq!(deck.sections(), vec!["B_upper", "a_intro", "b_part"]);

        let second = &deck.slides[2];
        assert_eq!(second.sequence, Some(2));
        assert_eq!(second.timestamp_secs, Some(10.0));
        assert_eq!(second.background_color, "black");
        assert_eq!(second.transition, Transition::Slide);
    }

    #[test]
    fn test_assemble_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["x/frame_0000_t0.00s.jpg", "x/frame_0001_t3.00s.jpg", "y/frame_0000_t1.00s.jpg"] {
            touch(&dir.path().join(name));
        }
        let first = assemble(dir.path(), "Talk", "white").unwrap();
        let second = assemble(dir.path(), "Talk", "white").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_root_level_images() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("frame_0001_t1.00s.jpg"));
        touch(&dir.path().join("frame_0000_t0.00s.jpg"));

        let deck = assemble(dir.path(), "Talk", "white").unwrap();
        assert_eq!(deck.sections(), vec![ROOT_SECTION]);
        assert_eq!(
            image_paths(&deck),
            vec!["frame_0000_t0.00s.jpg", "frame_0001_t1.00s.jpg"]
        );
    }

    #[test]
    fn test_deck_root_and_transition_override() {
        let dir = tempfile::tempdir().unwrap();
        let frames = dir.path().join("frames");
        touch(&frames.join("clip/frame_0000_t0.00s.jpg"));

        let options = DeckOptions::new("Talk", "white")
            .with_transition(Transition::Fade)
            .with_deck_root(dir.path().join("slides"));
        let deck = DeckAssembler::new(options).assemble(&frames).unwrap();

        assert_eq!(image_paths(&deck), vec!["../frames/clip/frame_0000_t0.00s.jpg"]);
        assert!(deck.slides.iter().all(|s| s.transition == Transition::Fade));
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/a/b"), Path::new("/a/b/c/d.jpg")),
            "c/d.jpg"
        );
        assert_eq!(
            relative_path(Path::new("/a/b/"), Path::new("/a/x/./d.jpg")),
            "../x/d.jpg"
        );
    }
}
