//! 幻灯片生成器

use crate::core::deck::{write_deck, Deck, DeckAssembler, DeckError, DeckOptions};
use log::info;
use std::path::{Path, PathBuf};

/// Assembles the deck for `frames_dir` and writes it to `output_file`.
///
/// Image paths are made relative to the directory holding `output_file`, so
/// the manifest opens correctly from where it is written.
pub fn generate_slides(
    frames_dir: &Path,
    output_file: &Path,
    options: DeckOptions,
) -> Result<Deck, DeckError> {
    info!(
        "🎬 generating slides from {} -> {}",
        frames_dir.display(),
        output_file.display()
    );
    let deck_root = output_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let deck = DeckAssembler::new(options.with_deck_root(deck_root)).assemble(frames_dir)?;
    write_deck(&deck, output_file)?;
    Ok(deck)
}
