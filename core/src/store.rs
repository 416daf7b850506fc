//! The process-wide slot holding the deck being edited.
//!
//! There is exactly one slot, shared by every client: this is a
//! single-tenant, single-session service. Callers hold the guard for a whole
//! chat turn, so turns run one after another; two users still see and edit
//! the same deck.

use crate::deck::Deck;
use crate::error::SlideError;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Slot {
    deck: Option<Deck>,
    file_path: Option<PathBuf>,
}

#[derive(Debug)]
pub struct DeckStore {
    slot: Mutex<Slot>,
    output_dir: PathBuf,
}

impl DeckStore {
    /// Saved decks are written to fresh files under `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { slot: Mutex::new(Slot::default()), output_dir: output_dir.into() }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn lock(&self) -> StoreGuard<'_> {
        StoreGuard { slot: self.slot.lock().await, output_dir: &self.output_dir }
    }
}

/// Exclusive access to the slot until dropped.
pub struct StoreGuard<'a> {
    slot: MutexGuard<'a, Slot>,
    output_dir: &'a Path,
}

impl StoreGuard<'_> {
    pub fn deck(&self) -> Option<&Deck> {
        self.slot.deck.as_ref()
    }

    pub fn deck_mut(&mut self) -> Option<&mut Deck> {
        self.slot.deck.as_mut()
    }

    /// Path of the most recently saved copy.
    pub fn file_path(&self) -> Option<&Path> {
        self.slot.file_path.as_deref()
    }

    /// Replace the current deck and save it right away.
    pub async fn load(&mut self, deck: Deck) -> Result<PathBuf, SlideError> {
        self.slot.deck = Some(deck);
        self.save().await
    }

    /// Write the current deck to a new temp file and remember its path.
    /// Earlier files are left on disk.
    pub async fn save(&mut self) -> Result<PathBuf, SlideError> {
        let Some(deck) = self.slot.deck.as_ref() else {
            return Err(SlideError::NoPresentation);
        };
        let bytes = deck.to_bytes()?;
        let dir = self.output_dir.to_path_buf();

        let path = tokio::task::spawn_blocking(move || -> std::io::Result<PathBuf> {
            std::fs::create_dir_all(&dir)?;
            let mut file = tempfile::Builder::new()
                .prefix("slide-")
                .suffix(".pptx")
                .tempfile_in(&dir)?;
            std::io::Write::write_all(&mut file, &bytes)?;
            let (_, path) = file.keep().map_err(|e| e.error)?;
            Ok(path)
        })
        .await
        .map_err(std::io::Error::other)??;

        tracing::info!(path = %path.display(), "saved presentation");
        self.slot.file_path = Some(path.clone());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::DeckBuilder;

    fn deck(texts: &[&str]) -> Deck {
        Deck::from_bytes(&DeckBuilder::new().slide(texts).build()).unwrap()
    }

    #[tokio::test]
    async fn test_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = DeckStore::new(dir.path());
        let mut guard = store.lock().await;
        assert!(guard.deck().is_none());
        assert!(guard.file_path().is_none());
        assert!(matches!(guard.save().await, Err(SlideError::NoPresentation)));
    }

    #[tokio::test]
    async fn test_every_save_is_a_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DeckStore::new(dir.path().join("out"));
        let mut guard = store.lock().await;

        let first = guard.load(deck(&["Hello"])).await.unwrap();
        assert_eq!(guard.file_path(), Some(first.as_path()));
        let second = guard.save().await.unwrap();

        assert_ne!(first, second);
        assert!(first.exists());
        assert_eq!(guard.file_path(), Some(second.as_path()));
        assert!(second.file_name().unwrap().to_string_lossy().ends_with(".pptx"));

        let saved = Deck::from_bytes(&std::fs::read(&second).unwrap()).unwrap();
        assert_eq!(saved.summaries()[0].text, "Hello");
    }

    #[tokio::test]
    async fn test_load_replaces_deck() {
        let dir = tempfile::tempdir().unwrap();
        let store = DeckStore::new(dir.path());
        {
            let mut guard = store.lock().await;
            guard.load(deck(&["one"])).await.unwrap();
        }
        let mut guard = store.lock().await;
        guard.load(deck(&["two"])).await.unwrap();
        assert_eq!(guard.deck().unwrap().summaries()[0].text, "two");
    }
}
