//! Core library: the presentation model, the four edit actions and the
//! model-driven chat turn that ties them together.

pub mod actions;
pub mod client;
pub mod deck;
pub mod error;
pub mod resolver;
pub mod store;
pub mod xml;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use actions::{Action, ActionContext, Outcome};
pub use client::{ModelClient, OpenAiAdapter, StubClient};
pub use deck::Deck;
pub use error::{ActionError, DeckError, SlideError};
pub use store::{DeckStore, StoreGuard};
