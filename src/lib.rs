//! Cross-crate scenario tests for the deckhand workspace live in `tests/`.
