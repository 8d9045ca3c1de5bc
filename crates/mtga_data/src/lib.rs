#![forbid(unsafe_code)]
//! Collaborators that give dispatched events meaning: a card database and a
//! deck tracker.

mod cards;
mod decks;

pub use cards::{Card, CardDatabase, CardDbError, CardLookup};
pub use decks::{parse_deck, Deck, DeckError, DeckTracker, Pool, PoolCard, DECK_LISTS, DECK_SUBMIT};
