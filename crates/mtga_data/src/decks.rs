//! Deck lists reported by the client.

use std::collections::{BTreeMap, HashMap};

use mtga_events::{DispatchedEvent, EventHandler, HandlerError};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::cards::{Card, CardDbError, CardLookup};

/// Response carrying the deck the player submitted to join an event.
pub const DECK_SUBMIT: &str = "Event.DeckSubmit";
/// Response carrying every constructed deck the player owns.
pub const DECK_LISTS: &str = "Deck.GetDeckLists";

#[derive(Debug, Error)]
pub enum DeckError {
    #[error("missing or malformed `{0}` field")]
    MissingField(&'static str),
    #[error("deck `{deck}` has a card entry without a usable `{field}`")]
    InvalidCardEntry { deck: String, field: &'static str },
    #[error("deck `{deck}` references a card that could not be resolved: {source}")]
    Lookup {
        deck: String,
        #[source]
        source: CardDbError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolCard {
    pub mtga_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_seat_id: Option<u32>,
    /// Filled in once the card has been resolved against a [`CardLookup`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Card>,
}

impl PoolCard {
    pub fn new(mtga_id: u32) -> Self {
        Self {
            mtga_id,
            owner_seat_id: None,
            details: None,
        }
    }
}

/// A named collection of cards; one entry per copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pool {
    pub name: String,
    pub cards: Vec<PoolCard>,
}

impl Pool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cards: Vec::new(),
        }
    }

    pub fn total_count(&self) -> usize {
        self.cards.len()
    }

    pub fn count(&self, mtga_id: u32) -> usize {
        self.cards
            .iter()
            .filter(|card| card.mtga_id == mtga_id)
            .count()
    }

    pub fn count_owned_by(&self, seat: u32) -> usize {
        self.cards
            .iter()
            .filter(|card| card.owner_seat_id == Some(seat))
            .count()
    }

    /// Number of copies per card id.
    pub fn group_cards(&self) -> BTreeMap<u32, usize> {
        let mut grouped = BTreeMap::new();
        for card in &self.cards {
            *grouped.entry(card.mtga_id).or_insert(0) += 1;
        }
        grouped
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deck {
    pub deck_id: String,
    pub pool: Pool,
}

impl Deck {
    pub fn new(name: impl Into<String>, deck_id: impl Into<String>) -> Self {
        Self {
            deck_id: deck_id.into(),
            pool: Pool::new(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.pool.name
    }

    /// Attaches card details to every entry. Each distinct id is looked up once.
    pub fn resolve(&mut self, cards: &dyn CardLookup) -> Result<(), DeckError> {
        let mut resolved: HashMap<u32, Card> = HashMap::new();
        for entry in &mut self.pool.cards {
            let card = match resolved.get(&entry.mtga_id) {
                Some(card) => card.clone(),
                None => {
                    let card =
                        cards
                            .lookup_card(entry.mtga_id)
                            .map_err(|source| DeckError::Lookup {
                                deck: self.pool.name.clone(),
                                source,
                            })?;
                    resolved.insert(entry.mtga_id, card.clone());
                    card
                }
            };
            entry.details = Some(card);
        }
        Ok(())
    }
}

/// Builds a deck from the client's JSON representation.
///
/// Card entries come as `{"id": 67015, "quantity": 4}`; JSON-RPC payloads
/// capitalise the keys (`Id`, `Quantity`). Ids may be numbers or strings.
pub fn parse_deck(value: &Value) -> Result<Deck, DeckError> {
    let deck_id = value
        .get("id")
        .and_then(Value::as_str)
        .ok_or(DeckError::MissingField("id"))?;
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .ok_or(DeckError::MissingField("name"))?;
    let entries = value
        .get("mainDeck")
        .and_then(Value::as_array)
        .ok_or(DeckError::MissingField("mainDeck"))?;

    let mut deck = Deck::new(name, deck_id);
    for entry in entries {
        let invalid = |field| DeckError::InvalidCardEntry {
            deck: name.to_string(),
            field,
        };
        let mtga_id = field(entry, "id", "Id")
            .and_then(card_id)
            .ok_or_else(|| invalid("id"))?;
        let quantity = field(entry, "quantity", "Quantity")
            .and_then(Value::as_u64)
            .and_then(|quantity| usize::try_from(quantity).ok())
            .ok_or_else(|| invalid("quantity"))?;
        deck.pool
            .cards
            .extend(std::iter::repeat_with(|| PoolCard::new(mtga_id)).take(quantity));
    }
    Ok(deck)
}

fn field<'a>(entry: &'a Value, lower: &str, upper: &str) -> Option<&'a Value> {
    entry.get(lower).or_else(|| entry.get(upper))
}

fn card_id(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|id| u32::try_from(id).ok()),
        Value::String(raw) => raw.parse().ok(),
        _ => None,
    }
}

/// Keeps track of the player's decks as the client reports them.
#[derive(Default)]
pub struct DeckTracker {
    cards: Option<Box<dyn CardLookup>>,
    decks: BTreeMap<String, Deck>,
    intended: Option<Deck>,
}

impl DeckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cards(mut self, cards: impl CardLookup + 'static) -> Self {
        self.cards = Some(Box::new(cards));
        self
    }

    /// Decks from the most recent deck list, by deck id.
    pub fn decks(&self) -> &BTreeMap<String, Deck> {
        &self.decks
    }

    /// The deck last submitted to join an event.
    pub fn intended_deck(&self) -> Option<&Deck> {
        self.intended.as_ref()
    }

    fn build(&self, value: &Value) -> Result<Deck, DeckError> {
        let mut deck = parse_deck(value)?;
        if let Some(cards) = self.cards.as_deref() {
            deck.resolve(cards)?;
        }
        Ok(deck)
    }

    fn on_deck_submit(&mut self, event: &DispatchedEvent) -> Result<(), DeckError> {
        let course_deck = event
            .document
            .get("CourseDeck")
            .ok_or(DeckError::MissingField("CourseDeck"))?;
        let deck = self.build(course_deck)?;
        info!(
            deck = deck.name(),
            cards = deck.pool.total_count(),
            "deck submitted"
        );
        self.intended = Some(deck);
        Ok(())
    }

    fn on_deck_lists(&mut self, event: &DispatchedEvent) -> Result<(), DeckError> {
        let lists = event
            .document
            .get(DECK_LISTS)
            .and_then(Value::as_array)
            .ok_or(DeckError::MissingField(DECK_LISTS))?;
        let mut decks = BTreeMap::new();
        for value in lists {
            let deck = self.build(value)?;
            decks.insert(deck.deck_id.clone(), deck);
        }
        info!(decks = decks.len(), "deck lists updated");
        self.decks = decks;
        Ok(())
    }
}

impl EventHandler for DeckTracker {
    fn name(&self) -> &'static str {
        "deck-tracker"
    }

    fn handle(&mut self, event: &DispatchedEvent) -> Result<(), HandlerError> {
        if event.is_request {
            trace!(title = %event.title, "ignoring request");
            return Ok(());
        }
        let result = match event.title.as_str() {
            DECK_SUBMIT => self.on_deck_submit(event),
            DECK_LISTS => self.on_deck_lists(event),
            _ => return Ok(()),
        };
        result.map_err(|err| {
            debug!(title = %event.title, error = %err, "deck update failed");
            HandlerError::new(self.name(), &event.title, err)
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::OffsetDateTime;

    use super::*;

    struct FakeCards;

    impl CardLookup for FakeCards {
        fn lookup_card(&self, mtga_id: u32) -> Result<Card, CardDbError> {
            match mtga_id {
                67015 => Ok(Card {
                    mtga_id,
                    name: "Llanowar Elves".to_string(),
                    rarity: "Common".to_string(),
                }),
                67017 => Ok(Card {
                    mtga_id,
                    name: "Forest".to_string(),
                    rarity: "Common".to_string(),
                }),
                _ => Err(CardDbError::UnknownCard(mtga_id)),
            }
        }
    }

    fn response(title: &str, document: Value) -> DispatchedEvent {
        DispatchedEvent {
            timestamp: OffsetDateTime::UNIX_EPOCH,
            sequence_number: Some(1),
            title: title.to_string(),
            is_request: false,
            document,
        }
    }

    fn elves_deck() -> Value {
        json!({
            "id": "c4d5e085-65c4-4873-9aaf-d9d081bde8e4",
            "name": "Mono Green",
            "mainDeck": [
                {"id": 67015, "quantity": 4},
                {"id": "67017", "quantity": 2}
            ]
        })
    }

    #[test]
    fn parse_deck_expands_quantities() {
        let deck = parse_deck(&elves_deck()).unwrap();

        assert_eq!(deck.deck_id, "c4d5e085-65c4-4873-9aaf-d9d081bde8e4");
        assert_eq!(deck.name(), "Mono Green");
        assert_eq!(deck.pool.total_count(), 6);
        assert_eq!(deck.pool.count(67015), 4);
        assert_eq!(deck.pool.count(67017), 2);
        assert_eq!(deck.pool.count(1), 0);
        assert_eq!(
            deck.pool.group_cards(),
            BTreeMap::from([(67015, 4), (67017, 2)])
        );
    }

    #[test]
    fn parse_deck_accepts_capitalised_rpc_keys() {
        let deck = parse_deck(&json!({
            "id": "d",
            "name": "Challenge",
            "mainDeck": [{"Id": 67015, "Quantity": 3}]
        }))
        .unwrap();

        assert_eq!(deck.pool.count(67015), 3);
    }

    #[test]
    fn parse_deck_reports_the_missing_piece() {
        assert!(matches!(
            parse_deck(&json!({"name": "x", "mainDeck": []})),
            Err(DeckError::MissingField("id"))
        ));
        assert!(matches!(
            parse_deck(&json!({"id": "d", "name": "x"})),
            Err(DeckError::MissingField("mainDeck"))
        ));
        assert!(matches!(
            parse_deck(&json!({"id": "d", "name": "x", "mainDeck": [{"id": 1}]})),
            Err(DeckError::InvalidCardEntry {
                field: "quantity",
                ..
            })
        ));
        assert!(matches!(
            parse_deck(&json!({"id": "d", "name": "x", "mainDeck": [{"id": "abc", "quantity": 1}]})),
            Err(DeckError::InvalidCardEntry { field: "id", .. })
        ));
    }

    #[test]
    fn seat_ownership_is_counted() {
        let mut pool = Pool::new("battlefield");
        pool.cards.push(PoolCard {
            owner_seat_id: Some(1),
            ..PoolCard::new(67015)
        });
        pool.cards.push(PoolCard {
            owner_seat_id: Some(2),
            ..PoolCard::new(67015)
        });
        pool.cards.push(PoolCard::new(67017));

        assert_eq!(pool.count_owned_by(1), 1);
        assert_eq!(pool.count_owned_by(2), 1);
        assert_eq!(pool.count_owned_by(3), 0);
    }

    #[test]
    fn deck_submit_records_the_intended_deck() {
        let mut tracker = DeckTracker::new().with_cards(FakeCards);

        tracker
            .handle(&response(DECK_SUBMIT, json!({"CourseDeck": elves_deck()})))
            .unwrap();

        let deck = tracker.intended_deck().unwrap();
        assert_eq!(deck.name(), "Mono Green");
        let details = deck.pool.cards[0].details.as_ref().unwrap();
        assert_eq!(details.name, "Llanowar Elves");
        assert!(deck.pool.cards.iter().all(|card| card.details.is_some()));
    }

    #[test]
    fn deck_lists_replace_known_decks() {
        let mut tracker = DeckTracker::new();
        let second = json!({"id": "second", "name": "Other", "mainDeck": []});

        tracker
            .handle(&response(
                DECK_LISTS,
                json!({ DECK_LISTS: [elves_deck(), second.clone()] }),
            ))
            .unwrap();
        assert_eq!(tracker.decks().len(), 2);
        assert!(tracker.decks()["second"].pool.cards.is_empty());
        assert!(tracker.decks()["c4d5e085-65c4-4873-9aaf-d9d081bde8e4"].pool.cards[0]
            .details
            .is_none());

        tracker
            .handle(&response(DECK_LISTS, json!({ DECK_LISTS: [second] })))
            .unwrap();
        assert_eq!(tracker.decks().keys().collect::<Vec<_>>(), ["second"]);
    }

    #[test]
    fn unknown_card_fails_the_event() {
        let mut tracker = DeckTracker::new().with_cards(FakeCards);
        let deck = json!({"id": "d", "name": "Bad", "mainDeck": [{"id": 5, "quantity": 1}]});

        let err = tracker
            .handle(&response(DECK_SUBMIT, json!({"CourseDeck": deck})))
            .unwrap_err();

        assert_eq!(err.handler, "deck-tracker");
        assert_eq!(err.title, DECK_SUBMIT);
        assert!(tracker.intended_deck().is_none());
        assert_eq!(
            err.to_string(),
            "deck-tracker could not handle `Event.DeckSubmit`: deck `Bad` references a card that could not be resolved: unknown card id 5"
        );
    }

    #[test]
    fn unrelated_events_and_requests_are_ignored() {
        let mut tracker = DeckTracker::new();
        let mut request = response(DECK_SUBMIT, json!({}));
        request.is_request = true;

        tracker.handle(&request).unwrap();
        tracker
            .handle(&response("Inventory.Get", json!({"gems": 5})))
            .unwrap();

        assert!(tracker.intended_deck().is_none());
        assert!(tracker.decks().is_empty());
    }
}
