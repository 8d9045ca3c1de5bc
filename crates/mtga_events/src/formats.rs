//! Block layouts the client has used over time, in the order they are tried.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::{
    block_parser::{BlockFormat, BlockView, Extracted},
    error::BlockError,
};

const REQUEST_PREFIX: &str = "==>";
const RESPONSE_PREFIX: &str = "<==";

fn source_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^.+ (?P<title>[^ ]+)\((?P<seq>[0-9]+)\)").expect("source pattern compiles")
    })
}

/// ```text
/// [UnityCrossThreadLogger]6/7/2018 7:21:03 PM
/// ==> Log.Info(530):
/// {
///     "json": "stuff"
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectionalRpc;

impl BlockFormat for DirectionalRpc {
    fn name(&self) -> &'static str {
        "directional-rpc"
    }

    fn matches(&self, view: &BlockView<'_>) -> bool {
        let line = view.source_line();
        line.starts_with(REQUEST_PREFIX) || line.starts_with(RESPONSE_PREFIX)
    }

    fn extract(&self, view: &BlockView<'_>) -> Result<Extracted, BlockError> {
        let line = view.source_line();
        let captures = source_re()
            .captures(line)
            .ok_or_else(|| BlockError::InvalidSource {
                line: line.to_string(),
            })?;
        let title = captures["title"].to_string();
        let sequence_number =
            captures["seq"]
                .parse::<u64>()
                .map_err(|_| BlockError::InvalidSequence {
                    line: line.to_string(),
                })?;

        let mut json_payload = view.body_from(2);
        if json_payload.starts_with('[') {
            json_payload = wrap_array(&title, &json_payload);
        }

        Ok(Extracted {
            title,
            sequence_number: Some(sequence_number),
            is_request: line.starts_with(REQUEST_PREFIX),
            json_payload,
        })
    }
}

/// A bare JSON array becomes `{"<title>": <array>}` so every payload is an object.
pub fn wrap_array(title: &str, array: &str) -> String {
    let key = Value::String(title.to_string());
    format!("{{{key}:{array}}}")
}

/// ```text
/// [UnityCrossThreadLogger]6/7/2018 7:21:03 PM: Match to 26848417E29213FE: GreToClientEvent
/// {
///     "json": "stuff"
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineBrace;

impl BlockFormat for InlineBrace {
    fn name(&self) -> &'static str {
        "inline-brace"
    }

    fn matches(&self, view: &BlockView<'_>) -> bool {
        view.source_line().contains('{')
    }

    fn extract(&self, view: &BlockView<'_>) -> Result<Extracted, BlockError> {
        let title = view
            .remainder
            .split_whitespace()
            .next_back()
            .unwrap_or_default();

        Ok(Extracted {
            title: title.to_string(),
            sequence_number: None,
            is_request: false,
            json_payload: view.body_from(1),
        })
    }
}

/// ```text
/// [UnityCrossThreadLogger]7/2/2018 10:27:59 PM (-1) Incoming Rank.Updated {
///     "json": "stuff"
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TrailingBrace;

impl BlockFormat for TrailingBrace {
    fn name(&self) -> &'static str {
        "trailing-brace"
    }

    fn matches(&self, view: &BlockView<'_>) -> bool {
        view.remainder.trim_end().ends_with('{')
    }

    fn extract(&self, view: &BlockView<'_>) -> Result<Extracted, BlockError> {
        let title = view
            .remainder
            .split_whitespace()
            .rev()
            .nth(1)
            .unwrap_or_default();

        Ok(Extracted {
            title: title.to_string(),
            sequence_number: None,
            is_request: false,
            json_payload: format!("{{{}", view.body_from(1)),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn directional_prefix_decides_request_flag() {
        for (prefix, is_request) in [("==>", true), ("<==", false)] {
            let source = format!("{prefix} Match.Join(77):");
            let block = lines(&["header", source.as_str(), "{", "}"]);
            let view = BlockView {
                remainder: "",
                lines: &block,
            };

            assert!(DirectionalRpc.matches(&view));
            let extracted = DirectionalRpc.extract(&view).unwrap();
            assert_eq!(extracted.is_request, is_request);
            assert_eq!(extracted.title, "Match.Join");
            assert_eq!(extracted.sequence_number, Some(77));
        }
    }

    #[test]
    fn wrapped_array_unwraps_by_title() {
        for title in ["Deck.GetDeckLists", "Weird Title", "back\\slash"] {
            let wrapped = wrap_array(title, "[1, {\"x\": [2]}]");
            let value: Value = serde_json::from_str(&wrapped).unwrap();

            assert_eq!(value[title], json!([1, {"x": [2]}]));
        }
    }

    #[test]
    fn inline_brace_needs_a_brace_on_the_second_line() {
        let block = lines(&["header", "no brace here", "}"]);
        let view = BlockView {
            remainder: ": GreToClientEvent",
            lines: &block,
        };

        assert!(!InlineBrace.matches(&view));
    }

    #[test]
    fn trailing_brace_with_a_lone_brace_has_an_empty_title() {
        let block = lines(&["header", "\"k\": 1", "}"]);
        for remainder in [" {", "{"] {
            let view = BlockView {
                remainder,
                lines: &block,
            };

            assert!(TrailingBrace.matches(&view));
            let extracted = TrailingBrace.extract(&view).unwrap();
            assert_eq!(extracted.title, "");
            assert_eq!(extracted.json_payload, "{\"k\": 1\n}");
        }
    }
}
