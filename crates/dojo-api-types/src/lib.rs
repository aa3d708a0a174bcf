//! Wire types shared between the Dojo API and its clients.
//!
//! Field names follow the API's camelCase JSON. Continuation tokens are carried
//! as opaque JSON and never interpreted on the client side.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A member of the Dojo, as returned by the user and scoreboard endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub display_name: String,
    pub dojo_cohort: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

/// A game record. Games are addressed by cohort and id together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub cohort: String,
    pub id: String,
    pub white: String,
    pub black: String,
    pub date: String,
    pub result: String,
}

/// A club and its member usernames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// Opaque continuation token for paginated endpoints.
///
/// Holds the JSON text of the server's `lastEvaluatedKey`, which is sent back
/// verbatim as the `startKey` query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Wrap a `lastEvaluatedKey` value. `null` means the listing is exhausted.
    pub fn from_last_evaluated_key(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(token) if token.is_empty() => None,
            Value::String(token) => Some(Self(token.clone())),
            other => Some(Self(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of a listing endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` once the listing is exhausted.
    pub cursor: Option<Cursor>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            cursor: None,
        }
    }

    pub fn with_cursor(items: Vec<T>, cursor: Cursor) -> Self {
        Self {
            items,
            cursor: Some(cursor),
        }
    }
}

/// Response body of a listing endpoint: a flat array or a paged envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Flat(Vec<T>),
    Paged {
        items: Vec<T>,
        #[serde(rename = "lastEvaluatedKey", default)]
        last_evaluated_key: Option<Value>,
    },
}

impl<T> Listing<T> {
    pub fn into_page(self) -> Page<T> {
        match self {
            Listing::Flat(items) => Page::last(items),
            Listing::Paged {
                items,
                last_evaluated_key,
            } => Page {
                items,
                cursor: last_evaluated_key
                    .as_ref()
                    .and_then(Cursor::from_last_evaluated_key),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flat_listing_is_a_final_page() {
        let listing: Listing<Club> = serde_json::from_value(json!([
            {"id": "c1", "name": "Knights", "owner": "alice"}
        ]))
        .expect("flat listing");

        let page = listing.into_page();
        assert_eq!(page.items.len(), 1);
        assert!(page.items[0].members.is_empty());
        assert!(page.cursor.is_none());
    }

    #[test]
    fn paged_listing_keeps_last_evaluated_key_opaque() {
        let listing: Listing<Game> = serde_json::from_value(json!({
            "items": [{
                "cohort": "1500-1600", "id": "g1", "white": "a", "black": "b",
                "date": "2024.01.01", "result": "1-0"
            }],
            "lastEvaluatedKey": {"cohort": "1500-1600", "id": "g1"}
        }))
        .expect("paged listing");

        let page = listing.into_page();
        let cursor = page.cursor.expect("cursor present");
        let decoded: Value = serde_json::from_str(cursor.as_str()).expect("json cursor");
        assert_eq!(decoded, json!({"cohort": "1500-1600", "id": "g1"}));
    }

    #[test]
    fn paged_listing_without_key_is_exhausted() {
        let listing: Listing<User> = serde_json::from_value(json!({
            "items": [],
            "lastEvaluatedKey": null
        }))
        .expect("paged listing");

        assert!(listing.into_page().cursor.is_none());
    }

    #[test]
    fn string_cursor_passes_through_unchanged() {
        let cursor = Cursor::from_last_evaluated_key(&json!("abc")).expect("cursor");
        assert_eq!(cursor.as_str(), "abc");
        assert!(Cursor::from_last_evaluated_key(&json!("")).is_none());
    }

    #[test]
    fn user_uses_camel_case_on_the_wire() {
        let user = User {
            username: "bob".into(),
            display_name: "Bob".into(),
            dojo_cohort: "1500-1600".into(),
            rating: None,
        };
        let value = serde_json::to_value(&user).expect("serialize");
        assert_eq!(value["displayName"], "Bob");
        assert_eq!(value["dojoCohort"], "1500-1600");
        assert!(value.get("rating").is_none());
    }
}
