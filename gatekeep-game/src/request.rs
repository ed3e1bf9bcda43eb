//! Validation of raw, string-typed decision parameters.
//!
//! Transports hand over whatever the caller sent; everything is checked here
//! before a session is loaded.

use crate::session::{SessionError, SessionId};

/// A validated decision request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecideRequest {
    pub id: SessionId,
    pub person_index: u32,
    pub accept: Option<bool>,
}

impl DecideRequest {
    /// Parse raw parameters as received from a query string.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the id is missing or malformed, the
    /// person index is missing, negative, or not an integer, or `accept` is
    /// not a boolean.
    pub fn parse(
        game_id: Option<&str>,
        person_index: Option<&str>,
        accept: Option<&str>,
    ) -> Result<Self, SessionError> {
        let id = game_id
            .ok_or(SessionError::MissingParameter("gameId"))?
            .parse::<SessionId>()?;
        let raw_index = person_index.ok_or(SessionError::MissingParameter("personIndex"))?;
        let person_index =
            raw_index
                .trim()
                .parse::<u32>()
                .map_err(|_| SessionError::InvalidParameter {
                    name: "personIndex",
                    value: raw_index.to_string(),
                })?;
        let accept = accept.map(parse_bool).transpose()?;
        Ok(Self {
            id,
            person_index,
            accept,
        })
    }
}

fn parse_bool(raw: &str) -> Result<bool, SessionError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(SessionError::InvalidParameter {
            name: "accept",
            value: raw.to_string(),
        }),
    }
}

/// Parse a raw scenario id.
///
/// # Errors
///
/// Returns [`SessionError`] when the value is missing or not an integer.
pub fn parse_scenario(raw: Option<&str>) -> Result<u8, SessionError> {
    let raw = raw.ok_or(SessionError::MissingParameter("scenario"))?;
    raw.trim()
        .parse::<u8>()
        .map_err(|_| SessionError::InvalidParameter {
            name: "scenario",
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_request() {
        let id = SessionId::random().to_string();
        let request = DecideRequest::parse(Some(&id), Some("12"), Some("true")).unwrap();
        assert_eq!(request.person_index, 12);
        assert_eq!(request.accept, Some(true));
        assert_eq!(request.id.to_string(), id);

        let opening = DecideRequest::parse(Some(&id), Some("0"), None).unwrap();
        assert_eq!(opening.accept, None);
    }

    #[test]
    fn rejects_missing_and_malformed_fields() {
        let id = SessionId::random().to_string();
        assert_eq!(
            DecideRequest::parse(None, Some("1"), None),
            Err(SessionError::MissingParameter("gameId"))
        );
        assert_eq!(
            DecideRequest::parse(Some(&id), None, None),
            Err(SessionError::MissingParameter("personIndex"))
        );
        assert!(matches!(
            DecideRequest::parse(Some(&id), Some("-3"), None),
            Err(SessionError::InvalidParameter {
                name: "personIndex",
                ..
            })
        ));
        assert!(matches!(
            DecideRequest::parse(Some(&id), Some("2"), Some("maybe")),
            Err(SessionError::InvalidParameter { name: "accept", .. })
        ));
        assert!(matches!(
            DecideRequest::parse(Some("abc"), Some("2"), Some("true")),
            Err(SessionError::MalformedId(_))
        ));
    }

    #[test]
    fn scenario_ids_must_be_integers() {
        assert_eq!(parse_scenario(Some(" 2 ")), Ok(2));
        assert_eq!(
            parse_scenario(None),
            Err(SessionError::MissingParameter("scenario"))
        );
        assert!(parse_scenario(Some("two")).is_err());
    }
}
