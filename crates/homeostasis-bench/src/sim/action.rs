//! Parsing the model's answer into a consumption action.

use thiserror::Error;

/// Largest consumption accepted in one step. Keeps the level, deviation
/// penalties and running totals far inside `i64` for any trial length.
pub const MAX_ACTION: i64 = 1_000_000_000;

/// A validated consumption amount. Always in `0..=MAX_ACTION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Action(i64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAction {
    #[error("response {0:?} does not contain an integer")]
    NotAnInteger(String),
    #[error("negative consumption {0} is not allowed")]
    Negative(i64),
    #[error("consumption {0} exceeds the limit of {MAX_ACTION}")]
    TooLarge(i64),
}

impl Action {
    pub fn new(amount: i64) -> Result<Self, InvalidAction> {
        if amount < 0 {
            Err(InvalidAction::Negative(amount))
        } else if amount > MAX_ACTION {
            Err(InvalidAction::TooLarge(amount))
        } else {
            Ok(Self(amount))
        }
    }

    /// Parse a model response.
    ///
    /// All digits and `-` signs in the response are concatenated and the
    /// result parsed as one integer, so `"I eat 3 potatoes."` is `3` while
    /// `"3 or 4"` is `34` and `"3-4"` is rejected.
    pub fn parse(response: &str) -> Result<Self, InvalidAction> {
        let amount = extract_int_from_text(response)
            .ok_or_else(|| InvalidAction::NotAnInteger(response.to_string()))?;
        Self::new(amount)
    }

    pub fn amount(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Concatenate every ASCII digit and `-` in `text` and parse the result.
pub fn extract_int_from_text(text: &str) -> Option<i64> {
    let filtered: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    filtered.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_integer() {
        assert_eq!(Action::parse("5").unwrap().amount(), 5);
        assert_eq!(Action::parse(" 12\n").unwrap().amount(), 12);
        assert_eq!(Action::parse("0").unwrap().amount(), 0);
    }

    #[test]
    fn digits_embedded_in_text() {
        assert_eq!(Action::parse("I will eat 3 potatoes.").unwrap().amount(), 3);
        assert_eq!(Action::parse("3 or 4").unwrap().amount(), 34);
    }

    #[test]
    fn negative_rejected() {
        assert_eq!(Action::parse("-2"), Err(InvalidAction::Negative(-2)));
        assert_eq!(Action::new(-1), Err(InvalidAction::Negative(-1)));
    }

    #[test]
    fn non_integer_rejected() {
        assert!(matches!(
            Action::parse("none"),
            Err(InvalidAction::NotAnInteger(_))
        ));
        assert!(matches!(Action::parse(""), Err(InvalidAction::NotAnInteger(_))));
        assert!(matches!(Action::parse("3-4"), Err(InvalidAction::NotAnInteger(_))));
        assert!(matches!(Action::parse("--"), Err(InvalidAction::NotAnInteger(_))));
    }

    #[test]
    fn overflowing_integer_rejected() {
        let huge = "9".repeat(40);
        assert!(matches!(
            Action::parse(&huge),
            Err(InvalidAction::NotAnInteger(_))
        ));
    }

    #[test]
    fn huge_amount_rejected() {
        assert_eq!(
            Action::parse("1000000000000000000"),
            Err(InvalidAction::TooLarge(1_000_000_000_000_000_000))
        );
        assert_eq!(Action::new(MAX_ACTION).unwrap().amount(), MAX_ACTION);
        assert_eq!(
            Action::new(MAX_ACTION + 1),
            Err(InvalidAction::TooLarge(MAX_ACTION + 1))
        );
    }

    #[test]
    fn valid_parse_is_never_negative() {
        let inputs = ["-0", "0-", "5", "-5", "x-1y", "7 apples", "--3", "1.5", "1,000"];
        for input in inputs {
            if let Ok(action) = Action::parse(input) {
                assert!(action.amount() >= 0, "{input:?} -> {action}");
            }
        }
    }
}
