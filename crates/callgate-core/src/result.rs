//! Callback results
//!
//! A trigger hands its resume continuation zero or more positional values
//! and zero or more named values. Combinators collect these per child into
//! ordered slots so a resumed body can tell which branch fired and with
//! what payload.

use serde_json::{Map, Value};

/// Positional and named values captured from exactly one trigger
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallbackResult {
    /// Positional values, in call order
    pub args: Vec<Value>,
    /// Named values
    pub kwargs: Map<String, Value>,
}

impl CallbackResult {
    /// Empty result (a trigger that passed nothing)
    pub fn new() -> Self {
        CallbackResult::default()
    }

    /// Result carrying positional values only
    pub fn from_args<I, V>(args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        CallbackResult {
            args: args.into_iter().map(Into::into).collect(),
            kwargs: Map::new(),
        }
    }

    /// Append a positional value
    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Add a named value
    pub fn with_named(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn named(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }
}

/// What a resume continuation delivers
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// A leaf event fired with this result
    Fired(CallbackResult),
    /// A combinator resolved; one slot per child in declaration order,
    /// `None` for children that never fired
    Slots(Vec<Option<Outcome>>),
}

impl Outcome {
    /// Leaf outcome with no values
    pub fn empty() -> Self {
        Outcome::Fired(CallbackResult::new())
    }

    /// The leaf result, if this outcome came from a leaf
    pub fn result(&self) -> Option<&CallbackResult> {
        match self {
            Outcome::Fired(result) => Some(result),
            Outcome::Slots(_) => None,
        }
    }

    /// The per-child slots, if this outcome came from a combinator
    pub fn slots(&self) -> Option<&[Option<Outcome>]> {
        match self {
            Outcome::Fired(_) => None,
            Outcome::Slots(slots) => Some(slots),
        }
    }

    /// Outcome recorded for child `index` (None if unset or not a combinator)
    pub fn slot(&self, index: usize) -> Option<&Outcome> {
        self.slots()?.get(index)?.as_ref()
    }

    /// Did child `index` fire?
    pub fn fired(&self, index: usize) -> bool {
        self.slot(index).is_some()
    }

    /// Ordinals of the children that fired
    pub fn fired_indices(&self) -> Vec<usize> {
        self.slots()
            .map(|slots| {
                slots
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| slot.is_some())
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for Outcome {
    fn default() -> Self {
        Outcome::empty()
    }
}

impl From<CallbackResult> for Outcome {
    fn from(result: CallbackResult) -> Self {
        Outcome::Fired(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_callback_result_builder() {
        let result = CallbackResult::new()
            .with_arg("button_a")
            .with_arg(3)
            .with_named("pos", json!([10, 20]));

        assert_eq!(result.arg(0), Some(&json!("button_a")));
        assert_eq!(result.arg(1), Some(&json!(3)));
        assert_eq!(result.arg(2), None);
        assert_eq!(result.named("pos"), Some(&json!([10, 20])));
        assert!(!result.is_empty());
        assert!(CallbackResult::new().is_empty());
    }

    #[test]
    fn test_from_args() {
        let result = CallbackResult::from_args([1, 2, 3]);
        assert_eq!(result.args, vec![json!(1), json!(2), json!(3)]);
        assert!(result.kwargs.is_empty());
    }

    #[test]
    fn test_outcome_slot_introspection() {
        let outcome = Outcome::Slots(vec![
            None,
            Some(Outcome::Fired(CallbackResult::from_args(["b"]))),
            None,
        ]);

        assert!(!outcome.fired(0));
        assert!(outcome.fired(1));
        assert!(!outcome.fired(7));
        assert_eq!(outcome.fired_indices(), vec![1]);
        assert_eq!(
            outcome.slot(1).and_then(Outcome::result).and_then(|r| r.arg(0)),
            Some(&json!("b"))
        );
        assert!(outcome.result().is_none());
    }

    #[test]
    fn test_leaf_outcome_has_no_slots() {
        let outcome = Outcome::empty();
        assert!(outcome.slots().is_none());
        assert!(outcome.fired_indices().is_empty());
        assert_eq!(outcome.result(), Some(&CallbackResult::new()));
    }
}
