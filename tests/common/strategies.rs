use batchflow_core::dispatch::Outcome;
use batchflow_core::error::ItemError;
use proptest::prelude::*;

/// Strategy for generating success/failure outcomes
pub fn outcome_strategy() -> impl Strategy<Value = Outcome<i64>> {
    prop_oneof![
        3 => any::<i64>().prop_map(Outcome::Success),
        1 => "[a-z ]{1,20}".prop_map(|message| Outcome::Failure(ItemError::io(message))),
    ]
}

/// Strategy for generating outcome sequences, possibly empty
pub fn outcomes_strategy() -> impl Strategy<Value = Vec<Outcome<i64>>> {
    prop::collection::vec(outcome_strategy(), 0..50)
}

/// Strategy for generating component field names
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}"
}

/// Strategy for generating a batch column with a valid position into it
pub fn column_and_position_strategy() -> impl Strategy<Value = (Vec<i64>, usize)> {
    prop::collection::vec(any::<i64>(), 1..40).prop_flat_map(|column| {
        let len = column.len();
        (Just(column), 0..len)
    })
}
