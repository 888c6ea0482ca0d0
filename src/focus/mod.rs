// MIT/Apache2 License

//! Keyboard focus: the type-ahead queue that holds key events back while a focus change is in
//! flight, and the focus manager that tracks the focus owner.

mod manager;
mod type_ahead;

pub use manager::{FocusManager, FocusOutcome, FocusVeto};
pub use type_ahead::{ComponentTree, KeyAdmission, TypeAheadMarker, TypeAheadQueue};
