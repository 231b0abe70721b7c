//! Borrow lifecycle engine: the single-item state machine and the group
//! transaction semantics built on top of it.

pub mod group;
pub mod machine;

pub use group::GroupAction;
pub use machine::{BorrowEvent, LifecyclePolicy, TransitionOutcome, TransitionParams};
