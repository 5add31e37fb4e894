//! Pipeline tests.
//!
//! - `harness.rs`       - mock collaborators and a pipeline builder
//! - `state_machine.rs` - I. Call signal filtering and ordering (Rules 1-6)
//! - `screening.rs`     - II. Deadline-bound screening (Rules 7-13)
//! - `relay.rs`         - III. Routing and relay dedup (Rules 14-20)
//! - `dispatch.rs`      - IV. Background dispatch and retry (Rules 21-27)
//! - `end_to_end.rs`    - V. Whole-call scenarios (Rules 28-32)

mod end_to_end;
