//! Core domain types and logic: channel scan state, proxy config codec, filter
//! expressions and the record pipeline.
pub mod channel;
pub mod expr;
pub mod model;
pub mod pipeline;
pub mod proxy;
pub mod roster;
pub mod value;
