//! Replay accumulator for Ledgerfold.
//!
//! Each subject key's ordered stream is folded by a small state machine:
//! [`CostBasisState`] for share-based positions (weighted-average exchange
//! rate, cumulative inflows and outflows, active transitions) and
//! [`IndexerState`] for the order-sensitive indexer quantities (reward cut,
//! locked stake resets). Keys are independent, so [`Replayer::replay_all`]
//! folds them in parallel and collects results into ordered maps.
//!
//! Per-key problems are [`Anomaly`] warnings attached to the key's result;
//! only an unordered input stream is a hard [`ReplayError`].

pub mod cost_basis;
pub mod error;
pub mod flow;
pub mod indexer;
pub mod replayer;

pub use cost_basis::CostBasisState;
pub use error::{Anomaly, ReplayError};
pub use flow::{FLOW_TABLE, Flow, FlowRule, flow_rule};
pub use indexer::IndexerState;
pub use replayer::{KeyFold, KeyReplay, ReplayOutput, Replayer, replay_sequence};
