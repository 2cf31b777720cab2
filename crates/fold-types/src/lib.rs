//! Foundation types for Ledgerfold.
//!
//! Every other Ledgerfold crate depends on `fold-types`. The types here are
//! deliberately small: they carry identity and magnitude, never behaviour
//! tied to a particular event kind.
//!
//! # Key Types
//!
//! - [`Amount`]: raw on-chain integer amount (wei scale), checked arithmetic
//! - [`EntityId`]: normalized participant or content identifier
//! - [`Family`]: the kind of state an event contributes to
//! - [`SubjectKey`]: the partition key an entity state is folded under
//! - [`EventPosition`]: timestamp plus block coordinates of an event

pub mod amount;
pub mod error;
pub mod identity;
pub mod position;

pub use amount::{Amount, WEI_DECIMALS};
pub use error::TypeError;
pub use identity::{EntityId, Family, SubjectKey};
pub use position::{EventPosition, timestamp_to_utc};
