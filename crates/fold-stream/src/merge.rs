use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use fold_events::{EventKind, LedgerEvent, Precedence};
use fold_types::{Amount, EventPosition, Family, SubjectKey};

use crate::error::{MergeError, OrderViolation};
use crate::sign::{LedgerField, Sign, routes, rules_for, subject_key};

/// The total order events are replayed in.
///
/// `timestamp` → `block_number` → `log_index` → kind precedence → arrival
/// sequence. Arrival sequence is unique per run, so no two events of one
/// stream ever compare equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderKey {
    pub position: EventPosition,
    pub precedence: Precedence,
    pub arrival: u64,
}

impl OrderKey {
    pub fn of(event: &LedgerEvent, arrival: u64) -> Self {
        Self {
            position: event.position,
            precedence: event.kind.precedence(),
            arrival,
        }
    }

    /// Ordinal used for "latest" selections: block, log index, arrival.
    pub fn ordinal(&self) -> (u64, Option<u32>, u64) {
        (self.position.block_number, self.position.log_index, self.arrival)
    }
}

impl fmt::Debug for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderKey({self})")
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}#{}", self.position, self.precedence, self.arrival)
    }
}

/// An event as seen by one subject key: its order key and signed deltas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedEvent {
    pub event: Arc<LedgerEvent>,
    pub order: OrderKey,
    /// Net signed contribution per field for this family.
    pub deltas: BTreeMap<LedgerField, Amount>,
}

impl SignedEvent {
    /// Apply the sign table for `family` to an event.
    pub fn sign(event: Arc<LedgerEvent>, family: Family, arrival: u64) -> Result<Self, MergeError> {
        let mut deltas: BTreeMap<LedgerField, Amount> = BTreeMap::new();
        for rule in rules_for(event.kind, family) {
            let magnitude = event.magnitude(rule.magnitude);
            let signed = match rule.sign {
                Sign::Credit => magnitude,
                Sign::Debit => magnitude.checked_neg()?,
            };
            let slot = deltas.entry(rule.field).or_insert(Amount::ZERO);
            *slot = slot.checked_add(signed)?;
        }
        let order = OrderKey::of(&event, arrival);
        Ok(Self { event, order, deltas })
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind
    }

    pub fn position(&self) -> EventPosition {
        self.event.position
    }

    /// Signed delta for `field`; zero when the event does not touch it.
    pub fn delta(&self, field: LedgerField) -> Amount {
        self.deltas.get(&field).copied().unwrap_or(Amount::ZERO)
    }
}

/// Per-key ordered event sequences.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergedStreams {
    streams: BTreeMap<SubjectKey, Vec<SignedEvent>>,
    event_count: u64,
}

impl MergedStreams {
    pub fn get(&self, key: &SubjectKey) -> &[SignedEvent] {
        self.streams.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SubjectKey, &[SignedEvent])> {
        self.streams.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Streams of one family, in key order.
    pub fn family(&self, family: Family) -> impl Iterator<Item = (&SubjectKey, &[SignedEvent])> {
        self.iter().filter(move |(key, _)| key.family() == family)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SubjectKey> {
        self.streams.keys()
    }

    /// Number of subject keys.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Number of source events merged (before fan-out to families).
    pub fn event_count(&self) -> u64 {
        self.event_count
    }
}

/// Route, sign and order events.
///
/// Arrival sequence is the position in `events`; callers that concatenate
/// several batches must do so in a stable order for runs to be reproducible.
pub fn merge<I>(events: I) -> Result<MergedStreams, MergeError>
where
    I: IntoIterator<Item = LedgerEvent>,
{
    let mut streams: BTreeMap<SubjectKey, Vec<SignedEvent>> = BTreeMap::new();
    let mut event_count = 0u64;

    for event in events {
        let arrival = event_count;
        let event = Arc::new(event);
        for &family in routes(event.kind) {
            let key = subject_key(&event, family).map_err(|role| MergeError::MissingParty {
                kind: event.kind,
                family,
                role,
                arrival,
            })?;
            let signed = SignedEvent::sign(Arc::clone(&event), family, arrival)?;
            streams.entry(key).or_default().push(signed);
        }
        event_count += 1;
    }

    for sequence in streams.values_mut() {
        sequence.sort_by_key(|signed| signed.order);
    }

    debug!(events = event_count, keys = streams.len(), "merged event streams");
    Ok(MergedStreams {
        streams,
        event_count,
    })
}

/// Check that a sequence is strictly increasing by [`OrderKey`].
pub fn validate_order(sequence: &[SignedEvent]) -> Result<(), OrderViolation> {
    for (index, pair) in sequence.windows(2).enumerate() {
        if pair[0].order >= pair[1].order {
            return Err(OrderViolation {
                index: index + 1,
                previous: pair[0].order,
                current: pair[1].order,
            });
        }
    }
    Ok(())
}
