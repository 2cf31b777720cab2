use std::collections::BTreeSet;

use fold_aggregate::{GroupRollup, group_by};
use fold_events::EventKind;
use fold_stream::LedgerField;
use fold_types::{Amount, EntityId, Family, TypeError};

use super::{Folded, TableResult};
use crate::snapshot::{Row, SnapshotTable};

/// One row per (curator, deployment) signal.
pub(crate) fn signals(input: &Folded<'_>) -> TableResult {
    let mut rows = Vec::new();
    for (key, rollup) in input.family(Family::Curation) {
        let row = Row::new()
            .text("id", key.id())
            .text("curator_id", key.primary().as_str())
            .opt_text("subgraph_deployment_id", key.secondary().map(EntityId::as_str))
            .tokens("signalled_tokens", rollup.sum(LedgerField::SignalledTokens))?
            .tokens("unsignalled_tokens", rollup.sum(LedgerField::UnsignalledTokens))?
            .tokens("signal", rollup.sum(LedgerField::Signal))?
            .timestamp("created_at", rollup.first_at)
            .timestamp("last_updated_at", rollup.last_at);
        rows.push(row.into_record());
    }
    Ok(SnapshotTable::new("signal", "id", rows))
}

/// One row per (curator, subgraph) name signal.
pub(crate) fn name_signals(input: &Folded<'_>) -> TableResult {
    let mut rows = Vec::new();
    for (key, rollup) in input.family(Family::NameCuration) {
        let row = Row::new()
            .text("id", key.id())
            .text("curator_id", key.primary().as_str())
            .opt_text("subgraph_id", key.secondary().map(EntityId::as_str))
            .tokens("signalled_tokens", rollup.sum(LedgerField::SignalledTokens))?
            .tokens("unsignalled_tokens", rollup.sum(LedgerField::UnsignalledTokens))?
            .tokens("withdrawn_tokens", rollup.sum(LedgerField::WithdrawnTokens))?
            .tokens("name_signal", rollup.sum(LedgerField::NameSignal))?
            .tokens("signal", rollup.sum(LedgerField::Signal))?
            .timestamp("created_at", rollup.first_at)
            .timestamp("last_name_signal_change", rollup.last_at);
        rows.push(row.into_record());
    }
    Ok(SnapshotTable::new("name_signal", "id", rows))
}

/// One row per curator, combining deployment and name signals.
pub(crate) fn curators(input: &Folded<'_>) -> TableResult {
    let curation = group_by(input.rollups, Family::Curation)?;
    let naming = group_by(input.rollups, Family::NameCuration)?;
    let empty = GroupRollup::default();
    let curators: BTreeSet<&EntityId> = curation.keys().chain(naming.keys()).collect();

    let mut rows = Vec::new();
    for curator in curators {
        let signal = curation.get(curator).unwrap_or(&empty);
        let named = naming.get(curator).unwrap_or(&empty);

        let signal_count = signal.distinct_count(EventKind::CurationSignalled);
        let active_signal_count = signal.active_count(LedgerField::Signal);
        let name_signal_count = named.distinct_count(EventKind::NameSignalMinted);
        let active_name_signal_count = named.active_count(LedgerField::CuratorNameSignal);
        let created_at = [
            signal.first_of(&[EventKind::CurationSignalled]),
            named.first_of(&[EventKind::NameSignalMinted]),
        ]
        .into_iter()
        .flatten()
        .min();

        let row = Row::new()
            .text("curator_id", curator.as_str())
            .tokens("total_signalled_tokens", combined(signal, named, LedgerField::SignalledTokens)?)?
            .tokens("total_unsignalled_tokens", combined(signal, named, LedgerField::UnsignalledTokens)?)?
            .tokens("total_name_signalled_tokens", named.sum(LedgerField::SignalledTokens))?
            .tokens("total_name_unsignalled_tokens", named.sum(LedgerField::UnsignalledTokens))?
            .tokens("total_withdrawn_tokens", named.sum(LedgerField::WithdrawnTokens))?
            .tokens("total_signal", signal.sum(LedgerField::Signal))?
            .tokens("total_name_signal", named.sum(LedgerField::CuratorNameSignal))?
            .number("signal_count", signal_count)
            .number("active_signal_count", active_signal_count)
            .number("name_signal_count", name_signal_count)
            .number("active_name_signal_count", active_name_signal_count)
            .number("combined_signal_count", signal_count + name_signal_count)
            .number("active_combined_signal_count", active_signal_count + active_name_signal_count)
            .timestamp("created_at", created_at)
            .opt_text("default_display_name", input.display_name(curator));
        rows.push(row.into_record());
    }
    Ok(SnapshotTable::new("curator", "curator_id", rows))
}

fn combined(signal: &GroupRollup, named: &GroupRollup, field: LedgerField) -> Result<Amount, TypeError> {
    signal.sum(field).checked_add(named.sum(field))
}
