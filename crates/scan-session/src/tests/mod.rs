mod proptest_fsm;
mod step_mode;

use scan_core::settings::{ActivationMode, ScanConfig};
use scan_core::switch::Activate;
use scan_core::tree::{LeafAction, NodeId, ScanNode, ScanTree};

use crate::types::{ScanEvent, ScanInput};

pub(super) fn leaf(label: &str) -> ScanNode {
    ScanNode::leaf(
        NodeId::new(label),
        label,
        LeafAction::InsertText(label.to_lowercase()),
    )
}

pub(super) fn group(id: &str, children: Vec<ScanNode>) -> ScanNode {
    ScanNode::group(NodeId::new(id), id, children).expect("non-empty group")
}

/// Root with leaves A, B, C.
pub(super) fn abc_tree() -> ScanTree {
    ScanTree::new(group("root", vec![leaf("A"), leaf("B"), leaf("C")])).unwrap()
}

/// Root with two rows: [A, B, C] and [D, E].
pub(super) fn rows_tree() -> ScanTree {
    ScanTree::new(group(
        "root",
        vec![
            group("row0", vec![leaf("A"), leaf("B"), leaf("C")]),
            group("row1", vec![leaf("D"), leaf("E")]),
        ],
    ))
    .unwrap()
}

pub(super) fn config(dwell_ms: u64, mode: ActivationMode, repeat: u32) -> ScanConfig {
    ScanConfig {
        dwell_ms,
        activation_mode: mode,
        repeat_scan_count: repeat,
        debounce_ms: 20,
        ..ScanConfig::default()
    }
}

pub(super) fn activate(at: u64) -> ScanInput {
    ScanInput::Activate(Activate { at, held: false })
}

/// Labels of the highlight events, in order.
pub(super) fn highlighted(events: &[ScanEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::Highlight { label, .. } => Some(label.clone()),
            _ => None,
        })
        .collect()
}

pub(super) fn selected(events: &[ScanEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::Select { label, .. } => Some(label.clone()),
            _ => None,
        })
        .collect()
}
