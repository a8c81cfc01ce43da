//! Process-wide id generation for IR elements.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_VERTEX_ID: AtomicU64 = AtomicU64::new(0);
static NEXT_EDGE_ID: AtomicU64 = AtomicU64::new(0);

pub(crate) fn fresh_vertex_id() -> String {
    format!("vertex-{}", NEXT_VERTEX_ID.fetch_add(1, Ordering::SeqCst))
}

pub(crate) fn fresh_edge_id() -> String {
    format!("edge-{}", NEXT_EDGE_ID.fetch_add(1, Ordering::SeqCst))
}
