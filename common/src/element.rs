//! Dynamically typed records flowing through the dataflow at runtime.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

/// A single record. Transforms and codecs see elements as opaque values and
/// downcast to the concrete type they were configured for.
pub type Element = Arc<dyn Any + Send + Sync>;

/// Wraps a concrete value into an [`Element`].
pub fn element<T: Any + Send + Sync>(value: T) -> Element {
    Arc::new(value)
}

/// Borrows the concrete value inside an element, if it has that type.
pub fn downcast_ref<T: Any>(element: &Element) -> Option<&T> {
    element.downcast_ref::<T>()
}

/// An immutable pair of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair<L, R> {
    pub left: L,
    pub right: R,
}

impl<L, R> Pair<L, R> {
    pub fn of(left: L, right: R) -> Self {
        Self { left, right }
    }
}

/// The dynamically typed pair shape used on statistic edges: both sides are
/// themselves elements.
pub type DynPair = Pair<Element, Element>;
