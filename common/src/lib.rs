//! Remora common module
//!
//! Shared contracts between the Remora compiler and its runtime: the error
//! taxonomy, the dynamic element representation, partition ranges, codec
//! factories, and key extraction.

pub mod codec;
pub mod element;
pub mod error;
pub mod key;
pub mod range;

pub use codec::{Decoder, DecoderFactory, Encoder, EncoderFactory};
pub use element::{downcast_ref, element, DynPair, Element, Pair};
pub use error::{IrError, Result};
pub use key::KeyExtractor;
pub use range::KeyRange;
