//! Encoder/decoder factory contracts and the built-in codecs used on
//! statistic edges.
//!
//! A factory is attached to an edge at compile time; the runtime calls
//! `create` once per sink (or source) and streams elements through the
//! returned encoder or decoder. Factories must be cheap to clone and share.

use crate::element::{downcast_ref, element, DynPair, Element, Pair};
use crate::error::{IrError, Result};
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

/// Creates encoders bound to a byte sink.
pub trait EncoderFactory: fmt::Debug + Send + Sync {
    fn create<'w>(&self, sink: &'w mut dyn Write) -> Box<dyn Encoder + 'w>;
}

/// Writes elements to the sink it was created with.
pub trait Encoder {
    fn encode(&mut self, element: &Element) -> Result<()>;
}

/// Creates decoders bound to a byte source.
pub trait DecoderFactory: fmt::Debug + Send + Sync {
    fn create<'r>(&self, source: &'r mut dyn Read) -> Box<dyn Decoder + 'r>;
}

/// Reads elements from the source it was created with.
pub trait Decoder {
    fn decode(&mut self) -> Result<Element>;
}

// --- i32 codec ---

#[derive(Debug, Clone, Copy, Default)]
pub struct I32EncoderFactory;

impl EncoderFactory for I32EncoderFactory {
    fn create<'w>(&self, sink: &'w mut dyn Write) -> Box<dyn Encoder + 'w> {
        Box::new(I32Encoder { sink })
    }
}

struct I32Encoder<'w> {
    sink: &'w mut dyn Write,
}

impl Encoder for I32Encoder<'_> {
    fn encode(&mut self, element: &Element) -> Result<()> {
        let value = downcast_ref::<i32>(element)
            .ok_or_else(|| IrError::coding("element is not an i32"))?;
        self.sink
            .write_all(&value.to_be_bytes())
            .map_err(|e| IrError::coding_with_source("failed to write i32", e))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct I32DecoderFactory;

impl DecoderFactory for I32DecoderFactory {
    fn create<'r>(&self, source: &'r mut dyn Read) -> Box<dyn Decoder + 'r> {
        Box::new(I32Decoder { source })
    }
}

struct I32Decoder<'r> {
    source: &'r mut dyn Read,
}

impl Decoder for I32Decoder<'_> {
    fn decode(&mut self) -> Result<Element> {
        let mut buf = [0u8; 4];
        self.source
            .read_exact(&mut buf)
            .map_err(|e| IrError::coding_with_source("failed to read i32", e))?;
        Ok(element(i32::from_be_bytes(buf)))
    }
}

// --- i64 codec ---

#[derive(Debug, Clone, Copy, Default)]
pub struct I64EncoderFactory;

impl EncoderFactory for I64EncoderFactory {
    fn create<'w>(&self, sink: &'w mut dyn Write) -> Box<dyn Encoder + 'w> {
        Box::new(I64Encoder { sink })
    }
}

struct I64Encoder<'w> {
    sink: &'w mut dyn Write,
}

impl Encoder for I64Encoder<'_> {
    fn encode(&mut self, element: &Element) -> Result<()> {
        let value = downcast_ref::<i64>(element)
            .ok_or_else(|| IrError::coding("element is not an i64"))?;
        self.sink
            .write_all(&value.to_be_bytes())
            .map_err(|e| IrError::coding_with_source("failed to write i64", e))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct I64DecoderFactory;

impl DecoderFactory for I64DecoderFactory {
    fn create<'r>(&self, source: &'r mut dyn Read) -> Box<dyn Decoder + 'r> {
        Box::new(I64Decoder { source })
    }
}

struct I64Decoder<'r> {
    source: &'r mut dyn Read,
}

impl Decoder for I64Decoder<'_> {
    fn decode(&mut self) -> Result<Element> {
        let mut buf = [0u8; 8];
        self.source
            .read_exact(&mut buf)
            .map_err(|e| IrError::coding_with_source("failed to read i64", e))?;
        Ok(element(i64::from_be_bytes(buf)))
    }
}

// --- pair codec ---

/// Encodes [`DynPair`] elements by delegating each side to a nested factory.
#[derive(Debug, Clone)]
pub struct PairEncoderFactory {
    left: Arc<dyn EncoderFactory>,
    right: Arc<dyn EncoderFactory>,
}

impl PairEncoderFactory {
    pub fn of(left: Arc<dyn EncoderFactory>, right: Arc<dyn EncoderFactory>) -> Self {
        Self { left, right }
    }
}

impl EncoderFactory for PairEncoderFactory {
    fn create<'w>(&self, sink: &'w mut dyn Write) -> Box<dyn Encoder + 'w> {
        Box::new(PairEncoder {
            left: self.left.clone(),
            right: self.right.clone(),
            sink,
        })
    }
}

struct PairEncoder<'w> {
    left: Arc<dyn EncoderFactory>,
    right: Arc<dyn EncoderFactory>,
    sink: &'w mut dyn Write,
}

impl Encoder for PairEncoder<'_> {
    fn encode(&mut self, element: &Element) -> Result<()> {
        let pair = downcast_ref::<DynPair>(element)
            .ok_or_else(|| IrError::coding("element is not a pair"))?;
        self.left.create(self.sink).encode(&pair.left)?;
        self.right.create(self.sink).encode(&pair.right)
    }
}

/// Decodes [`DynPair`] elements by delegating each side to a nested factory.
#[derive(Debug, Clone)]
pub struct PairDecoderFactory {
    left: Arc<dyn DecoderFactory>,
    right: Arc<dyn DecoderFactory>,
}

impl PairDecoderFactory {
    pub fn of(left: Arc<dyn DecoderFactory>, right: Arc<dyn DecoderFactory>) -> Self {
        Self { left, right }
    }
}

impl DecoderFactory for PairDecoderFactory {
    fn create<'r>(&self, source: &'r mut dyn Read) -> Box<dyn Decoder + 'r> {
        Box::new(PairDecoder {
            left: self.left.clone(),
            right: self.right.clone(),
            source,
        })
    }
}

struct PairDecoder<'r> {
    left: Arc<dyn DecoderFactory>,
    right: Arc<dyn DecoderFactory>,
    source: &'r mut dyn Read,
}

impl Decoder for PairDecoder<'_> {
    fn decode(&mut self) -> Result<Element> {
        let left = self.left.create(self.source).decode()?;
        let right = self.right.create(self.source).decode()?;
        Ok(element(Pair::of(left, right)))
    }
}
