//! # Sync Streams
//!
//! One visitor interface, three implementations:
//!
//! ```text
//!   SizeStream  ── counts bytes ───────────┐
//!   SyncWriter  ── copies into FrameBlock ─┼── same field walk (SyncFields::visit)
//!   SyncReader  ── copies out of block ────┘
//! ```
//!
//! Sizing runs the exact code that writes, so a field cannot be counted
//! without also being written.
//!
//! References to other objects are not stored in the byte stream. The writer
//! resolves them, moves the resolved pointer into a transfer table and writes
//! the table index; the reader takes the pointer back out of the table. Each
//! transferred pointer therefore has exactly one owner at any time.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use bytemuck::Pod;

use super::domain::{CoreSide, Counterpart, SimSide, SyncDomain};

/// Index written for a null reference.
const NULL_REF: u32 = u32::MAX;

/// A resolved core pointer in flight between threads.
pub(crate) type TransferSlot = Option<Box<dyn Any + Send>>;

/// Visitor over the syncable fields of an object.
///
/// Every method takes the field by `&mut` so one enumeration serves all three
/// passes. Writers and size counters never modify the value.
pub trait SyncStream<D: SyncDomain> {
    /// True when values flow out of the stream into the fields.
    const READING: bool;

    /// A trivially copyable value.
    fn pod<T: Pod>(&mut self, value: &mut T);

    /// A fixed-length byte range whose length both sides already agree on.
    fn raw(&mut self, value: &mut [u8]);

    /// A boolean, stored as one byte.
    fn flag(&mut self, value: &mut bool) {
        let mut byte = u8::from(*value);
        self.pod(&mut byte);
        *value = byte != 0;
    }

    /// A length-prefixed byte buffer.
    fn bytes(&mut self, value: &mut Vec<u8>);

    /// A length-prefixed UTF-8 string.
    fn string(&mut self, value: &mut String);

    /// A length-prefixed array of trivially copyable values.
    fn pod_vec<T: Pod>(&mut self, value: &mut Vec<T>);

    /// A reference to an object with a core counterpart.
    fn reference<T: Counterpart>(&mut self, value: &mut D::Ref<T>);

    /// A length-prefixed list of references.
    fn references<T: Counterpart>(&mut self, values: &mut Vec<D::Ref<T>>) {
        let mut count = u32::try_from(values.len()).unwrap_or(u32::MAX);
        self.pod(&mut count);
        if Self::READING {
            values.clear();
            values.resize_with(count as usize, Default::default);
        }
        for value in values.iter_mut() {
            self.reference::<T>(value);
        }
    }

    /// A length-prefixed list of composite values.
    fn seq<F: SyncFields<D> + Default>(&mut self, items: &mut Vec<F>)
    where
        Self: Sized,
    {
        let mut count = u32::try_from(items.len()).unwrap_or(u32::MAX);
        self.pod(&mut count);
        if Self::READING {
            items.clear();
            items.resize_with(count as usize, F::default);
        }
        for item in items.iter_mut() {
            item.visit(self);
        }
    }

    /// A composite value, visited in place.
    fn nested<F: SyncFields<D>>(&mut self, value: &mut F)
    where
        Self: Sized,
    {
        value.visit(self);
    }
}

/// Ordered enumeration of an object's syncable fields.
///
/// Implement it once, generic over the domain, and the same walk is used to
/// size, write and read the object.
pub trait SyncFields<D: SyncDomain> {
    /// Visits every syncable field in declaration order.
    fn visit<S: SyncStream<D>>(&mut self, stream: &mut S);
}

// ============================================================================
// SIZE
// ============================================================================

/// Counts the bytes a write pass would produce.
#[derive(Debug)]
pub struct SizeStream<D> {
    total: usize,
    _domain: PhantomData<fn() -> D>,
}

impl<D> Default for SizeStream<D> {
    fn default() -> Self {
        Self { total: 0, _domain: PhantomData }
    }
}

impl<D> SizeStream<D> {
    /// Creates an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes counted so far.
    #[inline]
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }
}

impl<D: SyncDomain> SyncStream<D> for SizeStream<D> {
    const READING: bool = false;

    #[inline]
    fn pod<T: Pod>(&mut self, _value: &mut T) {
        self.total += std::mem::size_of::<T>();
    }

    #[inline]
    fn raw(&mut self, value: &mut [u8]) {
        self.total += value.len();
    }

    fn bytes(&mut self, value: &mut Vec<u8>) {
        self.total += 4 + value.len();
    }

    fn string(&mut self, value: &mut String) {
        self.total += 4 + value.len();
    }

    fn pod_vec<T: Pod>(&mut self, value: &mut Vec<T>) {
        self.total += 4 + std::mem::size_of_val(value.as_slice());
    }

    #[inline]
    fn reference<T: Counterpart>(&mut self, _value: &mut D::Ref<T>) {
        self.total += 4;
    }
}

// ============================================================================
// WRITE (sim side)
// ============================================================================

/// Writes fields into a snapshot block.
pub struct SyncWriter<'a> {
    buf: &'a mut [u8],
    cursor: usize,
    objects: Vec<TransferSlot>,
}

impl<'a> SyncWriter<'a> {
    /// Creates a writer over a pre-sized block.
    #[must_use]
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, cursor: 0, objects: Vec::new() }
    }

    /// Bytes written so far.
    #[inline]
    #[must_use]
    pub const fn written(&self) -> usize {
        self.cursor
    }

    /// Ends the write, returning the byte count and the transferred pointers.
    pub(crate) fn finish(self) -> (usize, Vec<TransferSlot>) {
        (self.cursor, self.objects)
    }

    fn put(&mut self, bytes: &[u8]) {
        let end = self.cursor + bytes.len();
        assert!(
            end <= self.buf.len(),
            "Sync snapshot overrun! Writing {} bytes at offset {} into a {} byte block",
            bytes.len(),
            self.cursor,
            self.buf.len()
        );
        self.buf[self.cursor..end].copy_from_slice(bytes);
        self.cursor = end;
    }

    fn put_len(&mut self, len: usize) {
        let len = u32::try_from(len).unwrap_or_else(|_| panic!("Sync field too large: {len} bytes"));
        self.put(bytemuck::bytes_of(&len));
    }
}

impl SyncStream<SimSide> for SyncWriter<'_> {
    const READING: bool = false;

    #[inline]
    fn pod<T: Pod>(&mut self, value: &mut T) {
        self.put(bytemuck::bytes_of(value));
    }

    fn raw(&mut self, value: &mut [u8]) {
        self.put(value);
    }

    fn bytes(&mut self, value: &mut Vec<u8>) {
        self.put_len(value.len());
        self.put(value);
    }

    fn string(&mut self, value: &mut String) {
        self.put_len(value.len());
        self.put(value.as_bytes());
    }

    fn pod_vec<T: Pod>(&mut self, value: &mut Vec<T>) {
        self.put_len(value.len());
        self.put(bytemuck::cast_slice(value.as_slice()));
    }

    fn reference<T: Counterpart>(&mut self, value: &mut <SimSide as SyncDomain>::Ref<T>) {
        let index = match T::resolve(value) {
            Some(core) => {
                let index = u32::try_from(self.objects.len()).unwrap_or(NULL_REF);
                self.objects.push(Some(Box::new(core)));
                index
            }
            None => NULL_REF,
        };
        self.put(bytemuck::bytes_of(&index));
    }
}

// ============================================================================
// READ (core side)
// ============================================================================

/// Reads fields back out of a snapshot block.
pub struct SyncReader<'a> {
    buf: &'a [u8],
    cursor: usize,
    objects: &'a mut [TransferSlot],
}

impl<'a> SyncReader<'a> {
    pub(crate) fn new(buf: &'a [u8], objects: &'a mut [TransferSlot]) -> Self {
        Self { buf, cursor: 0, objects }
    }

    /// Bytes consumed so far.
    #[inline]
    #[must_use]
    pub const fn consumed(&self) -> usize {
        self.cursor
    }

    /// Asserts the whole snapshot was consumed.
    ///
    /// # Panics
    ///
    /// Panics if bytes or transferred pointers remain. That means the reader
    /// and writer of this object disagree on its layout.
    pub(crate) fn finish(self) {
        assert_eq!(
            self.cursor,
            self.buf.len(),
            "Sync desync! Snapshot has {} bytes but reader consumed {}",
            self.buf.len(),
            self.cursor
        );
        assert!(
            self.objects.iter().all(Option::is_none),
            "Sync desync! Snapshot transferred objects that were never read"
        );
    }

    fn take(&mut self, len: usize) -> &'a [u8] {
        let end = self.cursor + len;
        assert!(
            end <= self.buf.len(),
            "Sync desync! Reading {} bytes at offset {} from a {} byte snapshot",
            len,
            self.cursor,
            self.buf.len()
        );
        let buf: &'a [u8] = self.buf;
        let bytes = &buf[self.cursor..end];
        self.cursor = end;
        bytes
    }

    fn take_len(&mut self) -> usize {
        bytemuck::pod_read_unaligned::<u32>(self.take(4)) as usize
    }
}

impl SyncStream<CoreSide> for SyncReader<'_> {
    const READING: bool = true;

    #[inline]
    fn pod<T: Pod>(&mut self, value: &mut T) {
        *value = bytemuck::pod_read_unaligned(self.take(std::mem::size_of::<T>()));
    }

    fn raw(&mut self, value: &mut [u8]) {
        value.copy_from_slice(self.take(value.len()));
    }

    fn bytes(&mut self, value: &mut Vec<u8>) {
        let len = self.take_len();
        value.clear();
        value.extend_from_slice(self.take(len));
    }

    fn string(&mut self, value: &mut String) {
        let len = self.take_len();
        match std::str::from_utf8(self.take(len)) {
            Ok(text) => {
                value.clear();
                value.push_str(text);
            }
            Err(_) => panic!("Sync desync! String field is not valid UTF-8"),
        }
    }

    fn pod_vec<T: Pod>(&mut self, value: &mut Vec<T>) {
        let len = self.take_len();
        let bytes = self.take(len * std::mem::size_of::<T>());
        *value = bytemuck::pod_collect_to_vec(bytes);
    }

    fn reference<T: Counterpart>(&mut self, value: &mut <CoreSide as SyncDomain>::Ref<T>) {
        let index = bytemuck::pod_read_unaligned::<u32>(self.take(4));
        if index == NULL_REF {
            *value = None;
            return;
        }

        let slot = self
            .objects
            .get_mut(index as usize)
            .and_then(Option::take)
            .unwrap_or_else(|| panic!("Sync desync! Transfer slot {index} missing or already taken"));

        match slot.downcast::<Arc<T::Core>>() {
            Ok(core) => *value = Some(*core),
            Err(_) => panic!(
                "Sync desync! Transfer slot {index} does not hold a {}",
                std::any::type_name::<T::Core>()
            ),
        }
    }
}

// ============================================================================
// DETACHED PAYLOAD
// ============================================================================

/// A self-contained write of one field set, read back exactly once.
///
/// Used where a snapshot never leaves the thread that made it, such as
/// recreating core state in place.
pub struct SyncPayload {
    bytes: Vec<u8>,
    objects: Vec<TransferSlot>,
}

impl SyncPayload {
    /// Sizes and writes `fields`.
    pub fn capture<F: SyncFields<SimSide>>(fields: &mut F) -> Self {
        let mut size = SizeStream::<SimSide>::new();
        fields.visit(&mut size);

        let mut bytes = vec![0u8; size.total()];
        let mut writer = SyncWriter::new(&mut bytes);
        fields.visit(&mut writer);
        let (written, objects) = writer.finish();
        debug_assert_eq!(written, bytes.len());
        Self { bytes, objects }
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reads the payload into `fields`.
    ///
    /// # Panics
    ///
    /// Panics if `fields` does not consume the payload exactly.
    pub fn restore<F: SyncFields<CoreSide>>(mut self, fields: &mut F) {
        let mut reader = SyncReader::new(&self.bytes, &mut self.objects);
        fields.visit(&mut reader);
        reader.finish();
    }
}

impl std::fmt::Debug for SyncPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncPayload")
            .field("bytes", &self.bytes.len())
            .field("objects", &self.objects.len())
            .finish()
    }
}
