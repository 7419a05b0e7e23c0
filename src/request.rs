//! Request abstraction consumed by the marshaling layer.
//!
//! A [`Request`] borrows its control buffer and SG fragments from the caller,
//! so the merge step can write results straight back into the caller's
//! memory. The receiving side builds a `Request` whose control buffer borrows
//! the embedded region of the wire buffer instead.
//!
//! # Example
//!
//! ```
//! use txnwire::request::{ControlOp, Request, SgList};
//!
//! let mut control = *b"0123456789ABCDEF";
//! let mut a = *b"AAAAAAAA";
//! let mut b = *b"BBBB";
//!
//! let mut sg = SgList::new();
//! sg.push(&mut a);
//! sg.push(&mut b);
//!
//! let request = Request::new(ControlOp::new(0x10, &mut control)).with_sg(sg);
//! assert_eq!(request.control().len(), 16);
//! assert_eq!(request.sg().unwrap().len(), 2);
//! ```

use std::sync::Arc;

use tokio::sync::Notify;

use crate::protocol::{attributes, Addressing, PacketStatus, Status};

/// The command payload of a request.
#[derive(Debug)]
pub struct ControlOp<'a> {
    /// Command opcode.
    pub opcode: u32,
    buffer: &'a mut [u8],
    /// Command-level status, set by the handler.
    pub status: Status,
    /// Command-level status qualifier.
    pub qualifier: u32,
}

impl<'a> ControlOp<'a> {
    /// Create a control operation over a caller-owned buffer.
    pub fn new(opcode: u32, buffer: &'a mut [u8]) -> Self {
        Self {
            opcode,
            buffer,
            status: Status::UNSUCCESSFUL,
            qualifier: 0,
        }
    }

    #[inline]
    pub fn buffer(&self) -> &[u8] {
        self.buffer
    }

    #[inline]
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        self.buffer
    }

    /// Control buffer length.
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Set status and qualifier together.
    pub fn set_status(&mut self, status: Status, qualifier: u32) {
        self.status = status;
        self.qualifier = qualifier;
    }
}

/// One scatter/gather fragment. A zero-length fragment terminates the list.
#[derive(Debug)]
pub struct SgFragment<'a> {
    data: &'a mut [u8],
}

impl<'a> SgFragment<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }

    /// Byte count of this fragment (the only thing that crosses the wire).
    #[inline]
    pub fn count(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_terminator(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.data
    }
}

/// Ordered list of fragments.
///
/// The list ends at the first zero-length fragment or at the end of the
/// vector, whichever comes first. Fragments after a terminator are never
/// transmitted.
#[derive(Debug, Default)]
pub struct SgList<'a> {
    fragments: Vec<SgFragment<'a>>,
}

impl<'a> SgList<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment borrowing `data`.
    pub fn push(&mut self, data: &'a mut [u8]) -> &mut Self {
        self.fragments.push(SgFragment::new(data));
        self
    }

    /// Append an explicit zero-length terminator.
    pub fn terminate(&mut self) -> &mut Self {
        self.fragments.push(SgFragment::new(&mut []));
        self
    }

    /// Raw entries, including any terminator and trailing entries.
    #[inline]
    pub fn entries(&self) -> &[SgFragment<'a>] {
        &self.fragments
    }

    #[inline]
    pub fn entries_mut(&mut self) -> &mut [SgFragment<'a>] {
        &mut self.fragments
    }

    /// Number of raw entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

impl<'a> FromIterator<&'a mut [u8]> for SgList<'a> {
    fn from_iter<I: IntoIterator<Item = &'a mut [u8]>>(iter: I) -> Self {
        Self {
            fragments: iter.into_iter().map(SgFragment::new).collect(),
        }
    }
}

/// Local completion-notification primitive.
///
/// Never crosses the wire: only the `COMPLETION_ARMED` attribute bit does,
/// and a receiver honors it only when it has its own `Completion`.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    notify: Arc<Notify>,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the waiter (stored as a permit if nobody waits yet).
    pub fn signal(&self) {
        self.notify.notify_one();
    }

    /// Wait until the request completes.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// A request: control operation, optional SG list, addressing and status.
#[derive(Debug)]
pub struct Request<'a> {
    control: ControlOp<'a>,
    sg: Option<SgList<'a>>,
    addressing: Addressing,
    attributes: u32,
    key_handle: u64,
    status: PacketStatus,
    completion: Option<Completion>,
}

impl<'a> Request<'a> {
    /// Create a request around a control operation.
    pub fn new(control: ControlOp<'a>) -> Self {
        Self {
            control,
            sg: None,
            addressing: Addressing::default(),
            attributes: 0,
            key_handle: 0,
            status: PacketStatus::unsuccessful(),
            completion: None,
        }
    }

    pub fn with_sg(mut self, sg: SgList<'a>) -> Self {
        self.sg = Some(sg);
        self
    }

    pub fn with_addressing(mut self, addressing: Addressing) -> Self {
        self.addressing = addressing;
        self
    }

    pub fn with_attributes(mut self, attributes: u32) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_key_handle(mut self, key_handle: u64) -> Self {
        self.key_handle = key_handle;
        self
    }

    /// Attach a completion primitive and set the armed attribute.
    pub fn with_completion(mut self, completion: Completion) -> Self {
        self.arm_completion(completion);
        self
    }

    #[inline]
    pub fn control(&self) -> &ControlOp<'a> {
        &self.control
    }

    #[inline]
    pub fn control_mut(&mut self) -> &mut ControlOp<'a> {
        &mut self.control
    }

    pub fn set_control(&mut self, control: ControlOp<'a>) {
        self.control = control;
    }

    #[inline]
    pub fn sg(&self) -> Option<&SgList<'a>> {
        self.sg.as_ref()
    }

    #[inline]
    pub fn sg_mut(&mut self) -> Option<&mut SgList<'a>> {
        self.sg.as_mut()
    }

    pub fn set_sg(&mut self, sg: Option<SgList<'a>>) {
        self.sg = sg;
    }

    #[inline]
    pub fn addressing(&self) -> Addressing {
        self.addressing
    }

    pub fn set_addressing(&mut self, addressing: Addressing) {
        self.addressing = addressing;
    }

    #[inline]
    pub fn attributes(&self) -> u32 {
        self.attributes
    }

    pub fn set_attributes(&mut self, attributes: u32) {
        self.attributes = attributes;
    }

    #[inline]
    pub fn key_handle(&self) -> u64 {
        self.key_handle
    }

    pub fn set_key_handle(&mut self, key_handle: u64) {
        self.key_handle = key_handle;
    }

    /// Packet-level status.
    #[inline]
    pub fn status(&self) -> PacketStatus {
        self.status
    }

    pub fn set_status(&mut self, status: PacketStatus) {
        self.status = status;
    }

    #[inline]
    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    /// Attach a completion primitive and set the armed attribute.
    pub fn arm_completion(&mut self, completion: Completion) {
        self.completion = Some(completion);
        self.attributes |= attributes::COMPLETION_ARMED;
    }

    /// Check whether a completion is armed and locally available.
    pub fn is_completion_armed(&self) -> bool {
        self.completion.is_some()
            && attributes::has_flag(self.attributes, attributes::COMPLETION_ARMED)
    }

    /// Signal the completion primitive if one is armed.
    pub(crate) fn signal_completion(&self) {
        if self.is_completion_armed() {
            if let Some(completion) = &self.completion {
                completion.signal();
            }
        }
    }
}
