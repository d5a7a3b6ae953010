//! Reassembly of fragmented data messages (RFC 6455 section 5.4).

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::message::{Message, MessageKind};
use crate::protocol::{Frame, OpCode};

/// Reassembles Text/Binary messages from a run of data frames.
///
/// Control frames may arrive between fragments; they are not fed here.
#[derive(Debug)]
pub struct MessageAssembler {
    buffer: BytesMut,
    fragment_count: usize,
    kind: Option<MessageKind>,
    limits: Limits,
}

impl MessageAssembler {
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            fragment_count: 0,
            kind: None,
            limits,
        }
    }

    /// Add a data frame to the message being assembled.
    /// Returns `Some(message)` when the frame carries FIN.
    ///
    /// # Errors
    ///
    /// - `Error::ProtocolError` for a continuation with nothing to continue, a
    ///   new Text/Binary frame in the middle of a fragment run, or a control
    ///   frame
    /// - `Error::MessageTooLarge` / `Error::TooManyFragments` past the limits
    pub fn push(&mut self, frame: Frame) -> Result<Option<Message>> {
        if frame.opcode.is_control() {
            return Err(Error::ProtocolError(format!(
                "{} frame passed to message assembler",
                frame.opcode
            )));
        }

        match (frame.opcode, self.kind) {
            (OpCode::Continuation, None) => {
                return Err(Error::ProtocolError("Unexpected continuation frame".into()));
            }
            (OpCode::Continuation, Some(_)) => {}
            (_, Some(_)) => {
                return Err(Error::ProtocolError("Expected continuation frame".into()));
            }
            (opcode, None) => {
                let kind = MessageKind::from_opcode(opcode).unwrap_or(MessageKind::Binary);
                // Unfragmented messages skip the buffer entirely.
                if frame.fin {
                    self.limits.check_message_size(frame.payload().len())?;
                    return Ok(Some(Message::new(kind, frame.into_payload())));
                }
                self.kind = Some(kind);
            }
        }

        self.limits
            .check_fragment_count(self.fragment_count + 1)?;
        self.limits
            .check_message_size(self.buffer.len() + frame.payload().len())?;

        self.buffer.extend_from_slice(frame.payload());
        self.fragment_count += 1;

        if !frame.fin {
            return Ok(None);
        }
        let data = self.buffer.split().freeze();
        let kind = self.kind.take().unwrap_or(MessageKind::Binary);
        self.fragment_count = 0;
        Ok(Some(Message::new(kind, data)))
    }

}
