//! WebSocket protocol core (RFC 6455): framing, masking and the opening
//! handshake.

pub mod assembler;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;

pub use assembler::MessageAssembler;
pub use frame::Frame;
pub use handshake::{ServerHandshake, WS_GUID, accept_value, generate_key};
pub use mask::apply_mask;
pub use opcode::OpCode;
