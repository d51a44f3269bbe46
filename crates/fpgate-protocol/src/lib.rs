pub mod codec;
pub mod command;
pub mod event;
pub mod parser;

pub use codec::SensorLineCodec;
pub use command::Command;
pub use event::{DiscardReason, Event, ParseOutcome, Response, ResponseKind};
pub use parser::parse_line;
