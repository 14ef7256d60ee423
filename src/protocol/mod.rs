pub mod event;
pub mod frame;

pub use event::StreamEvent;
pub use frame::FrameDecoder;
