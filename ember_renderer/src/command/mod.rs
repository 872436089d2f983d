/// Command recording and submission: pools, transient executor, per-frame stream

pub mod command_buffer;
pub mod layout;
pub mod transient;
pub mod stream;

pub use command_buffer::{CommandBuffer, CommandBufferState, CommandPool};
pub use layout::{layout_transition, transition_aspect, transition_barrier, TransitionMasks};
pub use transient::{TransientCommandExecutor, TransientSubmission};
pub use stream::{FrameSync, PersistentCommandStream, RenderTarget};
