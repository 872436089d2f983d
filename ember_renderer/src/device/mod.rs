/// Graphics device module - the device trait, typed handles, and descriptor types

pub mod graphics_device;
pub mod handle;
pub mod memory;
pub mod image;
pub mod command;
pub mod descriptor;
pub mod pipeline;

pub use self::graphics_device::*;
pub use self::handle::*;
pub use self::memory::*;
pub use self::image::*;
pub use self::command::*;
pub use self::descriptor::*;
pub use self::pipeline::*;

// Resource-tracking mock device for tests (no GPU required)
#[cfg(test)]
pub mod mock_device;
