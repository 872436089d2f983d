/*!
# Ember Renderer

Core of a small Vulkan-style renderer: GPU resource lifecycle and the
command-submission protocol.

This crate is platform-agnostic. Every GPU call goes through the
`GraphicsDevice` trait; the Vulkan implementation lives in
`ember_renderer_vulkan`.

## Architecture

- **device**: `GraphicsDevice` trait, typed handles and create-info types
- **command**: command pools/buffers, one-shot transient executor, per-frame stream
- **resource**: buffers, images, vertex layouts, meshes, descriptor resource sets
- **pipeline**: SPIR-V loading and the PBR render pipeline
- **loader**: OBJ geometry and JSON scene descriptions
- **scene**: pipelines built from a scene description, animation clock
- **config**: renderer configuration
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod device;
pub mod command;
pub mod resource;
pub mod pipeline;
pub mod loader;
pub mod scene;
pub mod config;

// Main ember namespace module
pub mod ember {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton
    pub use crate::engine::Engine;

    // Configuration
    pub use crate::config::RendererConfig;

    // Logging sub-module (types only, macros are exported at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    pub mod device {
        pub use crate::device::*;
    }

    pub mod command {
        pub use crate::command::*;
    }

    pub mod resource {
        pub use crate::resource::*;
    }

    pub mod pipeline {
        pub use crate::pipeline::*;
    }

    pub mod loader {
        pub use crate::loader::*;
    }

    pub mod scene {
        pub use crate::scene::*;
    }
}

// Re-export math library at crate root
pub use glam;
