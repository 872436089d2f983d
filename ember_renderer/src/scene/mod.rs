//! Scene: pipelines built from a scene description, plus animation time

mod clock;
mod scene;

pub use clock::AnimationClock;
pub use scene::Scene;
