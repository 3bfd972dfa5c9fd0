//! Structures driving a whole simulation step.

pub use self::event_handler::{ChannelEventCollector, EventHandler};
pub use self::physics_hooks::{
    PairFilterContext, PhysicsHooks, PhysicsHooksFlags, ToiFilterContext,
};
pub use self::physics_pipeline::{shift_world, PhysicsPipeline};

mod event_handler;
mod physics_hooks;
mod physics_pipeline;
