//! Traits and helpers for handling the events generated by a step.

use crate::geometry::ContactEvent;

/// Receives the events buffered during a step.
///
/// Handlers run synchronously on the stepping thread, after the solver has
/// released every borrow of the world: they observe a consistent state and
/// must not call back into the stepping code.
pub trait EventHandler: Send + Sync {
    /// Handles one contact event.
    fn handle_contact_event(&self, event: ContactEvent);
}

impl EventHandler for () {
    fn handle_contact_event(&self, _event: ContactEvent) {}
}

/// An event handler pushing every event into a crossbeam channel.
///
/// The events can then be drained after the step, possibly from another
/// thread.
pub struct ChannelEventCollector {
    contact_events: crossbeam::channel::Sender<ContactEvent>,
}

impl ChannelEventCollector {
    /// Initializes a collector from the sending end of a contact-event
    /// channel.
    pub fn new(contact_events: crossbeam::channel::Sender<ContactEvent>) -> Self {
        Self { contact_events }
    }
}

impl EventHandler for ChannelEventCollector {
    fn handle_contact_event(&self, event: ContactEvent) {
        // The receiver being gone just means nobody cares about the events
        // anymore.
        let _ = self.contact_events.send(event);
    }
}
