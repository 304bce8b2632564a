//! Folio Events - in-process notification channel
//!
//! Independently rendered views learn about changes they did not cause
//! through an [`EventChannel`]:
//! - `publish` delivers synchronously to every listener of a topic, in
//!   registration order, before returning
//! - one failing (or panicking) listener never suppresses delivery to others
//! - `subscribe` returns a [`Subscription`] that removes exactly its own
//!   registration
//!
//! # Example
//!
//! ```rust
//! use folio_events::{EventChannel, Topic};
//!
//! let channel = EventChannel::new();
//! let subscription = channel.subscribe(Topic::ARTIFACT_PERSISTED, |n| {
//!     println!("saved {:?}", n.payload);
//!     Ok(())
//! });
//!
//! let report = channel.publish(Topic::ARTIFACT_PERSISTED, Some("paper1.py".into()));
//! assert_eq!(report.delivered, 1);
//! subscription.unsubscribe();
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod channel;
mod topic;

pub use channel::{
    EventChannel, ListenerError, ListenerResult, PublishReport, Subscription, SubscriptionId,
};
pub use topic::{Notification, Topic};
