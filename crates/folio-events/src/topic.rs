//! Topics and notifications

use std::borrow::Cow;
use std::fmt;

/// Notification topic
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic(Cow<'static, str>);

impl Topic {
    /// An artifact was written to the artifacts collection (payload: artifact name)
    pub const ARTIFACT_PERSISTED: Topic = Topic(Cow::Borrowed("artifact-persisted"));

    /// The active model configuration changed (no payload)
    pub const CONFIGURATION_CHANGED: Topic = Topic(Cow::Borrowed("configuration-changed"));

    /// Create a topic from any name
    #[inline]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Topic name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Topic {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for Topic {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A published notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub topic: Topic,
    pub payload: Option<String>,
}

impl Notification {
    /// Create new notification
    #[inline]
    #[must_use]
    pub fn new(topic: Topic, payload: Option<String>) -> Self {
        Self { topic, payload }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_topic_names() {
        assert_eq!(Topic::ARTIFACT_PERSISTED.as_str(), "artifact-persisted");
        assert_eq!(Topic::CONFIGURATION_CHANGED.as_str(), "configuration-changed");
    }

    #[test]
    fn borrowed_and_owned_topics_compare_equal() {
        assert_eq!(Topic::from("artifact-persisted"), Topic::ARTIFACT_PERSISTED);
        assert_eq!(
            Topic::from("configuration-changed".to_string()),
            Topic::CONFIGURATION_CHANGED
        );
    }
}
