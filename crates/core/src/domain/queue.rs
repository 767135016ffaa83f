// Queue Domain Model

use crate::domain::error::{DomainError, Result};
use std::collections::BTreeMap;
use std::time::Duration;

/// Queue identifier
pub type QueueName = String;

/// Maximum queue name length
pub const MAX_QUEUE_NAME_LEN: usize = 64;

/// Static configuration for one named queue.
///
/// Each processing stage has its own depth ceiling, batch size and TTL;
/// nothing here is global. Immutable once the registry is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDescriptor {
    pub name: QueueName,
    /// Admission ceiling. Enqueue is rejected once depth reaches this.
    pub max_depth: u64,
    /// Items claimed per worker tick.
    pub batch_size: usize,
    /// Queue expiry, refreshed on every successful append.
    pub ttl: Duration,
    /// Lifetime of the claim lease.
    pub lock_timeout: Duration,
}

impl QueueDescriptor {
    pub fn new(
        name: impl Into<String>,
        max_depth: u64,
        batch_size: usize,
        ttl: Duration,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            max_depth,
            batch_size,
            ttl,
            lock_timeout,
        }
    }

    /// Check descriptor invariants
    pub fn validate(&self) -> Result<()> {
        validate_queue_name(&self.name)?;

        let invalid = |reason: &str| DomainError::InvalidDescriptor {
            queue: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.max_depth == 0 {
            return Err(invalid("max_depth must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size must be at least 1"));
        }
        if self.ttl.is_zero() {
            return Err(invalid("ttl must be positive"));
        }
        if self.lock_timeout.is_zero() {
            return Err(invalid("lock_timeout must be positive"));
        }
        Ok(())
    }

    pub fn ttl_millis(&self) -> i64 {
        self.ttl.as_millis() as i64
    }

    pub fn lock_timeout_millis(&self) -> i64 {
        self.lock_timeout.as_millis() as i64
    }
}

/// Validate a queue name (non-empty, bounded, `[A-Za-z0-9_.-]`)
pub fn validate_queue_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DomainError::InvalidQueueName(
            "queue name cannot be empty".to_string(),
        ));
    }
    if name.len() > MAX_QUEUE_NAME_LEN {
        return Err(DomainError::InvalidQueueName(format!(
            "queue name exceeds {} chars: {}",
            MAX_QUEUE_NAME_LEN, name
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(DomainError::InvalidQueueName(format!(
            "queue name has invalid characters: {}",
            name
        )));
    }
    Ok(())
}

/// Immutable table of queue descriptors, keyed by name.
///
/// Built once at startup and shared by `Arc` with every component.
#[derive(Debug, Clone, Default)]
pub struct QueueRegistry {
    queues: BTreeMap<QueueName, QueueDescriptor>,
}

impl QueueRegistry {
    /// Build a registry, validating every descriptor
    pub fn new(descriptors: impl IntoIterator<Item = QueueDescriptor>) -> Result<Self> {
        let mut queues = BTreeMap::new();
        for descriptor in descriptors {
            descriptor.validate()?;
            if queues.contains_key(&descriptor.name) {
                return Err(DomainError::DuplicateQueue(descriptor.name));
            }
            queues.insert(descriptor.name.clone(), descriptor);
        }
        Ok(Self { queues })
    }

    pub fn get(&self, name: &str) -> Result<&QueueDescriptor> {
        self.queues
            .get(name)
            .ok_or_else(|| DomainError::UnknownQueue(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.queues.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueDescriptor> {
        self.queues.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.queues.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str) -> QueueDescriptor {
        QueueDescriptor::new(
            name,
            3,
            2,
            Duration::from_secs(60),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_validate_queue_name_empty() {
        let result = validate_queue_name("");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_queue_name_too_long() {
        assert!(validate_queue_name(&"q".repeat(65)).is_err());
        assert!(validate_queue_name(&"q".repeat(64)).is_ok());
    }

    #[test]
    fn test_validate_queue_name_invalid_chars() {
        assert!(validate_queue_name("webhook events").is_err());
        assert!(validate_queue_name("webhook:events").is_err());
        assert!(validate_queue_name("webhook.events-v2_raw").is_ok());
    }

    #[test]
    fn test_descriptor_rejects_zero_limits() {
        let mut d = descriptor("ingest");
        d.max_depth = 0;
        assert!(d.validate().is_err());

        let mut d = descriptor("ingest");
        d.batch_size = 0;
        assert!(d.validate().is_err());

        let mut d = descriptor("ingest");
        d.ttl = Duration::ZERO;
        assert!(d.validate().is_err());

        let mut d = descriptor("ingest");
        d.lock_timeout = Duration::ZERO;
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_registry_lookup() {
        let registry = QueueRegistry::new(vec![descriptor("ingest"), descriptor("notify")]).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("ingest").unwrap().max_depth, 3);
        assert!(matches!(
            registry.get("missing"),
            Err(DomainError::UnknownQueue(_))
        ));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["ingest", "notify"]);
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let result = QueueRegistry::new(vec![descriptor("ingest"), descriptor("ingest")]);
        assert!(matches!(result, Err(DomainError::DuplicateQueue(_))));
    }
}
