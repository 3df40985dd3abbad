//! Device context for logs
//!
//! When a phone and a watch node share one process (tests, the pairing
//! simulation) their log lines interleave. A [`DeviceContextGuard`] marks the
//! current thread as acting for one device; spans opened while it is active
//! carry that device (see [`crate::layers::DeviceContextLayer`]).

use std::cell::RefCell;

use memolink_core::DeviceRole;
use uuid::Uuid;

/// Device context stored in thread-local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceContextData {
    pub role: DeviceRole,
    /// Distinguishes restarts of the same device
    pub instance_id: Uuid,
}

thread_local! {
    static DEVICE_CONTEXT: RefCell<Option<DeviceContextData>> = const { RefCell::new(None) };
}

/// RAII guard setting the device context for the current thread
///
/// Dropping the guard restores whatever context was active before.
///
/// ```ignore
/// let _guard = DeviceContextGuard::new(DeviceRole::Watch);
/// let node = MemoNode::new(config, link).await?;
/// node.start().await?; // apply loop spans are tagged `watch`
/// ```
pub struct DeviceContextGuard {
    previous: Option<DeviceContextData>,
}

impl DeviceContextGuard {
    pub fn new(role: DeviceRole) -> Self {
        Self::with_instance_id(role, Uuid::new_v4())
    }

    pub fn with_instance_id(role: DeviceRole, instance_id: Uuid) -> Self {
        let next = DeviceContextData { role, instance_id };
        let previous = DEVICE_CONTEXT.with(|ctx| ctx.borrow_mut().replace(next));
        Self { previous }
    }

    pub fn current() -> Option<DeviceContextData> {
        DEVICE_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    pub fn current_role() -> Option<DeviceRole> {
        Self::current().map(|ctx| ctx.role)
    }
}

impl Drop for DeviceContextGuard {
    fn drop(&mut self) {
        DEVICE_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Run a block with a device context set
///
/// ```ignore
/// with_device_context!(DeviceRole::Phone, {
///     tracing::info!("Recording");
/// });
/// ```
#[macro_export]
macro_rules! with_device_context {
    ($role:expr, $body:block) => {{
        let _guard = $crate::context::DeviceContextGuard::new($role);
        $body
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_sets_and_clears() {
        assert!(DeviceContextGuard::current().is_none());
        {
            let _guard = DeviceContextGuard::new(DeviceRole::Phone);
            assert_eq!(DeviceContextGuard::current_role(), Some(DeviceRole::Phone));
        }
        assert!(DeviceContextGuard::current().is_none());
    }

    #[test]
    fn test_nested_guards_restore() {
        let _phone = DeviceContextGuard::new(DeviceRole::Phone);
        {
            let _watch = DeviceContextGuard::new(DeviceRole::Watch);
            assert_eq!(DeviceContextGuard::current_role(), Some(DeviceRole::Watch));
        }
        assert_eq!(DeviceContextGuard::current_role(), Some(DeviceRole::Phone));
    }

    #[test]
    fn test_instance_id_is_kept() {
        let instance_id = Uuid::new_v4();
        let _guard = DeviceContextGuard::with_instance_id(DeviceRole::Watch, instance_id);
        assert_eq!(DeviceContextGuard::current().unwrap().instance_id, instance_id);
    }

    #[test]
    fn test_macro() {
        let role = with_device_context!(DeviceRole::Watch, { DeviceContextGuard::current_role() });
        assert_eq!(role, Some(DeviceRole::Watch));
        assert!(DeviceContextGuard::current().is_none());
    }
}
