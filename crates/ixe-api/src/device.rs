//! The device control API trait.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::DeviceResult;
use crate::path::ObjectPath;

/// Operations the topology client needs from the device.
///
/// Implementations translate the three calls into whatever the transport
/// speaks and classify failures into [`DeviceError`](crate::DeviceError).
/// Each call is a blocking request from the caller's point of view; any
/// timeout is the implementation's and must surface as a
/// `TransportFailure` with `timed_out` set.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Reads one member of an object.
    async fn get(&self, path: &ObjectPath, member: &str) -> DeviceResult<String>;

    /// Writes one member of an object.
    async fn set(&self, path: &ObjectPath, member: &str, value: &str) -> DeviceResult<()>;

    /// Runs a stateless command (`get`, `add`, `del`, `import`, `reset`, ...).
    async fn invoke(
        &self,
        path: &ObjectPath,
        command: &str,
        args: &[String],
    ) -> DeviceResult<String>;

    /// Returns true if the transport accepts overlapping calls.
    ///
    /// When false, callers that issue requests concurrently must go through
    /// [`Serialized`].
    fn supports_concurrent_calls(&self) -> bool {
        false
    }
}

#[async_trait]
impl<T: DeviceApi + ?Sized> DeviceApi for Arc<T> {
    async fn get(&self, path: &ObjectPath, member: &str) -> DeviceResult<String> {
        (**self).get(path, member).await
    }

    async fn set(&self, path: &ObjectPath, member: &str, value: &str) -> DeviceResult<()> {
        (**self).set(path, member, value).await
    }

    async fn invoke(
        &self,
        path: &ObjectPath,
        command: &str,
        args: &[String],
    ) -> DeviceResult<String> {
        (**self).invoke(path, command, args).await
    }

    fn supports_concurrent_calls(&self) -> bool {
        (**self).supports_concurrent_calls()
    }
}

/// Funnels every call through a single async mutex.
///
/// Wrapping a transport that cannot take overlapping calls lets callers
/// schedule requests concurrently while the transport still sees them one
/// at a time, in the order the lock is granted.
pub struct Serialized<A> {
    inner: A,
    gate: Mutex<()>,
}

impl<A: DeviceApi> Serialized<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            gate: Mutex::new(()),
        }
    }

    /// Returns the wrapped transport.
    pub fn inner(&self) -> &A {
        &self.inner
    }
}

#[async_trait]
impl<A: DeviceApi> DeviceApi for Serialized<A> {
    async fn get(&self, path: &ObjectPath, member: &str) -> DeviceResult<String> {
        let _guard = self.gate.lock().await;
        self.inner.get(path, member).await
    }

    async fn set(&self, path: &ObjectPath, member: &str, value: &str) -> DeviceResult<()> {
        let _guard = self.gate.lock().await;
        self.inner.set(path, member, value).await
    }

    async fn invoke(
        &self,
        path: &ObjectPath,
        command: &str,
        args: &[String],
    ) -> DeviceResult<String> {
        let _guard = self.gate.lock().await;
        tracing::trace!(object = %path, command = %command, "Serialized invoke");
        self.inner.invoke(path, command, args).await
    }

    fn supports_concurrent_calls(&self) -> bool {
        true
    }
}
