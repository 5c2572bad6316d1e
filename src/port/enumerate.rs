//! Port discovery.
//!
//! Discovery is delegated to whatever directory the platform keeps of its
//! serial devices. The core only needs a flat list of names, so the source is
//! pluggable behind [`PortEnumerator`]; registry-style sources implement the
//! narrower [`DeviceRegistry`].

use super::error::PortError;
use std::io;
use tracing::debug;

/// One named value from a device registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Driver-specific key, e.g. `\Device\Serial0`.
    pub name: String,
    /// The port name, e.g. `COM1`.
    pub value: String,
}

/// A directory of serial devices that can be counted and read by index.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceRegistry {
    fn entry_count(&self) -> io::Result<usize>;

    fn entry(&self, index: usize) -> io::Result<RegistryEntry>;
}

/// Read every entry of `registry`, returning the port names.
///
/// Any failure aborts the whole listing with [`PortError::EnumerationFailed`].
pub fn list_registry_ports<R>(registry: &R) -> Result<Vec<String>, PortError>
where
    R: DeviceRegistry + ?Sized,
{
    let count = registry.entry_count().map_err(PortError::EnumerationFailed)?;
    (0..count)
        .map(|index| registry.entry(index).map(|entry| entry.value))
        .collect::<io::Result<Vec<_>>>()
        .map_err(PortError::EnumerationFailed)
}

/// Source of known port names.
pub trait PortEnumerator {
    /// The complete list of port names, or an error. Never a partial list.
    fn port_names(&self) -> Result<Vec<String>, PortError>;
}

/// Enumerates through a [`DeviceRegistry`].
#[derive(Debug)]
pub struct RegistryEnumerator<R> {
    registry: R,
}

impl<R: DeviceRegistry> RegistryEnumerator<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }
}

impl<R: DeviceRegistry> PortEnumerator for RegistryEnumerator<R> {
    fn port_names(&self) -> Result<Vec<String>, PortError> {
        list_registry_ports(&self.registry)
    }
}

/// The platform's own discovery mechanism.
///
/// On Windows this reads `HKLM\HARDWARE\DEVICEMAP\SERIALCOMM`; elsewhere it
/// uses the `serialport` crate's device scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnumerator;

impl PortEnumerator for SystemEnumerator {
    #[cfg(windows)]
    fn port_names(&self) -> Result<Vec<String>, PortError> {
        let key = super::native::SerialCommKey::open().map_err(PortError::EnumerationFailed)?;
        list_registry_ports(&key)
    }

    #[cfg(not(windows))]
    fn port_names(&self) -> Result<Vec<String>, PortError> {
        serialport::available_ports()
            .map(|ports| ports.into_iter().map(|port| port.port_name).collect())
            .map_err(|err| PortError::EnumerationFailed(err.into()))
    }
}

/// A fixed list of names.
#[derive(Debug, Clone, Default)]
pub struct StaticEnumerator {
    names: Vec<String>,
}

impl StaticEnumerator {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl PortEnumerator for StaticEnumerator {
    fn port_names(&self) -> Result<Vec<String>, PortError> {
        Ok(self.names.clone())
    }
}

/// List the serial ports currently known to the system.
pub fn list_ports() -> Result<Vec<String>, PortError> {
    let names = SystemEnumerator.port_names()?;
    debug!(count = names.len(), "Enumerated serial ports");
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::error::ErrorKind;
    use mockall::predicate::eq;

    fn entry(index: usize) -> RegistryEntry {
        RegistryEntry {
            name: format!("\\Device\\Serial{index}"),
            value: format!("COM{}", index + 1),
        }
    }

    #[test]
    fn test_lists_every_entry_value() {
        let mut registry = MockDeviceRegistry::new();
        registry.expect_entry_count().times(1).returning(|| Ok(3));
        registry
            .expect_entry()
            .times(3)
            .returning(|index| Ok(entry(index)));

        let names = RegistryEnumerator::new(registry).port_names().unwrap();
        assert_eq!(names, vec!["COM1", "COM2", "COM3"]);
    }

    #[test]
    fn test_empty_registry() {
        let mut registry = MockDeviceRegistry::new();
        registry.expect_entry_count().returning(|| Ok(0));
        registry.expect_entry().never();

        assert!(list_registry_ports(&registry).unwrap().is_empty());
    }

    #[test]
    fn test_count_failure() {
        let mut registry = MockDeviceRegistry::new();
        registry
            .expect_entry_count()
            .returning(|| Err(io::ErrorKind::PermissionDenied.into()));
        registry.expect_entry().never();

        let err = list_registry_ports(&registry).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EnumerationFailed);
    }

    #[test]
    fn test_entry_failure_discards_partial_list() {
        let mut registry = MockDeviceRegistry::new();
        registry.expect_entry_count().returning(|| Ok(3));
        registry
            .expect_entry()
            .with(eq(0))
            .returning(|index| Ok(entry(index)));
        registry
            .expect_entry()
            .with(eq(1))
            .returning(|_| Err(io::Error::from_raw_os_error(259)));
        registry.expect_entry().with(eq(2)).never();

        let err = list_registry_ports(&registry).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EnumerationFailed);
        assert_eq!(err.io_error().and_then(io::Error::raw_os_error), Some(259));
    }

    #[test]
    fn test_static_enumerator() {
        let enumerator = StaticEnumerator::new(["ttyS0", "ttyUSB0"]);
        assert_eq!(enumerator.port_names().unwrap(), vec!["ttyS0", "ttyUSB0"]);
    }
}
