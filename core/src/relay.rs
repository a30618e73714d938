use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{HeaterError, Result};

/// sysfs GPIO line number; add the gpiochip base when the kernel numbers lines from an offset.
pub const GPIO_PIN: u32 = 18;
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// The heater relay. Every operation is idempotent.
pub trait Relay: Send {
    fn initialize(&mut self) -> Result<()>;
    fn turn_on(&mut self) -> Result<()>;
    fn turn_off(&mut self) -> Result<()>;
    /// Last state that was successfully commanded.
    fn is_on(&self) -> bool;
    fn shutdown(&mut self) -> Result<()>;
}

/// Relay on a GPIO line driven through the Linux sysfs interface.
#[derive(Debug)]
pub struct SysfsRelay {
    root: PathBuf,
    pin: u32,
    on: bool,
    exported: bool,
}

impl SysfsRelay {
    pub fn new(root: impl Into<PathBuf>, pin: u32) -> Self {
        SysfsRelay {
            root: root.into(),
            pin,
            on: false,
            exported: false,
        }
    }

    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin))
    }

    fn write(&self, path: &Path, value: &str) -> Result<()> {
        fs::write(path, value).map_err(|source| HeaterError::Gpio {
            pin: self.pin,
            source,
        })
    }

    fn set_level(&mut self, on: bool) -> Result<()> {
        self.write(&self.pin_dir().join("value"), if on { "1" } else { "0" })?;
        self.on = on;
        Ok(())
    }
}

impl Relay for SysfsRelay {
    fn initialize(&mut self) -> Result<()> {
        if !self.pin_dir().exists() {
            self.write(&self.root.join("export"), &self.pin.to_string())?;
            self.exported = true;
        }
        self.write(&self.pin_dir().join("direction"), "out")?;
        self.set_level(false)?;
        info!(pin = self.pin, "relay pin initialized");
        Ok(())
    }

    fn turn_on(&mut self) -> Result<()> {
        self.set_level(true)
    }

    fn turn_off(&mut self) -> Result<()> {
        self.set_level(false)
    }

    fn is_on(&self) -> bool {
        self.on
    }

    fn shutdown(&mut self) -> Result<()> {
        self.set_level(false)?;
        if self.exported {
            self.write(&self.root.join("unexport"), &self.pin.to_string())?;
            self.exported = false;
        }
        info!(pin = self.pin, "relay pin released");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MockRelayState {
    on: AtomicBool,
    initialized: AtomicBool,
    on_commands: AtomicUsize,
    off_commands: AtomicUsize,
}

/// In-memory relay for development machines and tests. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockRelay {
    state: Arc<MockRelayState>,
}

impl MockRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.initialized.load(Ordering::SeqCst)
    }

    pub fn on_commands(&self) -> usize {
        self.state.on_commands.load(Ordering::SeqCst)
    }

    pub fn off_commands(&self) -> usize {
        self.state.off_commands.load(Ordering::SeqCst)
    }
}

impl Relay for MockRelay {
    fn initialize(&mut self) -> Result<()> {
        self.state.on.store(false, Ordering::SeqCst);
        self.state.initialized.store(true, Ordering::SeqCst);
        info!("mock relay initialized");
        Ok(())
    }

    fn turn_on(&mut self) -> Result<()> {
        self.state.on.store(true, Ordering::SeqCst);
        self.state.on_commands.fetch_add(1, Ordering::SeqCst);
        debug!("mock relay on");
        Ok(())
    }

    fn turn_off(&mut self) -> Result<()> {
        self.state.on.store(false, Ordering::SeqCst);
        self.state.off_commands.fetch_add(1, Ordering::SeqCst);
        debug!("mock relay off");
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.state.on.load(Ordering::SeqCst)
    }

    fn shutdown(&mut self) -> Result<()> {
        self.turn_off()?;
        self.state.initialized.store(false, Ordering::SeqCst);
        info!("mock relay shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(path: PathBuf) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn sysfs_relay_drives_value_file() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("gpio18")).unwrap();

        let mut relay = SysfsRelay::new(root.path(), 18);
        relay.initialize().unwrap();
        assert_eq!(read(root.path().join("gpio18/direction")), "out");
        assert_eq!(read(root.path().join("gpio18/value")), "0");
        assert!(!relay.is_on());

        relay.turn_on().unwrap();
        relay.turn_on().unwrap();
        assert_eq!(read(root.path().join("gpio18/value")), "1");
        assert!(relay.is_on());

        relay.shutdown().unwrap();
        assert_eq!(read(root.path().join("gpio18/value")), "0");
        assert!(!relay.is_on());
        // Already exported by someone else, so we leave it.
        assert!(!root.path().join("unexport").exists());
    }

    #[test]
    fn sysfs_relay_exports_missing_pin() {
        let root = tempfile::tempdir().unwrap();
        let mut relay = SysfsRelay::new(root.path(), 18);
        // No kernel behind the temp dir, so the pin directory never appears.
        assert!(relay.initialize().is_err());
        assert_eq!(read(root.path().join("export")), "18");
    }

    #[test]
    fn sysfs_relay_uses_line_number_verbatim() {
        // BCM 18 on a gpiochip based at 512.
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("gpio530")).unwrap();
        let mut relay = SysfsRelay::new(root.path(), 530);
        relay.initialize().unwrap();
        relay.turn_on().unwrap();
        assert_eq!(read(root.path().join("gpio530/value")), "1");
        assert!(!root.path().join("gpio18").exists());
    }

    #[test]
    fn sysfs_relay_fails_off_target() {
        let mut relay = SysfsRelay::new("/nonexistent/gpio", 18);
        let err = relay.initialize().unwrap_err();
        assert!(matches!(err, HeaterError::Gpio { pin: 18, .. }));
        assert!(!relay.is_on());
    }

    #[test]
    fn failed_write_keeps_last_state() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("gpio18")).unwrap();
        let mut relay = SysfsRelay::new(root.path(), 18);
        relay.initialize().unwrap();
        relay.turn_on().unwrap();

        fs::remove_dir_all(root.path().join("gpio18")).unwrap();
        assert!(relay.turn_off().is_err());
        assert!(relay.is_on());
    }

    #[test]
    fn mock_relay_shares_state_between_clones() {
        let observer = MockRelay::new();
        let mut relay = observer.clone();
        relay.initialize().unwrap();
        assert!(observer.is_initialized());

        relay.turn_on().unwrap();
        assert!(observer.is_on());
        relay.turn_off().unwrap();
        relay.turn_off().unwrap();
        assert!(!observer.is_on());
        assert_eq!(observer.on_commands(), 1);
        assert_eq!(observer.off_commands(), 2);

        relay.shutdown().unwrap();
        assert!(!observer.is_initialized());
    }
}
