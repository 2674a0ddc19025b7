//! Device facts and wall-clock time
//!
//! Both sit behind traits so backups made in tests carry fixed values.

use chrono::{DateTime, Utc};
use sysinfo::System;

use crate::models::DeviceInfo;

const UNKNOWN: &str = "unknown";

/// Describes the machine a backup is produced or restored on
pub trait DeviceInfoProvider: Send + Sync {
    fn device_info(&self) -> DeviceInfo;
}

/// Reads device facts from the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDeviceInfo;

impl DeviceInfoProvider for SystemDeviceInfo {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            model: device_model(),
            os_name: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            os_version: System::os_version()
                .or_else(System::kernel_version)
                .unwrap_or_else(|| UNKNOWN.to_string()),
            arch: std::env::consts::ARCH.to_string(),
            hostname: System::host_name().unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

/// Hardware product name where the platform exposes one
fn device_model() -> String {
    #[cfg(target_os = "linux")]
    {
        if let Ok(name) = std::fs::read_to_string("/sys/class/dmi/id/product_name") {
            let name = name.trim();
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Device provider returning a fixed description
#[derive(Debug, Clone, Default)]
pub struct FixedDeviceInfo(pub DeviceInfo);

impl DeviceInfoProvider for FixedDeviceInfo {
    fn device_info(&self) -> DeviceInfo {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_device_info_is_filled() {
        let info = SystemDeviceInfo.device_info();
        assert!(!info.model.is_empty());
        assert!(!info.os_name.is_empty());
        assert_eq!(info.arch, std::env::consts::ARCH);
    }

    #[test]
    fn test_fixed_device_info() {
        let info = DeviceInfo {
            model: "Rugged T10".into(),
            ..DeviceInfo::default()
        };
        assert_eq!(FixedDeviceInfo(info.clone()).device_info(), info);
    }
}
