/// Native OS probes used before falling back to shell pipelines
///
/// - SSH sessions from /proc/net/tcp and /proc/net/tcp6
/// - SoC temperature from the hwmon/thermal sensors sysinfo exposes
/// - Mount point usage from statvfs, with the same arithmetic as `df`

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use sysinfo::{Components, Disks};

use crate::core::metrics::CollectError;
use crate::utils::helpers::{count_established, df_usage_percent};

const PROC_NET_TABLES: &[&str] = &["net/tcp", "net/tcp6"];

/// Sensor labels tried in order when no sensor is configured
pub const SOC_SENSOR_LABELS: &[&str] =
    &["cpu_thermal", "cpu-thermal", "soc_thermal", "coretemp", "k10temp"];

#[cfg_attr(test, mockall::automock)]
pub trait NativeProbe {
    fn ssh_sessions(&self, port: u16) -> Result<u32, CollectError>;
    fn temperature(&self) -> Result<u32, CollectError>;
    fn usage_percent(&self, mount_point: &str) -> Result<u32, CollectError>;
}

pub struct SystemProbe {
    proc_root: PathBuf,
    sensor_label: Option<String>,
}

impl SystemProbe {
    /// `sensor_label` overrides the SoC label search
    pub fn new(sensor_label: Option<String>) -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            sensor_label,
        }
    }

    /// Read socket tables from another procfs root
    pub fn with_proc_root(mut self, proc_root: impl Into<PathBuf>) -> Self {
        self.proc_root = proc_root.into();
        self
    }
}

impl NativeProbe for SystemProbe {
    fn ssh_sessions(&self, port: u16) -> Result<u32, CollectError> {
        let mut found_table = false;
        let mut sessions = 0;

        for table in PROC_NET_TABLES {
            let path = self.proc_root.join(table);
            // tcp6 is absent on kernels built without IPv6
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            found_table = true;
            sessions += count_established(&content, port);
        }

        if !found_table {
            return Err(CollectError::Unavailable(format!(
                "no socket table under {}",
                self.proc_root.display()
            )));
        }

        Ok(sessions as u32)
    }

    fn temperature(&self) -> Result<u32, CollectError> {
        let components = Components::new_with_refreshed_list();
        let labels: Vec<&str> = components.list().iter().map(|c| c.label()).collect();

        let index = select_sensor(&labels, self.sensor_label.as_deref()).ok_or_else(|| {
            CollectError::Unavailable(format!(
                "no thermal sensor matching {} among [{}]",
                self.sensor_label.as_deref().unwrap_or("the SoC labels"),
                labels.join(", ")
            ))
        })?;
        let component = &components.list()[index];

        let celsius = component.temperature();
        if !celsius.is_finite() {
            return Err(CollectError::Unavailable(format!(
                "sensor {} returned no reading",
                component.label()
            )));
        }

        Ok(celsius.trunc().max(0.0) as u32)
    }

    fn usage_percent(&self, mount_point: &str) -> Result<u32, CollectError> {
        let path = Path::new(mount_point);

        // statvfs on an unmounted directory would report its parent filesystem
        let disks = Disks::new_with_refreshed_list();
        if !disks.list().iter().any(|disk| disk.mount_point() == path) {
            return Err(CollectError::Unavailable(format!(
                "no filesystem mounted at {}",
                mount_point
            )));
        }

        let (blocks, bfree, bavail) = statvfs_blocks(path)?;
        df_usage_percent(blocks, bfree, bavail).ok_or_else(|| {
            CollectError::Unavailable(format!("filesystem at {} reports zero size", mount_point))
        })
    }
}

/// Index of the sensor to read
///
/// A configured label matches case-insensitively as a substring. Without
/// one, the SoC labels are tried in order. `None` when nothing matches, so
/// the caller can fall back to the command source.
pub fn select_sensor(labels: &[&str], configured: Option<&str>) -> Option<usize> {
    let lowered: Vec<String> = labels.iter().map(|label| label.to_lowercase()).collect();
    let find = |needle: &str| {
        let needle = needle.to_lowercase();
        lowered.iter().position(|label| label.contains(&needle))
    };

    match configured {
        Some(label) => find(label),
        None => SOC_SENSOR_LABELS.iter().find_map(|label| find(label)),
    }
}

/// `(f_blocks, f_bfree, f_bavail)` for the filesystem holding `path`
fn statvfs_blocks(path: &Path) -> Result<(u64, u64, u64), CollectError> {
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        CollectError::Unavailable(format!("invalid mount point {}", path.display()))
    })?;

    let mut stat = std::mem::MaybeUninit::<libc::statvfs>::zeroed();
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if rc != 0 {
        return Err(CollectError::Unavailable(format!(
            "statvfs {}: {}",
            path.display(),
            io::Error::last_os_error()
        )));
    }
    let stat = unsafe { stat.assume_init() };

    Ok((
        stat.f_blocks as u64,
        stat.f_bfree as u64,
        stat.f_bavail as u64,
    ))
}
