/// Metrics collection for the dashboard
///
/// Three independent readings make up a snapshot:
/// - Established SSH sessions on the configured port
/// - SoC temperature in whole degrees Celsius
/// - Usage percentage of the OTG mount point
///
/// A failed reading degrades to 0 with a warning; it never aborts the run.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::probe::{NativeProbe, SystemProbe};
use crate::core::shell::{CommandRunner, ShellRunner};
use crate::utils::app_config::{MetricSource, MetricsConfig};
use crate::utils::helpers::{parse_count, parse_temperature, parse_usage};

/// One refresh cycle's measured state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub ssh_sessions: u32,
    pub temperature: u32,
    pub usage_percent: u32,
}

impl Snapshot {
    pub fn new(ssh_sessions: u32, temperature: u32, usage_percent: u32) -> Self {
        Self {
            ssh_sessions,
            temperature,
            usage_percent,
        }
    }

    /// Persisted form: session count, temperature, usage, in that order
    pub fn to_lines(&self) -> [String; 3] {
        [
            self.ssh_sessions.to_string(),
            self.temperature.to_string(),
            self.usage_percent.to_string(),
        ]
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ssh={} temp={} usage={}%",
            self.ssh_sessions, self.temperature, self.usage_percent
        )
    }
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process exited with {0}")]
    ExitStatus(i32),

    #[error("process was terminated by a signal")]
    Signaled,

    #[error("unparseable output {0:?}")]
    Parse(String),

    #[error("{0}")]
    Unavailable(String),
}

/// Outcome of a single metric collection
#[derive(Debug)]
pub enum Reading {
    Measured(u32),
    Degraded(CollectError),
}

impl Reading {
    /// Measured value, or 0 for a degraded reading
    pub fn value(&self) -> u32 {
        match self {
            Reading::Measured(value) => *value,
            Reading::Degraded(_) => 0,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Reading::Degraded(_))
    }
}

/// The three readings of one run
#[derive(Debug)]
pub struct Readings {
    pub ssh_sessions: Reading,
    pub temperature: Reading,
    pub usage_percent: Reading,
}

impl Readings {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.ssh_sessions.value(),
            self.temperature.value(),
            self.usage_percent.value(),
        )
    }

    /// Names of the metrics that fell back to 0
    pub fn degraded(&self) -> Vec<&'static str> {
        [
            (Metric::SshSessions, &self.ssh_sessions),
            (Metric::Temperature, &self.temperature),
            (Metric::OtgUsage, &self.usage_percent),
        ]
        .into_iter()
        .filter(|(_, reading)| reading.is_degraded())
        .map(|(metric, _)| metric.name())
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    SshSessions,
    Temperature,
    OtgUsage,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::SshSessions => "ssh_sessions",
            Metric::Temperature => "temperature",
            Metric::OtgUsage => "usage_percent",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Metric::SshSessions => "number of SSH connection(s)",
            Metric::Temperature => "temperature",
            Metric::OtgUsage => "OTG usage",
        }
    }
}

pub struct MetricsCollector {
    config: MetricsConfig,
    runner: Box<dyn CommandRunner>,
    probe: Box<dyn NativeProbe>,
}

impl MetricsCollector {
    pub fn new(config: MetricsConfig) -> Self {
        let probe = SystemProbe::new(config.temperature_sensor.clone());
        Self::with_sources(config, Box::new(ShellRunner), Box::new(probe))
    }

    pub fn with_sources(
        config: MetricsConfig,
        runner: Box<dyn CommandRunner>,
        probe: Box<dyn NativeProbe>,
    ) -> Self {
        Self {
            config,
            runner,
            probe,
        }
    }

    pub fn collect(&self) -> Readings {
        Readings {
            ssh_sessions: self.collect_ssh_count(),
            temperature: self.collect_temperature(),
            usage_percent: self.collect_otg_usage(),
        }
    }

    pub fn collect_ssh_count(&self) -> Reading {
        self.collect_metric(Metric::SshSessions)
    }

    pub fn collect_temperature(&self) -> Reading {
        self.collect_metric(Metric::Temperature)
    }

    pub fn collect_otg_usage(&self) -> Reading {
        self.collect_metric(Metric::OtgUsage)
    }

    fn collect_metric(&self, metric: Metric) -> Reading {
        let result = match self.config.source {
            MetricSource::Native => self.read_native(metric),
            MetricSource::Command => self.read_command(metric),
            MetricSource::Auto => self.read_native(metric).or_else(|err| {
                debug!("Native {} probe failed ({}), falling back to command", metric.name(), err);
                self.read_command(metric)
            }),
        };

        match result {
            Ok(value) => {
                debug!("{} = {}", metric.name(), value);
                Reading::Measured(value)
            }
            Err(err) => {
                warn!("Failed to get {}: {}", metric.description(), err);
                Reading::Degraded(err)
            }
        }
    }

    fn read_native(&self, metric: Metric) -> Result<u32, CollectError> {
        match metric {
            Metric::SshSessions => self.probe.ssh_sessions(self.config.ssh_port),
            Metric::Temperature => self.probe.temperature(),
            Metric::OtgUsage => self.probe.usage_percent(&self.config.mount_point),
        }
    }

    fn read_command(&self, metric: Metric) -> Result<u32, CollectError> {
        let script = match metric {
            Metric::SshSessions => self.config.ssh_command(),
            Metric::Temperature => self.config.temperature_command(),
            Metric::OtgUsage => self.config.usage_command(),
        };

        let output = self.runner.run(&script).map_err(|source| CollectError::Spawn {
            command: script.clone(),
            source,
        })?;

        match output.status {
            Some(0) => {}
            Some(code) => return Err(CollectError::ExitStatus(code)),
            None => return Err(CollectError::Signaled),
        }

        let parsed = match metric {
            Metric::SshSessions => parse_count(&output.stdout),
            Metric::Temperature => parse_temperature(&output.stdout),
            Metric::OtgUsage => parse_usage(&output.stdout),
        };

        parsed.ok_or_else(|| CollectError::Parse(output.stdout.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::probe::MockNativeProbe;
    use crate::core::shell::{CommandOutput, MockCommandRunner};
    use mockall::predicate::eq;

    fn output(status: i32, stdout: &str) -> CommandOutput {
        CommandOutput {
            status: Some(status),
            stdout: stdout.to_string(),
        }
    }

    fn command_collector(runner: MockCommandRunner) -> MetricsCollector {
        let config = MetricsConfig {
            source: MetricSource::Command,
            ..MetricsConfig::default()
        };
        MetricsCollector::with_sources(config, Box::new(runner), Box::new(MockNativeProbe::new()))
    }

    #[test]
    fn test_snapshot_lines_order() {
        let snapshot = Snapshot::new(2, 45, 37);
        assert_eq!(snapshot.to_lines(), ["2", "45", "37"]);
    }

    #[test]
    fn test_command_readings() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(eq("vcgencmd measure_temp"))
            .returning(|_| Ok(output(0, "temp=45.2'C\n")));
        runner
            .expect_run()
            .with(eq("df --output=pcent /otg | tail -n1"))
            .returning(|_| Ok(output(0, " 37%\n")));
        runner
            .expect_run()
            .returning(|_| Ok(output(0, "2\n")));

        let readings = command_collector(runner).collect();

        assert_eq!(readings.snapshot(), Snapshot::new(2, 45, 37));
        assert!(readings.degraded().is_empty());
    }

    #[test]
    fn test_non_zero_exit_degrades_to_zero() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_| Ok(output(1, "")));

        let collector = command_collector(runner);
        let reading = collector.collect_ssh_count();

        assert_eq!(reading.value(), 0);
        assert!(matches!(reading, Reading::Degraded(CollectError::ExitStatus(1))));
    }

    #[test]
    fn test_unparseable_output_degrades_to_zero() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_| Ok(output(0, "VCHI initialization failed\n")));

        let reading = command_collector(runner).collect_temperature();

        assert_eq!(reading.value(), 0);
        assert!(matches!(reading, Reading::Degraded(CollectError::Parse(_))));
    }

    #[test]
    fn test_spawn_failure_and_signal_degrade() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .times(1)
            .returning(|_| Err(std::io::Error::new(std::io::ErrorKind::NotFound, "sh")));
        runner.expect_run().returning(|_| {
            Ok(CommandOutput {
                status: None,
                stdout: String::new(),
            })
        });

        let collector = command_collector(runner);
        assert!(matches!(
            collector.collect_otg_usage(),
            Reading::Degraded(CollectError::Spawn { .. })
        ));
        assert!(matches!(
            collector.collect_otg_usage(),
            Reading::Degraded(CollectError::Signaled)
        ));
    }

    #[test]
    fn test_degraded_metrics_are_named() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(eq("vcgencmd measure_temp"))
            .returning(|_| Ok(output(127, "")));
        runner.expect_run().returning(|_| Ok(output(0, "5\n")));

        let readings = command_collector(runner).collect();

        assert_eq!(readings.degraded(), vec!["temperature"]);
        assert_eq!(readings.snapshot().temperature, 0);
    }

    #[test]
    fn test_auto_prefers_native_probe() {
        let mut probe = MockNativeProbe::new();
        probe.expect_ssh_sessions().with(eq(22u16)).returning(|_| Ok(3));
        let mut runner = MockCommandRunner::new();
        runner.expect_run().never();

        let collector =
            MetricsCollector::with_sources(MetricsConfig::default(), Box::new(runner), Box::new(probe));

        assert!(matches!(collector.collect_ssh_count(), Reading::Measured(3)));
    }

    #[test]
    fn test_auto_falls_back_to_command() {
        let mut probe = MockNativeProbe::new();
        probe
            .expect_usage_percent()
            .returning(|_| Err(CollectError::Unavailable("no disk mounted at /otg".to_string())));
        let mut runner = MockCommandRunner::new();
        runner.expect_run().times(1).returning(|_| Ok(output(0, "81%\n")));

        let collector =
            MetricsCollector::with_sources(MetricsConfig::default(), Box::new(runner), Box::new(probe));

        assert!(matches!(collector.collect_otg_usage(), Reading::Measured(81)));
    }

    #[test]
    fn test_auto_temperature_falls_back_without_soc_sensor() {
        let mut probe = MockNativeProbe::new();
        probe.expect_temperature().returning(|| {
            Err(CollectError::Unavailable(
                "no thermal sensor matching the SoC labels".to_string(),
            ))
        });
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(eq("vcgencmd measure_temp"))
            .times(1)
            .returning(|_| Ok(output(0, "temp=51.9'C\n")));

        let collector =
            MetricsCollector::with_sources(MetricsConfig::default(), Box::new(runner), Box::new(probe));

        assert!(matches!(collector.collect_temperature(), Reading::Measured(51)));
    }

    #[test]
    fn test_native_only_does_not_shell_out() {
        let mut probe = MockNativeProbe::new();
        probe
            .expect_temperature()
            .returning(|| Err(CollectError::Unavailable("no thermal sensor".to_string())));
        let mut runner = MockCommandRunner::new();
        runner.expect_run().never();

        let config = MetricsConfig {
            source: MetricSource::Native,
            ..MetricsConfig::default()
        };
        let collector = MetricsCollector::with_sources(config, Box::new(runner), Box::new(probe));

        assert_eq!(collector.collect_temperature().value(), 0);
    }
}
