use std::convert::TryFrom;
use tokio::time::Duration;

#[derive(Clone, Debug, Default)]
pub struct DatastoreClientOptions {
    /// Connect and read timeout for `ping()`.
    pub probe_timeout: Option<Duration>,
    /// Total attempts `run_command()` makes before giving up, including the first.
    pub max_attempts: Option<u32>,
    pub initial_backoff: Option<Duration>,
    pub backoff_multiplier: Option<f64>,
    pub max_backoff: Option<Duration>,
    pub keep_alive_interval: Option<Duration>,
}

#[derive(Clone, Debug)]
pub(crate) struct DatastoreClientOptionsValidated {
    pub(crate) probe_timeout: Duration,
    pub(crate) max_attempts: u32,
    pub(crate) initial_backoff: Duration,
    pub(crate) backoff_multiplier: f64,
    pub(crate) max_backoff: Duration,
    pub(crate) keep_alive_interval: Duration,
}

impl DatastoreClientOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        if self.probe_timeout == Duration::from_secs(0) {
            return Err("Probe timeout must be non-zero");
        }
        if self.max_attempts == 0 {
            return Err("Must make at least one attempt per command");
        }
        if !(self.backoff_multiplier >= 1.0) {
            return Err("Backoff multiplier must be at least 1.0");
        }
        if self.initial_backoff > self.max_backoff {
            return Err("Initial backoff must not exceed maximum backoff");
        }

        Ok(())
    }
}

impl TryFrom<DatastoreClientOptions> for DatastoreClientOptionsValidated {
    type Error = &'static str;

    fn try_from(options: DatastoreClientOptions) -> Result<Self, Self::Error> {
        let values = DatastoreClientOptionsValidated {
            probe_timeout: options.probe_timeout.unwrap_or(Duration::from_secs(10)),
            max_attempts: options.max_attempts.unwrap_or(5),
            initial_backoff: options.initial_backoff.unwrap_or(Duration::from_secs(1)),
            backoff_multiplier: options.backoff_multiplier.unwrap_or(1.5),
            max_backoff: options.max_backoff.unwrap_or(Duration::from_secs(30)),
            keep_alive_interval: options.keep_alive_interval.unwrap_or(Duration::from_secs(30)),
        };

        values.validate()?;
        Ok(values)
    }
}
