use std::convert::TryFrom;
use tokio::time::Duration;

#[derive(Clone, Debug, Default)]
pub struct ControllerOptions {
    /// How long a reconciliation job waits before trying again when it couldn't finish.
    pub reconcile_retry_delay: Option<Duration>,
}

#[derive(Clone, Debug)]
pub(super) struct ControllerOptionsValidated {
    pub(super) reconcile_retry_delay: Duration,
}

impl ControllerOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        if self.reconcile_retry_delay == Duration::from_secs(0) {
            return Err("Reconcile retry delay must be non-zero");
        }

        Ok(())
    }
}

impl TryFrom<ControllerOptions> for ControllerOptionsValidated {
    type Error = &'static str;

    fn try_from(options: ControllerOptions) -> Result<Self, Self::Error> {
        let values = ControllerOptionsValidated {
            reconcile_retry_delay: options.reconcile_retry_delay.unwrap_or(Duration::from_secs(3)),
        };

        values.validate()?;
        Ok(values)
    }
}
