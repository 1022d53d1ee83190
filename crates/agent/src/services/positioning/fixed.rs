use std::time::Duration;

use async_trait::async_trait;
use domain::models::LocationSample;
use domain::services::{PositionEvent, PositioningError, PositioningSource, UpdatePolicy};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

const NAME: &str = "fixed";

/// Reports a configured coordinate, once per policy interval.
///
/// For stationary installations without a receiver.
#[derive(Debug, Clone)]
pub struct FixedSource {
    latitude: f64,
    longitude: f64,
}

impl FixedSource {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[async_trait]
impl PositioningSource for FixedSource {
    fn name(&self) -> &str {
        NAME
    }

    async fn subscribe(
        &self,
        policy: UpdatePolicy,
    ) -> Result<mpsc::Receiver<PositionEvent>, PositioningError> {
        let (tx, rx) = mpsc::channel(4);
        let (latitude, longitude) = (self.latitude, self.longitude);
        let period = policy.min_interval.max(Duration::from_secs(1));

        tokio::spawn(async move {
            if tx
                .send(PositionEvent::ProviderEnabled(NAME.to_string()))
                .await
                .is_err()
            {
                return;
            }

            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let fix = LocationSample::from_provider(NAME, latitude, longitude, None);
                if tx.send(PositionEvent::Fix(fix)).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_source_emits_configured_point() {
        let source = FixedSource::new(52.52, 13.405);
        let mut rx = source.subscribe(UpdatePolicy::default()).await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(PositionEvent::ProviderEnabled("fixed".into()))
        );
        match rx.recv().await {
            Some(PositionEvent::Fix(sample)) => {
                assert_eq!(sample.latitude, 52.52);
                assert_eq!(sample.longitude, 13.405);
                assert_eq!(sample.source_name(), "fixed");
                assert!(sample.accuracy.is_none());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
