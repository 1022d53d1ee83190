//! Built-in positioning sources.

mod fixed;
mod gpsd;

use std::sync::Arc;

use domain::services::PositioningSource;

use crate::config::{LocationConfig, SourceKind};

pub use fixed::FixedSource;
pub use gpsd::{decode_report, GpsdSource};

/// Builds the sources listed in the configuration, in order.
///
/// A `fixed` entry without coordinates is skipped; validation rejects that
/// combination before this is reached.
pub fn build_sources(config: &LocationConfig) -> Vec<Arc<dyn PositioningSource>> {
    let mut sources: Vec<Arc<dyn PositioningSource>> = Vec::with_capacity(config.sources.len());
    for kind in &config.sources {
        match kind {
            SourceKind::Gpsd => sources.push(Arc::new(GpsdSource::new(&config.gpsd_addr))),
            SourceKind::Fixed => match (config.fixed_latitude, config.fixed_longitude) {
                (Some(latitude), Some(longitude)) => {
                    sources.push(Arc::new(FixedSource::new(latitude, longitude)))
                }
                _ => tracing::warn!("Fixed source configured without coordinates, skipping"),
            },
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_build_sources_in_config_order() {
        let mut config = Config::load_for_test(&[]).unwrap().location;
        config.sources = vec![SourceKind::Fixed, SourceKind::Gpsd];
        config.fixed_latitude = Some(52.52);
        config.fixed_longitude = Some(13.405);

        let sources = build_sources(&config);
        let names: Vec<_> = sources.iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["fixed", "gpsd"]);
    }

    #[test]
    fn test_build_sources_skips_fixed_without_coordinates() {
        let mut config = Config::load_for_test(&[]).unwrap().location;
        config.sources = vec![SourceKind::Fixed];
        assert!(build_sources(&config).is_empty());
    }
}
