//! Configuration validation for [`SeismicConfig`]
//!
//! Returns every violated rule rather than stopping at the first one, so a
//! caller wiring up a field's options from an untrusted config file can
//! report all of them in one pass.

use super::cluster::SeismicConfig;

/// One violated validation rule, as a human-readable message.
pub fn validate(config: &SeismicConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if config.n_postings == 0 {
        errors.push("n_postings must be greater than 0".to_string());
    }

    if !(config.summary_prune_ratio > 0.0 && config.summary_prune_ratio <= 1.0) {
        errors.push(format!(
            "summary_prune_ratio must be in (0, 1], got {}",
            config.summary_prune_ratio
        ));
    }

    if !(config.cluster_ratio > 0.0 && config.cluster_ratio < 1.0) {
        errors.push(format!("cluster_ratio must be in (0, 1), got {}", config.cluster_ratio));
    }

    // approximate_threshold is a u32, so it is never negative; nothing else
    // to check there.

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> SeismicConfig {
        SeismicConfig {
            n_postings: 100,
            summary_prune_ratio: 0.5,
            cluster_ratio: 0.1,
            approximate_threshold: 10,
        }
    }

    #[test]
    fn valid_config_has_no_errors() {
        assert!(validate(&valid_config()).is_empty());
    }

    #[test]
    fn zero_n_postings_is_rejected() {
        let mut config = valid_config();
        config.n_postings = 0;
        assert_eq!(validate(&config).len(), 1);
    }

    #[test]
    fn summary_prune_ratio_out_of_range_is_rejected() {
        let mut config = valid_config();
        config.summary_prune_ratio = 0.0;
        assert_eq!(validate(&config).len(), 1);

        let mut config = valid_config();
        config.summary_prune_ratio = 1.5;
        assert_eq!(validate(&config).len(), 1);
    }

    #[test]
    fn summary_prune_ratio_of_one_is_allowed() {
        let mut config = valid_config();
        config.summary_prune_ratio = 1.0;
        assert!(validate(&config).is_empty());
    }

    #[test]
    fn cluster_ratio_of_one_is_rejected() {
        let mut config = valid_config();
        config.cluster_ratio = 1.0;
        assert_eq!(validate(&config).len(), 1);
    }

    #[test]
    fn cluster_ratio_of_zero_is_rejected_by_validation_even_though_the_algorithm_accepts_it() {
        let mut config = valid_config();
        config.cluster_ratio = 0.0;
        assert_eq!(validate(&config).len(), 1);
    }

    #[test]
    fn multiple_violations_are_all_reported() {
        let config = SeismicConfig {
            n_postings: 0,
            summary_prune_ratio: 0.0,
            cluster_ratio: 1.0,
            approximate_threshold: 0,
        };
        assert_eq!(validate(&config).len(), 3);
    }
}
