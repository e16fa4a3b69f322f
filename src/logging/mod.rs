//! Structured logging setup
//!
//! The reconciler logs through `tracing` with structured fields
//! (`policy_set`, `step`, `transaction_id`, `items`, `succeeded`) inside a
//! per-run span carrying a `run_id`. This module turns [`LoggingConfig`]
//! into subscriber filter directives.
//!
//! [`LoggingConfig`]: crate::config::LoggingConfig

/// Build filter directives string from LoggingConfig
///
/// Constructs a tracing filter string that includes the base log level
/// and any component-specific log levels configured in the LoggingConfig.
/// Components are sorted so the output is stable.
///
/// # Examples
///
/// ```
/// use policyset::config::logging::{LogFormat, LoggingConfig};
/// use policyset::logging::build_filter_directives;
/// use std::collections::HashMap;
///
/// let mut component_levels = HashMap::new();
/// component_levels.insert("reconciler".to_string(), "debug".to_string());
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Pretty,
///     component_levels: Some(component_levels),
///     log_batch_bodies: false,
/// };
///
/// let filter_str = build_filter_directives(&config);
/// assert_eq!(filter_str, "info,policyset::reconciler=debug");
/// ```
pub fn build_filter_directives(config: &crate::config::LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    if let Some(component_levels) = &config.component_levels {
        let mut components: Vec<_> = component_levels.iter().collect();
        components.sort();
        for (component, level) in components {
            filter_str.push_str(&format!(",policyset::{}={}", component, level));
        }
    }

    filter_str
}
