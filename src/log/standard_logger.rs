//! The console logger backed by `log4rs`.
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::runtime::ConfigBuilder;
use log4rs::config::{Appender, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config;

#[cfg(feature = "progress_bar")]
use super::line_clearing_encoder::LineClearingEncoder;
use crate::log::{LogConfiguration, ModuleLogConfiguration};

// ISO 8601 timestamp, colored level, module path
const LOG_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%SZ)} {h({l})} {t} - {m}{n}";
const APPENDER_NAME: &str = "stderr";

impl From<&ModuleLogConfiguration> for Logger {
    fn from(module_config: &ModuleLogConfiguration) -> Self {
        Logger::builder().build(module_config.module.clone(), module_config.level)
    }
}

impl LogConfiguration {
    /// Installs (or reconfigures) the global logger to match this [`LogConfiguration`].
    ///
    /// Messages go to stderr so that a report written to stdout stays machine-readable.
    pub(in crate::log) fn set_config(&mut self) {
        let encoder = Box::new(PatternEncoder::new(LOG_PATTERN));
        #[cfg(feature = "progress_bar")]
        let encoder = Box::new(LineClearingEncoder::new(encoder));
        let console = ConsoleAppender::builder()
            .target(Target::Stderr)
            .encoder(encoder)
            .build();
        let mut builder: ConfigBuilder =
            Config::builder().appender(Appender::builder().build(APPENDER_NAME, Box::new(console)));

        for module_config in self.module_configurations.values() {
            builder = builder.logger(module_config.into());
        }

        let root = Root::builder()
            .appender(APPENDER_NAME)
            .build(self.global_log_level);
        let config = match builder.build(root) {
            Ok(config) => config,
            Err(e) => panic!("invalid logger configuration: {e}"),
        };

        match self.root_handle {
            Some(ref mut handle) => handle.set_config(config),
            None => match log4rs::init_config(config) {
                Ok(handle) => self.root_handle = Some(handle),
                // Another logger owns the global slot; honor the level at least.
                Err(_) => log::set_max_level(self.global_log_level),
            },
        }
    }
}
