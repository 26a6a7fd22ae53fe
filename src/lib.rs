use config::{Config, ConfigError};
use serde::Deserialize;

pub mod application;
pub mod domain;
pub mod infrastructure;

#[derive(Clone, Debug, Deserialize)]
pub struct HotelierConfig {
    pub web: Web,
    #[serde(default)]
    pub maintenance: Maintenance,
    pub logger: Logger,
}

impl HotelierConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(config::File::with_name("hotelier.toml"))
            .add_source(config::Environment::with_prefix("HOTELIER").separator("__"))
            .build()?
            .try_deserialize::<HotelierConfig>()?
            .validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        self.maintenance.validate()?;
        Ok(self)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Web {
    pub address: String,
    pub tls: Option<Tls>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Tls {
    pub cert: String,
    pub key: String,
}

/// 定期点検の設定
#[derive(Clone, Debug, Deserialize)]
pub struct Maintenance {
    /// この日数点検されていない客室に点検作業を登録する
    pub inspection_interval_days: i64,
    /// 点検登録の実行間隔（秒）
    pub sweep_period_secs: u64,
}

impl Maintenance {
    /// 点検間隔の上限（100年）
    pub const MAX_INSPECTION_INTERVAL_DAYS: i64 = 36_500;

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=Self::MAX_INSPECTION_INTERVAL_DAYS).contains(&self.inspection_interval_days) {
            return Err(ConfigError::Message(format!(
                "maintenance.inspection_interval_days must be between 1 and {}",
                Self::MAX_INSPECTION_INTERVAL_DAYS
            )));
        }
        if self.sweep_period_secs == 0 {
            return Err(ConfigError::Message(
                "maintenance.sweep_period_secs must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for Maintenance {
    fn default() -> Self {
        Self {
            inspection_interval_days: 30,
            sweep_period_secs: 60 * 60,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Logger {
    pub level: Level,
}

#[derive(Clone, Debug, Deserialize)]
pub enum Level {
    TRACE,
    DEBUG,
    INFO,
    WARN,
    ERROR,
}

impl From<&Level> for tracing::Level {
    fn from(value: &Level) -> Self {
        match value {
            Level::TRACE => tracing::Level::TRACE,
            Level::DEBUG => tracing::Level::DEBUG,
            Level::INFO => tracing::Level::INFO,
            Level::WARN => tracing::Level::WARN,
            Level::ERROR => tracing::Level::ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, FileFormat};

    use super::*;

    #[test]
    fn test_config_deserialize() {
        let config = Config::builder()
            .add_source(config::File::from_str(
                r#"
                [web]
                address = "127.0.0.1:8080"

                [logger]
                level = "DEBUG"
                "#,
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize::<HotelierConfig>()
            .unwrap();
        assert_eq!(config.web.address, "127.0.0.1:8080");
        assert!(config.web.tls.is_none());
        assert_eq!(config.maintenance.inspection_interval_days, 30);
        assert_eq!(tracing::Level::from(&config.logger.level), tracing::Level::DEBUG);
        assert!(config.validated().is_ok());
    }

    #[test]
    fn test_maintenance_bounds() {
        let zero_period = Maintenance {
            sweep_period_secs: 0,
            ..Default::default()
        };
        assert!(zero_period.validate().is_err());
        for days in [0, -1, i64::MAX] {
            let interval = Maintenance {
                inspection_interval_days: days,
                ..Default::default()
            };
            assert!(interval.validate().is_err());
        }
        assert!(Maintenance::default().validate().is_ok());
    }
}
