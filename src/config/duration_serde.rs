//! Common serde utilities for human-readable durations across configuration.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::{fmt, time::Duration};

struct DurationVisitor;

impl<'de> Visitor<'de> for DurationVisitor {
    type Value = Duration;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(
            "a duration as seconds (number) or human-readable string (e.g., '500ms', '30s', '1m')",
        )
    }

    fn visit_u64<E>(self, seconds: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Duration::from_secs(seconds))
    }

    // TOML integers arrive as i64
    fn visit_i64<E>(self, seconds: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        u64::try_from(seconds)
            .map(Duration::from_secs)
            .map_err(|_| de::Error::custom(format!("Duration cannot be negative: {seconds}")))
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        humantime::parse_duration(value)
            .map_err(|e| de::Error::custom(format!("Invalid duration '{value}': {e}")))
    }
}

/// Custom serde functions for Duration that support human-readable strings
pub mod duration {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration_str = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&duration_str)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(DurationVisitor)
    }
}

/// Custom serde functions for Option<Duration> that support human-readable strings
pub mod option_duration {
    use super::*;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => {
                let duration_str = humantime::format_duration(*d).to_string();
                serializer.serialize_some(&duration_str)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OptionDurationVisitor;

        impl<'de> Visitor<'de> for OptionDurationVisitor {
            type Value = Option<Duration>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter
                    .write_str("null or a duration as seconds (number) or human-readable string")
            }

            fn visit_none<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(None)
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(None)
            }

            fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: Deserializer<'de>,
            {
                super::duration::deserialize(deserializer).map(Some)
            }
        }

        deserializer.deserialize_option(OptionDurationVisitor)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        #[serde(with = "super::duration")]
        timeout: Duration,
        #[serde(default, with = "super::option_duration")]
        grace: Option<Duration>,
    }

    #[test]
    fn parses_human_readable_strings() {
        let sample: Sample = toml::from_str("timeout = \"1m 30s\"\ngrace = \"250ms\"").unwrap();
        assert_eq!(sample.timeout, Duration::from_secs(90));
        assert_eq!(sample.grace, Some(Duration::from_millis(250)));
    }

    #[test]
    fn parses_integer_seconds() {
        let sample: Sample = toml::from_str("timeout = 45").unwrap();
        assert_eq!(sample.timeout, Duration::from_secs(45));
        assert_eq!(sample.grace, None);

        let from_json: Sample = serde_json::from_str(r#"{"timeout": 5, "grace": null}"#).unwrap();
        assert_eq!(from_json.timeout, Duration::from_secs(5));
        assert_eq!(from_json.grace, None);
    }

    #[test]
    fn rejects_garbage_and_negative_values() {
        assert!(toml::from_str::<Sample>("timeout = \"soon\"").is_err());
        assert!(toml::from_str::<Sample>("timeout = -3").is_err());
    }

    #[test]
    fn serializes_back_to_human_readable() {
        let sample = Sample {
            timeout: Duration::from_secs(30),
            grace: None,
        };
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["timeout"], "30s");
    }
}
