//! Optimization profile registry.
//!
//! Every module is compiled once per profile in use. Profiles produce
//! incompatible output, so artifacts always carry the profile they were
//! built under and are never combined across profiles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::options::ConfigValue;

/// A built-in optimization profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Profile {
    /// No optimization; debuggable output.
    None,
    /// Whitespace-only minification.
    Whitespace,
    /// Full minification and dead-code elimination.
    Advanced,
}

impl Profile {
    /// All profiles, in registry order.
    pub const ALL: [Profile; 3] = [Profile::None, Profile::Whitespace, Profile::Advanced];

    /// Profile name as used on the command line and in artifact paths.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Whitespace => "whitespace",
            Self::Advanced => "advanced",
        }
    }

    /// Base compiler options for this profile.
    pub fn base_config(&self) -> ConfigValue {
        match self {
            Self::None => ConfigValue::map([
                (":optimizations", ConfigValue::from(":none")),
                (":source-map", ConfigValue::Bool(true)),
            ]),
            Self::Whitespace => ConfigValue::map([
                (":optimizations", ConfigValue::from(":whitespace")),
                (":source-map", ConfigValue::Bool(true)),
            ]),
            Self::Advanced => ConfigValue::map([
                (":optimizations", ConfigValue::from(":advanced")),
                (":source-map", ConfigValue::Bool(true)),
                (
                    ":closure-defines",
                    ConfigValue::map([("goog.DEBUG", false)]),
                ),
                (":elide-asserts", ConfigValue::Bool(true)),
                (":output-wrapper", ConfigValue::Bool(true)),
            ]),
        }
    }

    /// Base options merged with call-site overrides.
    pub fn config(&self, overrides: &ConfigValue) -> ConfigValue {
        self.base_config().merged_with(overrides)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "whitespace" => Ok(Self::Whitespace),
            "advanced" => Ok(Self::Advanced),
            other => Err(Error::UnknownProfile(other.to_string())),
        }
    }
}

impl TryFrom<String> for Profile {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Resolve a profile by name and merge `overrides` over its base options.
pub fn resolve(profile_name: &str, overrides: &ConfigValue) -> Result<ConfigValue> {
    let profile: Profile = profile_name.parse()?;
    Ok(profile.config(overrides))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_unknown_profile() {
        let err = resolve("fast", &ConfigValue::empty_map()).unwrap_err();
        assert!(matches!(err, Error::UnknownProfile(name) if name == "fast"));
    }

    #[test]
    fn test_profile_names_round_trip() {
        for profile in Profile::ALL {
            assert_eq!(profile.name().parse::<Profile>().unwrap(), profile);
            assert_eq!(profile.to_string(), profile.name());
        }
    }

    #[test]
    fn test_profiles_differ() {
        let none = Profile::None.base_config();
        let whitespace = Profile::Whitespace.base_config();
        let advanced = Profile::Advanced.base_config();

        assert_eq!(none.get(":optimizations"), Some(&ConfigValue::from(":none")));
        assert_eq!(
            whitespace.get(":optimizations"),
            Some(&ConfigValue::from(":whitespace"))
        );
        assert_eq!(
            advanced.get(":optimizations"),
            Some(&ConfigValue::from(":advanced"))
        );

        for config in [&none, &whitespace, &advanced] {
            assert_eq!(config.get(":source-map"), Some(&ConfigValue::Bool(true)));
        }

        assert_eq!(advanced.get(":elide-asserts"), Some(&ConfigValue::Bool(true)));
        assert_eq!(advanced.get(":output-wrapper"), Some(&ConfigValue::Bool(true)));
        assert!(none.get(":elide-asserts").is_none());
    }

    #[test]
    fn test_resolve_merges_nested_defines() {
        let overrides = ConfigValue::map([(
            ":closure-defines",
            ConfigValue::map([("app.config/API", "https://api.example.com")]),
        )]);

        let config = resolve("advanced", &overrides).unwrap();
        let defines = config.get(":closure-defines").unwrap();
        assert_eq!(defines.get("goog.DEBUG"), Some(&ConfigValue::Bool(false)));
        assert!(defines.get("app.config/API").is_some());
        assert_eq!(config.get(":optimizations"), Some(&ConfigValue::from(":advanced")));
    }

    #[test]
    fn test_override_replaces_scalar() {
        let overrides = ConfigValue::map([(":source-map", false)]);
        let config = resolve("whitespace", &overrides).unwrap();
        assert_eq!(config.get(":source-map"), Some(&ConfigValue::Bool(false)));
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Profile::Whitespace).unwrap();
        assert_eq!(json, "\"whitespace\"");
        let parsed: Profile = serde_json::from_str("\"advanced\"").unwrap();
        assert_eq!(parsed, Profile::Advanced);

        let err = serde_json::from_str::<Profile>("\"fast\"").unwrap_err();
        assert!(err.to_string().contains("unknown profile 'fast'"));
    }
}
