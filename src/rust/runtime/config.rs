// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::fail::Fail,
    threads::policy::SchedulingPolicy,
};
use ::std::{
    fs,
    ops::Index,
    str::FromStr,
};
use ::yaml_rust::{
    Yaml,
    YamlLoader,
};

//======================================================================================================================
// Constants
//======================================================================================================================

// Scheduler options.
mod scheduler_config {
    pub const SECTION_NAME: &str = "scheduler";
    // Dispatch policy: "priority" or "lottery".
    pub const SCHEDULING_POLICY: &str = "scheduling_policy";
    // Ticks between two timer interrupts.
    pub const TIMER_INTERVAL: &str = "timer_interval";
    // Ticks charged to the clock for every dispatch of a thread.
    pub const TICKS_PER_DISPATCH: &str = "ticks_per_dispatch";
    // Seed of the lottery draw.
    pub const RNG_SEED: &str = "rng_seed";
}

/// Default ticks between two timer interrupts.
const DEFAULT_TIMER_INTERVAL: u64 = 500;
/// Default ticks charged for a dispatch.
const DEFAULT_TICKS_PER_DISPATCH: u64 = 10;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Scheduler configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Yaml);

//======================================================================================================================
// Associated Functions
//======================================================================================================================

/// Common associated functions for the scheduler configuration object.
impl Config {
    /// Reads a configuration file into a [Config] object.
    pub fn new(config_path: &str) -> Result<Self, Fail> {
        let config_s: String = match fs::read_to_string(config_path) {
            Ok(s) => s,
            Err(e) => {
                let cause: String = format!("cannot read configuration file (path={:?}): {}", config_path, e);
                error!("new(): {}", cause);
                return Err(Fail::new(e.raw_os_error().unwrap_or(libc::EIO), &cause));
            },
        };
        Self::from_yaml_str(&config_s)
    }

    /// Parses a configuration from a YAML document.
    pub fn from_yaml_str(config_s: &str) -> Result<Self, Fail> {
        let config: Vec<Yaml> = match YamlLoader::load_from_str(config_s) {
            Ok(config) => config,
            Err(e) => {
                let cause: String = format!("malformed configuration: {}", e);
                error!("from_yaml_str(): {}", cause);
                return Err(Fail::new(libc::EINVAL, &cause));
            },
        };
        let config_obj: &Yaml = match &config[..] {
            &[ref c] => c,
            _ => return Err(Fail::new(libc::EINVAL, "Wrong number of config objects")),
        };

        Ok(Self { 0: config_obj.clone() })
    }

    fn get_scheduler_config(&self) -> Option<&Yaml> {
        match self.0.index(scheduler_config::SECTION_NAME) {
            Yaml::Hash(_) => Some(self.0.index(scheduler_config::SECTION_NAME)),
            _ => None,
        }
    }

    /// Reads the dispatch policy from the environment variable first and then the underlying configuration file.
    pub fn scheduling_policy(&self) -> Result<SchedulingPolicy, Fail> {
        if let Some(policy) = Self::get_typed_env_option(scheduler_config::SCHEDULING_POLICY)? {
            return Ok(policy);
        }
        match self.get_scheduler_config() {
            Some(section) => match Self::get_optional(section, scheduler_config::SCHEDULING_POLICY) {
                Some(_) => Self::get_typed_str_option(section, scheduler_config::SCHEDULING_POLICY, |s| {
                    SchedulingPolicy::from_str(s).ok()
                }),
                None => Ok(SchedulingPolicy::default()),
            },
            None => Ok(SchedulingPolicy::default()),
        }
    }

    /// Ticks between two timer interrupts.
    pub fn timer_interval(&self) -> Result<u64, Fail> {
        let interval: u64 = self.get_u64_or(scheduler_config::TIMER_INTERVAL, DEFAULT_TIMER_INTERVAL)?;
        if interval == 0 {
            let message: String = format!("parameter \"{}\" must be positive", scheduler_config::TIMER_INTERVAL);
            return Err(Fail::new(libc::ERANGE, message.as_str()));
        }
        Ok(interval)
    }

    /// Ticks charged to the clock for every dispatch.
    pub fn ticks_per_dispatch(&self) -> Result<u64, Fail> {
        self.get_u64_or(scheduler_config::TICKS_PER_DISPATCH, DEFAULT_TICKS_PER_DISPATCH)
    }

    /// Seed of the lottery draw. Reads the environment variable first and then the underlying configuration file. No
    /// seed means that the draw is seeded from entropy.
    pub fn rng_seed(&self) -> Result<Option<u64>, Fail> {
        if let Some(seed) = Self::get_typed_env_option(scheduler_config::RNG_SEED)? {
            return Ok(Some(seed));
        }
        match self.get_scheduler_config() {
            Some(section) => match Self::get_optional(section, scheduler_config::RNG_SEED) {
                Some(_) => Ok(Some(Self::get_int_option(section, scheduler_config::RNG_SEED)?)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    fn get_u64_or(&self, index: &str, default: u64) -> Result<u64, Fail> {
        match self.get_scheduler_config() {
            Some(section) => match Self::get_optional(section, index) {
                Some(_) => Self::get_int_option(section, index),
                None => Ok(default),
            },
            None => Ok(default),
        }
    }

    //======================================================================================================================
    // Static Functions
    //======================================================================================================================

    /// Index `yaml` to find the value at `index`, returning `None` when it is absent.
    fn get_optional<'a>(yaml: &'a Yaml, index: &str) -> Option<&'a Yaml> {
        match yaml.index(index) {
            Yaml::BadValue => None,
            value => Some(value),
        }
    }

    /// Index `yaml` to find the value at `index`, validating that the index exists.
    fn get_option<'a>(yaml: &'a Yaml, index: &str) -> Result<&'a Yaml, Fail> {
        match Self::get_optional(yaml, index) {
            Some(value) => Ok(value),
            None => {
                let message: String = format!("missing configuration option \"{}\"", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
        }
    }

    /// Index `yaml` to find the value at `index`, validating that it exists and that the receiver returns Some(_).
    fn get_typed_option<'a, T, Fn>(yaml: &'a Yaml, index: &str, receiver: Fn) -> Result<T, Fail>
    where
        Fn: FnOnce(&'a Yaml) -> Option<T>,
    {
        let option: &'a Yaml = Self::get_option(yaml, index)?;
        match receiver(option) {
            Some(value) => Ok(value),
            None => {
                let message: String = format!("parameter {} has unexpected type", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
        }
    }

    /// Index `yaml` to find value at `index`, validating it as a string.
    fn get_typed_str_option<T, Fn>(yaml: &Yaml, index: &str, parser: Fn) -> Result<T, Fail>
    where
        Fn: FnOnce(&str) -> Option<T>,
    {
        let option: &Yaml = Self::get_option(yaml, index)?;
        if let Some(value) = option.as_str() {
            if let Some(value) = parser(value) {
                return Ok(value);
            }
        }
        let message: String = format!("parameter {} has unexpected type", index);
        Err(Fail::new(libc::EINVAL, message.as_str()))
    }

    /// Get value where the environment value overrides the config file if it exists.
    fn get_typed_env_option<T: FromStr>(index: &str) -> Result<Option<T>, Fail> {
        // Check for the environment variable.
        if let Ok(var) = ::std::env::var(index.to_uppercase()) {
            if let Ok(value) = var.as_str().parse() {
                return Ok(Some(value));
            } else {
                let message: String = format!("parameter {} has unexpected type", index);
                return Err(Fail::new(libc::EINVAL, message.as_str()));
            }
        }
        Ok(None)
    }

    /// Similar to `get_typed_option` using `Yaml::as_i64` as the receiver, but additionally verifies that the
    /// destination type may hold the i64 value.
    fn get_int_option<T: TryFrom<i64>>(yaml: &Yaml, index: &str) -> Result<T, Fail> {
        let val: i64 = Self::get_typed_option(yaml, index, &Yaml::as_i64)?;
        match T::try_from(val) {
            Ok(val) => Ok(val),
            _ => {
                let message: String = format!("parameter \"{}\" is out of range", index);
                Err(Fail::new(libc::ERANGE, message.as_str()))
            },
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for Config {
    fn default() -> Self {
        Self(Yaml::Null)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
