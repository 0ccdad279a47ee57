//! Key/value settings handed over by a host property system, and their
//! application onto a [`BlurConfig`].

use ahash::{HashMap, HashMapExt};

use crate::config::{BlurConfig, BlurFamily, BlurVariant, ConfigError};

pub const SETTING_BLUR_ALGORITHM: &str = "blur_algorithm";
pub const SETTING_BLUR_TYPE: &str = "blur_type";
pub const SETTING_RADIUS: &str = "radius";
pub const SETTING_PASSES: &str = "passes";
pub const SETTING_DIRECTION: &str = "direction";
pub const SETTING_CENTER_X: &str = "center_x";
pub const SETTING_CENTER_Y: &str = "center_y";
pub const SETTING_TILT_SHIFT_TOP: &str = "tilt_shift_top";
pub const SETTING_TILT_SHIFT_BOTTOM: &str = "tilt_shift_bottom";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    Int(i64),
    Float(f64),
}

impl SettingValue {
    fn as_f64(self) -> f64 {
        match self {
            SettingValue::Int(value) => value as f64,
            SettingValue::Float(value) => value,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: HashMap<String, SettingValue>,
}

impl Settings {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn set_int(&mut self, key: &str, value: i64) -> &mut Self {
        self.values.insert(key.to_owned(), SettingValue::Int(value));
        self
    }

    pub fn set_float(&mut self, key: &str, value: f64) -> &mut Self {
        self.values.insert(key.to_owned(), SettingValue::Float(value));
        self
    }

    pub fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.get(key).copied()
    }

    pub fn remove(&mut self, key: &str) -> Option<SettingValue> {
        self.values.remove(key)
    }

    fn int(&self, key: &str) -> Result<Option<i64>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(SettingValue::Int(value)) => Ok(Some(value)),
            Some(SettingValue::Float(_)) => Err(ConfigError::WrongType {
                key: key.to_owned(),
                expected: "an integer",
            }),
        }
    }

    fn float(&self, key: &str) -> Option<f32> {
        self.get(key).map(|value| value.as_f64() as f32)
    }
}

impl BlurConfig {
    /// Apply every recognized key present in `settings`.
    ///
    /// Validation happens before anything is written, so on error the config
    /// is exactly as it was. Absent keys keep their current values.
    pub fn apply_settings(&mut self, settings: &Settings) -> Result<(), ConfigError> {
        let family = match settings.int(SETTING_BLUR_ALGORITHM)? {
            Some(id) => BlurFamily::from_id(id).ok_or(ConfigError::UnknownFamily(id))?,
            None => self.family(),
        };
        let variant = match settings.int(SETTING_BLUR_TYPE)? {
            Some(id) => BlurVariant::from_id(id).ok_or(ConfigError::UnknownVariant(id))?,
            None => self.variant(),
        };
        let passes = settings.int(SETTING_PASSES)?;

        let mut next = self.clone();
        next.set_blur(family, variant)?;

        if let Some(radius) = settings.float(SETTING_RADIUS) {
            next.set_radius(radius);
        }
        if let Some(passes) = passes {
            next.set_passes(passes.clamp(0, u32::MAX as i64) as u32);
        }
        if let Some(angle) = settings.float(SETTING_DIRECTION) {
            next.set_angle(angle);
        }
        let (center_x, center_y) = next.center();
        next.set_center(
            settings.float(SETTING_CENTER_X).unwrap_or(center_x),
            settings.float(SETTING_CENTER_Y).unwrap_or(center_y),
        );
        let (top, bottom) = next.tilt_shift();
        next.set_tilt_shift(
            settings.float(SETTING_TILT_SHIFT_TOP).unwrap_or(top),
            settings.float(SETTING_TILT_SHIFT_BOTTOM).unwrap_or(bottom),
        );

        *self = next;
        Ok(())
    }
}
