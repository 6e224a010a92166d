//! Runtime configuration and plugin settings

pub mod dictionary;
pub mod settings;

pub use dictionary::{
    SettingDictionary, SettingInfo, SettingInfoMap, SettingValue, ValidatingSettingDictionary,
};
pub use settings::PipelineSettings;
