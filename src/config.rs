// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// This module handles loading and parsing configuration from config.toml.
// Provides sensible defaults if config file is missing or has errors.
// Resource sizes that the pipeline never grows on its own (swapchain image
// count, descriptor pool capacity) live here so changing them is a config edit.

use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::ffi::CString;
use std::path::Path;

use crate::backend::device::SelectionPolicy;
use crate::error::BootstrapError;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub application: ApplicationConfig,
    pub window: WindowConfig,
    pub debug: DebugConfig,
    pub device: DeviceConfig,
    pub swapchain: SwapchainConfig,
    pub descriptors: DescriptorConfig,
}

/// Application identity reported to the driver
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub name: String,
    pub version: [u32; 3],
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Hello!".to_string(),
            version: [1, 0, 0],
        }
    }
}

impl ApplicationConfig {
    pub fn packed_version(&self) -> u32 {
        let [major, minor, patch] = self.version;
        vk::make_api_version(0, major, minor, patch)
    }
}

/// Window settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan Bootstrap".to_string(),
            width: 1920,
            height: 1080,
        }
    }
}

/// Debug settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Enable `layers` and the debug messenger
    pub validation_layers: bool,
    pub layers: Vec<String>,
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: false,
            layers: vec!["VK_LAYER_KHRONOS_validation".to_string()],
            log_level: "info".to_string(),
        }
    }
}

impl DebugConfig {
    /// Layer names to enable; empty unless validation is switched on
    pub fn enabled_layers(&self) -> Vec<CString> {
        if !self.validation_layers {
            return Vec::new();
        }
        self.layers
            .iter()
            .filter_map(|name| match CString::new(name.as_str()) {
                Ok(layer) => Some(layer),
                Err(_) => {
                    log::warn!("Ignoring layer name with interior NUL: {:?}", name);
                    None
                }
            })
            .collect()
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or_else(|_| {
            log::warn!("Unknown log level '{}', defaulting to INFO", self.log_level);
            log::LevelFilter::Info
        })
    }
}

/// Physical/logical device settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub selection: String,
    pub sampler_anisotropy: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            selection: "ranked".to_string(),
            sampler_anisotropy: true,
        }
    }
}

impl DeviceConfig {
    pub fn selection_policy(&self) -> SelectionPolicy {
        match self.selection.to_lowercase().as_str() {
            "ranked" => SelectionPolicy::Ranked,
            "first" => SelectionPolicy::FirstEnumerated,
            _ => {
                log::warn!(
                    "Unknown device selection '{}', defaulting to ranked",
                    self.selection
                );
                SelectionPolicy::Ranked
            }
        }
    }

    pub fn features(&self) -> vk::PhysicalDeviceFeatures {
        vk::PhysicalDeviceFeatures {
            sampler_anisotropy: vk::Bool32::from(self.sampler_anisotropy),
            ..Default::default()
        }
    }
}

/// Swapchain request; every value is checked against what the surface reports
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SwapchainConfig {
    pub image_count: u32,
    pub format: String,
    pub color_space: String,
    pub present_mode: String,
}

impl Default for SwapchainConfig {
    fn default() -> Self {
        Self {
            image_count: 3,
            format: "b8g8r8a8_unorm".to_string(),
            color_space: "srgb_nonlinear".to_string(),
            present_mode: "fifo".to_string(),
        }
    }
}

impl SwapchainConfig {
    /// Map the configured present mode name. Unknown names are an error,
    /// never a silent fallback to FIFO.
    pub fn present_mode(&self) -> std::result::Result<vk::PresentModeKHR, BootstrapError> {
        match self.present_mode.to_lowercase().as_str() {
            "immediate" => Ok(vk::PresentModeKHR::IMMEDIATE),
            "mailbox" => Ok(vk::PresentModeKHR::MAILBOX),
            "fifo" => Ok(vk::PresentModeKHR::FIFO),
            "fifo_relaxed" => Ok(vk::PresentModeKHR::FIFO_RELAXED),
            _ => Err(BootstrapError::swapchain(format!(
                "unknown present mode '{}'",
                self.present_mode
            ))),
        }
    }

    pub fn surface_format(&self) -> std::result::Result<vk::SurfaceFormatKHR, BootstrapError> {
        let format = match self.format.to_lowercase().as_str() {
            "b8g8r8a8_unorm" => vk::Format::B8G8R8A8_UNORM,
            "b8g8r8a8_srgb" => vk::Format::B8G8R8A8_SRGB,
            "r8g8b8a8_unorm" => vk::Format::R8G8B8A8_UNORM,
            "r8g8b8a8_srgb" => vk::Format::R8G8B8A8_SRGB,
            "a2b10g10r10_unorm" => vk::Format::A2B10G10R10_UNORM_PACK32,
            "r16g16b16a16_sfloat" => vk::Format::R16G16B16A16_SFLOAT,
            _ => {
                return Err(BootstrapError::swapchain(format!(
                    "unknown surface format '{}'",
                    self.format
                )))
            }
        };
        let color_space = match self.color_space.to_lowercase().as_str() {
            "srgb_nonlinear" => vk::ColorSpaceKHR::SRGB_NONLINEAR,
            "extended_srgb_linear" => vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            "hdr10_st2084" => vk::ColorSpaceKHR::HDR10_ST2084_EXT,
            _ => {
                return Err(BootstrapError::swapchain(format!(
                    "unknown color space '{}'",
                    self.color_space
                )))
            }
        };
        Ok(vk::SurfaceFormatKHR { format, color_space })
    }
}

/// Fixed descriptor pool capacity. The pool never grows; raise these to
/// allocate more sets.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DescriptorConfig {
    pub max_sets: u32,
    pub uniform_buffers: u32,
    pub combined_image_samplers: u32,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            max_sets: 1,
            uniform_buffers: 1,
            combined_image_samplers: 1,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fixed_pipeline_sizes() {
        let config = Config::default();
        assert_eq!(config.swapchain.image_count, 3);
        assert_eq!(config.descriptors.max_sets, 1);
        assert_eq!(config.descriptors.uniform_buffers, 1);
        assert_eq!(config.descriptors.combined_image_samplers, 1);
        assert!(config.debug.enabled_layers().is_empty());
        assert_eq!(config.swapchain.present_mode().unwrap(), vk::PresentModeKHR::FIFO);

        let format = config.swapchain.surface_format().unwrap();
        assert_eq!(format.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(format.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::parse(
            r#"
            [swapchain]
            present_mode = "mailbox"

            [debug]
            validation_layers = true
            "#,
        )
        .unwrap();

        assert_eq!(config.swapchain.present_mode().unwrap(), vk::PresentModeKHR::MAILBOX);
        assert_eq!(config.swapchain.image_count, 3);
        assert_eq!(config.window.width, 1920);
        assert_eq!(
            config.debug.enabled_layers(),
            vec![CString::new("VK_LAYER_KHRONOS_validation").unwrap()]
        );
    }

    #[test]
    fn unknown_swapchain_names_are_rejected() {
        let config = Config::parse(
            r#"
            [swapchain]
            present_mode = "vsync-please"
            format = "rgb565"

            [device]
            selection = "fastest"
            "#,
        )
        .unwrap();

        assert!(matches!(
            config.swapchain.present_mode(),
            Err(BootstrapError::SwapchainCreation { .. })
        ));
        assert!(matches!(
            config.swapchain.surface_format(),
            Err(BootstrapError::SwapchainCreation { .. })
        ));
        assert_eq!(config.device.selection_policy(), SelectionPolicy::Ranked);

        let color_space = Config::parse("[swapchain]\ncolor_space = \"display_p3\"").unwrap();
        assert!(color_space.swapchain.surface_format().is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::parse("[swapchain\nimage_count = 3").is_err());
        assert!(Config::parse("[swapchain]\nimage_count = \"three\"").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("vk-bootstrap-core-missing-config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.application.name, "Hello!");
    }

    #[test]
    fn version_packs_semver() {
        let app = ApplicationConfig {
            name: "x".into(),
            version: [1, 2, 3],
        };
        assert_eq!(vk::api_version_major(app.packed_version()), 1);
        assert_eq!(vk::api_version_minor(app.packed_version()), 2);
        assert_eq!(vk::api_version_patch(app.packed_version()), 3);
    }
}
