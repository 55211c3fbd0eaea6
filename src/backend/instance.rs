// Instance creation
//
// The instance is created once per process, after the window exists:
// surface extensions depend on the platform the window lives on.

use ash::extensions::ext::DebugUtils;
use ash::vk;
use std::ffi::{CStr, CString};

use super::driver::{Driver, InstanceDesc};
use crate::config::{ApplicationConfig, DebugConfig};
use crate::error::{BootstrapError, Result, Stage};

const ENGINE_NAME: &CStr = c"No Engine";
const ENGINE_VERSION: u32 = vk::make_api_version(0, 1, 0, 0);
const API_VERSION: u32 = vk::API_VERSION_1_0;

/// Owned API instance. Destroyed last.
#[derive(Debug)]
pub struct Instance {
    pub handle: vk::Instance,
    pub extensions: Vec<&'static CStr>,
    pub layers: Vec<CString>,
}

pub fn create_instance<D: Driver>(
    driver: &mut D,
    app: &ApplicationConfig,
    debug: &DebugConfig,
    window_extensions: Vec<&'static CStr>,
) -> Result<Instance> {
    let application_name = CString::new(app.name.as_str())
        .map_err(|_| BootstrapError::init(Stage::Instance, "application name contains NUL"))?;

    let mut extensions = window_extensions;
    let layers = debug.enabled_layers();
    if !layers.is_empty() && !extensions.contains(&DebugUtils::name()) {
        extensions.push(DebugUtils::name());
    }

    let desc = InstanceDesc {
        application_name,
        application_version: app.packed_version(),
        engine_name: ENGINE_NAME.to_owned(),
        engine_version: ENGINE_VERSION,
        api_version: API_VERSION,
        extensions,
        layers,
    };

    log::info!("Creating Vulkan instance: {}", app.name);
    for ext in &desc.extensions {
        log::debug!("  instance extension {}", ext.to_string_lossy());
    }
    for layer in &desc.layers {
        log::debug!("  layer {}", layer.to_string_lossy());
    }

    let handle = driver
        .create_instance(&desc)
        .map_err(|code| BootstrapError::init(Stage::Instance, code))?;

    Ok(Instance {
        handle,
        extensions: desc.extensions,
        layers: desc.layers,
    })
}

impl Instance {
    pub fn destroy<D: Driver>(self, driver: &mut D) {
        driver.destroy_instance(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockCall, MockDriver};
    use ash::extensions::khr;

    #[test]
    fn validation_adds_debug_utils_once() {
        let mut driver = MockDriver::default();
        let debug = DebugConfig {
            validation_layers: true,
            ..Default::default()
        };

        let instance = create_instance(
            &mut driver,
            &ApplicationConfig::default(),
            &debug,
            vec![khr::Surface::name(), DebugUtils::name()],
        )
        .unwrap();

        let debug_utils = instance.extensions.iter().filter(|&&e| e == DebugUtils::name()).count();
        assert_eq!(debug_utils, 1);
        assert_eq!(instance.layers.len(), 1);

        let desc = driver.instance_desc().unwrap();
        assert_eq!(desc.engine_name.as_c_str(), ENGINE_NAME);
        assert_eq!(desc.application_name.to_str().unwrap(), "Hello!");
    }

    #[test]
    fn no_layers_by_default() {
        let mut driver = MockDriver::default();
        let instance = create_instance(
            &mut driver,
            &ApplicationConfig::default(),
            &DebugConfig::default(),
            vec![khr::Surface::name()],
        )
        .unwrap();

        assert!(instance.layers.is_empty());
        assert_eq!(instance.extensions, vec![khr::Surface::name()]);
    }

    #[test]
    fn driver_rejection_is_init_error() {
        let mut driver = MockDriver::default();
        driver.fail_next(MockCall::CreateInstance, vk::Result::ERROR_EXTENSION_NOT_PRESENT);

        let err = create_instance(
            &mut driver,
            &ApplicationConfig::default(),
            &DebugConfig::default(),
            Vec::new(),
        )
        .unwrap_err();

        assert!(matches!(err, BootstrapError::Init { stage: Stage::Instance, .. }));
        assert_eq!(err.code(), Some(vk::Result::ERROR_EXTENSION_NOT_PRESENT));
        assert_eq!(driver.live_count(), 0);
    }
}
