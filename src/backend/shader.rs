// Shader module loading
//
// Vulkan uses SPIR-V bytecode for shaders. Bytes are checked before they
// reach the driver: non-empty, whole 4-byte words, SPIR-V magic up front.

use ash::vk;
use std::io::Cursor;
use std::path::Path;

use super::device::LogicalDevice;
use super::driver::Driver;
use crate::error::{BootstrapError, Cause, Result, Stage};

pub const SPIRV_MAGIC: u32 = 0x0723_0203;

#[derive(Debug)]
pub struct ShaderModule {
    pub handle: vk::ShaderModule,
    device: vk::Device,
}

impl ShaderModule {
    pub fn destroy<D: Driver>(self, driver: &mut D) {
        driver.destroy_shader_module(self.device, self.handle);
    }
}

/// Read compiled SPIR-V from disk
pub fn load_shader_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|e| {
        log::error!("Failed to read shader {:?}: {}", path, e);
        BootstrapError::ResourceCreation {
            stage: Stage::ShaderModule,
            cause: Cause::Io(e),
        }
    })
}

/// Decode bytes into aligned SPIR-V words
pub fn decode_spirv(bytes: &[u8]) -> Result<Vec<u32>> {
    let compile_error = |reason: String| BootstrapError::ShaderCompile {
        stage: Stage::ShaderModule,
        cause: Cause::Unsupported(reason),
    };

    if bytes.is_empty() {
        return Err(compile_error("empty bytecode".to_string()));
    }

    // read_spv rejects lengths that are not a multiple of 4 and fixes alignment
    let words = ash::util::read_spv(&mut Cursor::new(bytes))
        .map_err(|e| compile_error(format!("malformed SPIR-V ({} bytes): {}", bytes.len(), e)))?;

    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        Some(&other) => Err(compile_error(format!(
            "bad magic {:#010x}, expected {:#010x}",
            other, SPIRV_MAGIC
        ))),
        None => Err(compile_error("empty bytecode".to_string())),
    }
}

pub fn create_shader_module<D: Driver>(
    driver: &mut D,
    device: &LogicalDevice,
    bytes: &[u8],
) -> Result<ShaderModule> {
    let code = decode_spirv(bytes)?;

    let handle = driver
        .create_shader_module(device.handle, &code)
        .map_err(|err| match err {
            vk::Result::ERROR_INVALID_SHADER_NV => BootstrapError::ShaderCompile {
                stage: Stage::ShaderModule,
                cause: err.into(),
            },
            _ => BootstrapError::resource(Stage::ShaderModule, err),
        })?;

    log::debug!("Shader module created ({} words)", code.len());

    Ok(ShaderModule {
        handle,
        device: device.handle,
    })
}
