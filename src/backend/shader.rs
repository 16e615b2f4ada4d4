// Shader module loading
//
// Shaders arrive as a pre-compiled SPIR-V blob holding both entry points.
// The file is read fully into memory and handed to the driver byte-for-byte.

use std::path::Path;

use ash::vk;

use super::device::VulkanDevice;
use crate::error::RenderError;

/// Read a compiled shader binary from disk.
pub fn load_spirv<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, RenderError> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reinterpret a SPIR-V byte buffer as the 32-bit words the API consumes.
/// The buffer must be non-empty and a whole number of words.
pub(crate) fn spirv_words(code: &[u8]) -> Result<Vec<u32>, RenderError> {
    if code.is_empty() {
        return Err(RenderError::InvalidShader("empty shader binary".into()));
    }
    if code.len() % 4 != 0 {
        return Err(RenderError::InvalidShader(format!(
            "shader binary length {} is not a multiple of 4",
            code.len()
        )));
    }

    Ok(code
        .chunks_exact(4)
        .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
        .collect())
}

/// Create a shader module from SPIR-V bytes.
pub fn create_shader_module(
    device: &VulkanDevice,
    code: &[u8],
) -> Result<vk::ShaderModule, RenderError> {
    let words = spirv_words(code)?;
    let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);

    let module = unsafe { device.device.create_shader_module(&create_info, None) }?;
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_buffer_maps_to_words_without_truncation() {
        let code: Vec<u8> = (0u8..16).collect();
        let words = spirv_words(&code).unwrap();
        assert_eq!(words.len(), 4);
        assert_eq!(words.len() * 4, code.len());
        assert_eq!(words[0], u32::from_le_bytes([0, 1, 2, 3]));
    }

    #[test]
    fn empty_buffer_is_rejected() {
        assert!(matches!(
            spirv_words(&[]),
            Err(RenderError::InvalidShader(_))
        ));
    }

    #[test]
    fn misaligned_buffer_is_rejected() {
        assert!(matches!(
            spirv_words(&[0x03, 0x02, 0x23]),
            Err(RenderError::InvalidShader(_))
        ));
    }

    #[test]
    fn load_spirv_round_trips_exact_bytes() {
        let path = std::env::temp_dir().join("vk-triangle-shader-roundtrip.spv");
        let payload: Vec<u8> = (0u8..64).collect();
        std::fs::write(&path, &payload).unwrap();

        let loaded = load_spirv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, payload);
    }

    #[test]
    fn unreadable_file_is_an_io_error() {
        let result = load_spirv("no/such/shader.spv");
        assert!(matches!(result, Err(RenderError::Io { .. })));
    }
}
