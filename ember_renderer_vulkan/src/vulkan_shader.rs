/// SPIR-V entry point reflection (spirq)

use ember_renderer::ember::{Error, Result};
use ember_renderer::{engine_err, engine_error};

/// Names of every entry point declared by a SPIR-V module
pub fn entry_point_names(code: &[u32]) -> Result<Vec<String>> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| engine_err!("ember::vulkan", "SPIR-V reflection failed: {:?}", e))?;

    Ok(entry_points.into_iter().map(|entry_point| entry_point.name).collect())
}

/// Fail unless the module declares an entry point called `name`
pub fn ensure_entry_point(code: &[u32], name: &str) -> Result<()> {
    let names = entry_point_names(code)?;
    if names.iter().any(|entry| entry == name) {
        return Ok(());
    }
    engine_error!("ember::vulkan", "Shader has no '{}' entry point (found {:?})", name, names);
    Err(Error::InvalidResource(format!("Shader has no '{}' entry point", name)))
}

#[cfg(test)]
#[path = "vulkan_shader_tests.rs"]
mod tests;
