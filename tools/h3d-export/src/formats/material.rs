//! Material (.material.xml) writer

use std::fmt::Write;

use crate::source::SourceMaterial;

/// Shader every exported material starts from
pub const MODEL_SHADER: &str = "shaders/model.shader";

/// Material file name relative to the asset path
pub fn material_file_name(model_name: &str, material: &str) -> String {
    format!("{model_name}{material}.material.xml")
}

/// Render a material document
///
/// A diffuse map takes precedence over a diffuse colour. Materials with no
/// source description get the shader alone.
pub fn render_material(material: Option<&SourceMaterial>, skinned: bool) -> String {
    let mut out = String::from("<Material>\n");
    let _ = writeln!(out, "\t<Shader source=\"{MODEL_SHADER}\" />");
    if skinned {
        out.push_str("\t<ShaderFlag name=\"_F01_Skinning\" />\n");
    }
    out.push('\n');

    if let Some(material) = material {
        if let Some(map) = &material.diffuse_map {
            let _ = writeln!(out, "\t<Sampler name=\"albedoMap\" map=\"{}\" />", escape_attr(map));
        } else if let Some([a, b, c, d]) = material.diffuse_color {
            let _ = writeln!(
                out,
                "\t<Uniform name=\"matDiffuseCol\" a=\"{a}\" b=\"{b}\" c=\"{c}\" d=\"{d}\" />"
            );
        }

        if let Some([a, b, c]) = material.specular_color {
            let shininess = material.shininess.unwrap_or(0.0);
            let _ = writeln!(
                out,
                "\t<Uniform name=\"matSpecParams\" a=\"{a}\" b=\"{b}\" c=\"{c}\" d=\"{shininess}\" />"
            );
        }
    }

    out.push_str("</Material>\n");
    out
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}
