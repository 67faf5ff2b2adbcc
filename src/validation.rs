//! WGSL validation using the naga library.
//!
//! Compiled WGSL can be checked before it is handed to the GPU resource
//! layer; tests validate every emitted module this way.

use anyhow::{Context, Result, anyhow};

/// Parse WGSL source, returning the naga module or a detailed error.
pub fn validate_wgsl(source: &str) -> Result<naga::Module> {
    naga::front::wgsl::parse_str(source)
        .map_err(|e| anyhow!("WGSL validation failed:\n{}", format_naga_error(source, &e)))
}

/// Parse and fully validate WGSL source (types, layouts, entry points).
pub fn validate_wgsl_module(source: &str) -> Result<naga::Module> {
    let module = validate_wgsl(source)?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| {
        anyhow!(
            "WGSL module validation failed: {e:?}\n---\n{}",
            numbered(source)
        )
    })?;
    Ok(module)
}

/// Validate WGSL with context about which stage/material generated it.
pub fn validate_wgsl_with_context(source: &str, context: &str) -> Result<naga::Module> {
    validate_wgsl_module(source).with_context(|| format!("{context} generated invalid WGSL"))
}

fn numbered(source: &str) -> String {
    let mut out = String::new();
    for (line_num, line) in source.lines().enumerate() {
        out.push_str(&format!("{:4} | {}\n", line_num + 1, line));
    }
    out
}

/// Format a naga parse error with line-numbered source for debugging.
fn format_naga_error(source: &str, error: &naga::front::wgsl::ParseError) -> String {
    let mut output = String::new();
    output.push_str(&format!("  {error}\n"));
    output.push_str("\nGenerated WGSL:\n---\n");
    output.push_str(&numbered(source));
    output.push_str("---\n");
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_wgsl() {
        let source = r#"
@vertex
fn vs_main(@location(0) position: vec3f) -> @builtin(position) vec4f {
    return vec4f(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4f {
    return vec4f(1.0, 0.0, 0.0, 1.0);
}
"#;
        assert!(validate_wgsl_module(source).is_ok());
    }

    #[test]
    fn test_invalid_wgsl_reports_source() {
        let err = validate_wgsl("fn broken( {").unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("Generated WGSL"));
    }
}
