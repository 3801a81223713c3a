//! GLSL sources for the effect catalog.
//!
//! Each effect contributes only a body defining `vec4 shade(vec2 uv)`;
//! [`fragment_source`] wraps it with a header declaring the varyings, the
//! std140 parameter block (mirrored on the CPU by
//! [`PassUniforms`](crate::plan::PassUniforms), whose layout must match),
//! the input texture bindings, and the blend-function library, then appends
//! the `main` footer. The wrapped source is compiled through naga's GLSL
//! frontend as Vulkan GLSL, with separate texture/sampler bindings remapped
//! to a combined sampler via a macro.

use std::fmt::Write as _;

use crate::catalog::EffectTemplate;

/// Shared quad vertex shader.
///
/// The quad covers NDC when `plane_scale` is `(1, 1)`; the final pass
/// shrinks it to the viewport-fit plane so the image presents letterboxed.
/// UV origin is top-left, matching decoded image memory, so no pass ever
/// flips the picture.
pub(crate) const VERTEX_SOURCE: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

layout(std140, set = 0, binding = 0) uniform PassParams {
    vec2 resolution;
    vec2 plane_scale;
    float time;
    float blend_mode;
};

const vec2 corners[6] = vec2[6](
    vec2(-1.0, -1.0), vec2(1.0, -1.0), vec2(1.0, 1.0),
    vec2(-1.0, -1.0), vec2(1.0, 1.0), vec2(-1.0, 1.0)
);

void main() {
    vec2 corner = corners[uint(gl_VertexIndex)];
    v_uv = vec2(corner.x * 0.5 + 0.5, 0.5 - corner.y * 0.5);
    gl_Position = vec4(corner * plane_scale, 0.0, 1.0);
}
";

const BLEND_LIBRARY: &str = r"
vec3 blend_normal(vec3 base, vec3 blend) {
    return blend;
}

vec3 blend_multiply(vec3 base, vec3 blend) {
    return base * blend;
}

vec3 blend_screen(vec3 base, vec3 blend) {
    return 1.0 - (1.0 - base) * (1.0 - blend);
}

vec3 blend_overlay(vec3 base, vec3 blend) {
    return mix(
        2.0 * base * blend,
        1.0 - 2.0 * (1.0 - base) * (1.0 - blend),
        step(0.5, base)
    );
}

vec3 blend_darken(vec3 base, vec3 blend) {
    return min(base, blend);
}

vec3 blend_lighten(vec3 base, vec3 blend) {
    return max(base, blend);
}

vec3 apply_blend(vec3 base, vec3 blend, int mode) {
    if (mode == 1) { return blend_multiply(base, blend); }
    if (mode == 2) { return blend_screen(base, blend); }
    if (mode == 3) { return blend_overlay(base, blend); }
    if (mode == 4) { return blend_darken(base, blend); }
    if (mode == 5) { return blend_lighten(base, blend); }
    return blend_normal(base, blend);
}
";

const FOOTER: &str = r"
void main() {
    outColor = shade(v_uv);
}
";

/// Produces the complete GLSL 450 fragment shader for one effect template.
///
/// The effect's named parameters land after the fixed header fields in
/// declaration order, so each occupies one tightly packed std140 scalar
/// slot; the CPU side writes them through the matching `values` array.
pub(crate) fn fragment_source(template: &EffectTemplate) -> String {
    let mut params = String::new();
    for spec in template.params {
        writeln!(params, "    float {};", spec.name).expect("writing to a String cannot fail");
    }

    format!(
        r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform PassParams {{
    vec2 resolution;
    vec2 plane_scale;
    float time;
    float blend_mode;
{params}}};

layout(set = 1, binding = 0) uniform texture2D pass_input_texture;
layout(set = 1, binding = 1) uniform sampler pass_input_sampler;

#define source_image sampler2D(pass_input_texture, pass_input_sampler)
{BLEND_LIBRARY}
#line 1
{body}{FOOTER}",
        params = params,
        body = template.fragment_body,
    )
}

/// Pass-through; backs the empty-chain fallback and failed-compile
/// substitution.
pub(crate) const IDENTITY_BODY: &str = r"vec4 shade(vec2 uv) {
    return texture(source_image, uv);
}
";

/// Color grade: brightness, contrast, then hue/saturation in HSV space.
pub(crate) const DEFAULT_BODY: &str = r"vec3 rgb2hsv(vec3 c) {
    vec4 K = vec4(0.0, -1.0 / 3.0, 2.0 / 3.0, -1.0);
    vec4 p = mix(vec4(c.bg, K.wz), vec4(c.gb, K.xy), step(c.b, c.g));
    vec4 q = mix(vec4(p.xyw, c.r), vec4(c.r, p.yzx), step(p.x, c.r));
    float d = q.x - min(q.w, q.y);
    float e = 1.0e-10;
    return vec3(abs(q.z + (q.w - q.y) / (6.0 * d + e)), d / (q.x + e), q.x);
}

vec3 hsv2rgb(vec3 c) {
    vec4 K = vec4(1.0, 2.0 / 3.0, 1.0 / 3.0, 3.0);
    vec3 p = abs(fract(c.xxx + K.xyz) * 6.0 - K.www);
    return c.z * mix(K.xxx, clamp(p - K.xxx, 0.0, 1.0), c.y);
}

vec4 shade(vec2 uv) {
    vec4 texel = texture(source_image, uv);
    vec3 color = texel.rgb * brightness;
    color = (color - 0.5) * contrast + 0.5;

    vec3 hsv = rgb2hsv(color);
    hsv.x = mod(hsv.x + hue / 360.0, 1.0);
    hsv.y *= saturation;
    color = hsv2rgb(hsv);

    // The base is re-sampled from the pass input, so base and blend share
    // the same picture; modes other than normal tint the grade against it.
    if (int(blend_mode) > 0) {
        vec4 base = texture(source_image, uv);
        color = apply_blend(base.rgb, color, int(blend_mode));
    }

    return vec4(color, texel.a);
}
";

/// Snaps UVs to a block grid; block size in source pixels.
pub(crate) const PIXELATE_BODY: &str = r"vec4 shade(vec2 uv) {
    vec2 texel_size = 1.0 / resolution;
    vec2 snapped = floor(uv / (texel_size * pixelate)) * (texel_size * pixelate);
    vec4 texel = texture(source_image, snapped);
    vec3 color = texel.rgb;

    if (int(blend_mode) > 0) {
        vec4 base = texture(source_image, uv);
        color = apply_blend(base.rgb, color, int(blend_mode));
    }

    return vec4(color, texel.a);
}
";

/// Horizontal sine displacement driven by the frame clock.
pub(crate) const WAVE_BODY: &str = r"vec4 shade(vec2 uv) {
    uv.x += sin(uv.y * 10.0 + time) * 0.01;
    return texture(source_image, uv);
}
";

/// Opposing horizontal offsets for the red and blue channels.
pub(crate) const RGB_SHIFT_BODY: &str = r"vec4 shade(vec2 uv) {
    float r = texture(source_image, uv + vec2(amount, 0.0)).r;
    float g = texture(source_image, uv).g;
    float b = texture(source_image, uv - vec2(amount, 0.0)).b;
    return vec4(r, g, b, 1.0);
}
";

/// Angular fold into `segments` mirrored wedges around the image center.
pub(crate) const KALEIDOSCOPE_BODY: &str = r"vec4 shade(vec2 uv) {
    vec2 centered = uv * 2.0 - 1.0;
    float angle = atan(centered.y, centered.x);
    float radius = length(centered);

    float segment_angle = (2.0 * 3.14159) / segments;
    angle = mod(angle, segment_angle);
    if (mod(floor(angle / segment_angle), 2.0) == 1.0) {
        angle = segment_angle - angle;
    }

    vec2 folded = vec2(cos(angle), sin(angle)) * radius;
    return texture(source_image, folded * 0.5 + 0.5);
}
";

/// Distance-based edge darkening; roundness stretches the falloff ellipse.
pub(crate) const VIGNETTE_BODY: &str = r"vec4 shade(vec2 uv) {
    vec4 texel = texture(source_image, uv);
    vec2 centered = uv - vec2(0.5);
    float dist = length(centered * vec2(roundness, 1.0));
    float falloff = smoothstep(0.8, 0.2 * intensity, dist);
    return vec4(texel.rgb * falloff, texel.a);
}
";

/// Weighted box blur with a square tap window of +/- radius source pixels.
pub(crate) const BLUR_BODY: &str = r"vec4 shade(vec2 uv) {
    vec4 color = vec4(0.0);
    float total = 0.0;
    vec2 texel_size = 1.0 / resolution;

    for (float x = -radius; x <= radius; x += 1.0) {
        for (float y = -radius; y <= radius; y += 1.0) {
            vec2 offset = vec2(x, y) * texel_size;
            float weight = 1.0 - length(offset) / radius;
            if (weight < 0.0) { continue; }
            color += texture(source_image, uv + offset) * weight;
            total += weight;
        }
    }

    return color / total;
}
";

/// Scanline displacement bursts plus a constant channel split.
pub(crate) const GLITCH_BODY: &str = r"float random(vec2 co) {
    return fract(sin(dot(co.xy, vec2(12.9898, 78.233))) * 43758.5453);
}

vec4 shade(vec2 uv) {
    float line_noise = random(vec2(time * 0.1, uv.y * 100.0));
    if (line_noise > 0.98) {
        uv.x += (random(vec2(time, time)) * 2.0 - 1.0) * intensity;
    }

    float r = texture(source_image, uv + vec2(intensity * 0.1, 0.0)).r;
    float g = texture(source_image, uv).g;
    float b = texture(source_image, uv - vec2(intensity * 0.1, 0.0)).b;
    return vec4(r, g, b, 1.0);
}
";

/// Additive per-pixel grain, re-seeded every frame by the clock.
pub(crate) const NOISE_BODY: &str = r"float random(vec2 co) {
    return fract(sin(dot(co.xy, vec2(12.9898, 78.233))) * 43758.5453);
}

vec4 shade(vec2 uv) {
    vec4 texel = texture(source_image, uv);
    float grain = random(uv + vec2(time, time)) * amount;
    return vec4(texel.rgb + vec3(grain), texel.a);
}
";

/// Reflects one half of the image across the chosen axis.
pub(crate) const MIRROR_BODY: &str = r"vec4 shade(vec2 uv) {
    if (int(axis) == 0) {
        if (uv.x > 0.5 + offset) {
            uv.x = 1.0 - uv.x;
        }
    } else {
        if (uv.y > 0.5 + offset) {
            uv.y = 1.0 - uv.y;
        }
    }
    return texture(source_image, uv);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{self, EffectKind};

    #[test]
    fn wrapped_source_declares_params_in_schema_order() {
        let source = fragment_source(catalog::template(EffectKind::Default));
        let brightness = source.find("float brightness;").expect("brightness declared");
        let contrast = source.find("float contrast;").expect("contrast declared");
        let saturation = source.find("float saturation;").expect("saturation declared");
        let hue = source.find("float hue;").expect("hue declared");
        assert!(brightness < contrast && contrast < saturation && saturation < hue);
    }

    #[test]
    fn wrapped_source_carries_header_bindings_and_footer() {
        let source = fragment_source(catalog::template(EffectKind::Pixelate));
        assert!(source.contains("layout(std140, set = 0, binding = 0) uniform PassParams"));
        assert!(source.contains("uniform texture2D pass_input_texture"));
        assert!(source.contains("#define source_image"));
        assert!(source.contains("apply_blend"));
        assert!(source.contains("void main()"));
    }

    #[test]
    fn every_template_wraps_without_duplicate_blocks() {
        for kind in EffectKind::ALL {
            let source = fragment_source(catalog::template(kind));
            assert_eq!(source.matches("uniform PassParams").count(), 1, "{kind}");
            assert_eq!(source.matches("void main()").count(), 1, "{kind}");
            assert!(source.contains("vec4 shade(vec2 uv)"), "{kind}");
        }
    }

    #[test]
    fn identity_template_declares_no_parameters() {
        let source = fragment_source(catalog::identity_template());
        assert!(source.contains("float blend_mode;\n};"));
    }

    #[test]
    fn vertex_shader_consumes_the_plane_scale() {
        assert!(VERTEX_SOURCE.contains("corner * plane_scale"));
    }
}
