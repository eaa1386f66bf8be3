use glam::{Vec2, Vec3};

/// Reflectance of a dielectric surface at normal incidence.
pub const DIELECTRIC_SPECULAR: f32 = 0.04;

/// Tolerance used for colour comparisons and to guard divisions.
pub const EPSILON: f32 = 1e-6;

/// Specular power is clamped to this before it is mapped to roughness.
pub const MAX_SPECULAR_POWER: f32 = 1024.0;

const GAMMA: f32 = 2.2;

// Control points of the specular power -> roughness curve, power on x, roughness on y.
const ROUGHNESS_CURVE: [Vec2; 4] = [
    Vec2::new(0.0, 1.0),
    Vec2::new(0.0, 0.1),
    Vec2::new(0.0, 0.1),
    Vec2::new(1300.0, 0.1),
];

pub fn to_linear(color: Vec3) -> Vec3 {
    color.powf(GAMMA)
}

pub fn to_gamma(color: Vec3) -> Vec3 {
    color.powf(1.0 / GAMMA)
}

/// Channel-wise comparison within `epsilon` (inclusive).
pub fn fuzzy_equals(a: Vec3, b: Vec3, epsilon: f32) -> bool {
    (a - b).abs().cmple(Vec3::splat(epsilon)).all()
}

pub fn perceived_brightness(color: Vec3) -> f32 {
    (0.299 * color.x * color.x + 0.587 * color.y * color.y + 0.114 * color.z * color.z).sqrt()
}

pub fn max_component(color: Vec3) -> f32 {
    color.max_element()
}

pub fn cubic_bezier(t: f32, p0: f32, p1: f32, p2: f32, p3: f32) -> f32 {
    let s = 1.0 - t;
    s * s * s * p0 + 3.0 * s * s * t * p1 + 3.0 * s * t * t * p2 + t * t * t * p3
}

/// Maps a legacy specular power onto PBR roughness.
///
/// The power is clamped to [`MAX_SPECULAR_POWER`] first, so the curve never reaches its
/// last control point at x = 1300. Downstream assets are calibrated against this.
pub fn solve_roughness_from_specular_power(specular_power: f32) -> f32 {
    let power = specular_power.clamp(0.0, MAX_SPECULAR_POWER);
    let t = (power / ROUGHNESS_CURVE[3].x).powf(0.333333);
    cubic_bezier(
        t,
        ROUGHNESS_CURVE[0].y,
        ROUGHNESS_CURVE[1].y,
        ROUGHNESS_CURVE[2].y,
        ROUGHNESS_CURVE[3].y,
    )
}
