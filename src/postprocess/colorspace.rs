//! sRGB <-> CIE LCh(uv) conversion, D65 white point.
//!
//! Inputs and outputs are linear-range floats where sRGB components live in
//! `[0, 1]`. The path is sRGB -> linear RGB -> XYZ -> Luv -> LCh and back.

// D65 reference white
const XN: f64 = 0.95047;
const YN: f64 = 1.0;
const ZN: f64 = 1.08883;

// CIE constants: (6/29)^3 and (29/3)^3
const T0: f64 = 0.008856451679035631;
const KAPPA: f64 = 903.2962962962963;

// L* at which the cube-root branch of the inverse takes over
const L_THRESHOLD: f64 = 7.999592;

const RGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.4124, 0.3576, 0.1805],
    [0.2126, 0.7152, 0.0722],
    [0.0193, 0.1192, 0.9505],
];

const XYZ_TO_RGB: [[f64; 3]; 3] = [
    [3.2406, -1.5372, -0.4986],
    [-0.9689, 1.8758, 0.0415],
    [0.0557, -0.2040, 1.0570],
];

/// A color in LCh(uv): lightness, chroma, hue angle in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lch {
    pub l: f64,
    pub c: f64,
    pub h: f64,
}

fn white_uv() -> (f64, f64) {
    let denom = XN + 15.0 * YN + 3.0 * ZN;
    (4.0 * XN / denom, 9.0 * YN / denom)
}

fn to_linear(v: f64) -> f64 {
    if v > 0.04045 {
        ((v + 0.055) / 1.055).powf(2.4)
    } else {
        v / 12.92
    }
}

fn from_linear(v: f64) -> f64 {
    if v > 0.0031308 {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    } else {
        12.92 * v
    }
}

fn mul(m: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

pub fn rgb_to_lch(r: f64, g: f64, b: f64) -> Lch {
    let [x, y, z] = mul(&RGB_TO_XYZ, [to_linear(r), to_linear(g), to_linear(b)]);

    let yr = y / YN;
    let l = if yr > T0 {
        116.0 * yr.cbrt() - 16.0
    } else {
        KAPPA * yr
    };

    let denom = x + 15.0 * y + 3.0 * z;
    if l == 0.0 || denom == 0.0 {
        return Lch { l, c: 0.0, h: 0.0 };
    }

    let (un, vn) = white_uv();
    let u = 13.0 * l * (4.0 * x / denom - un);
    let v = 13.0 * l * (9.0 * y / denom - vn);

    Lch {
        l,
        c: (u * u + v * v).sqrt(),
        h: v.atan2(u),
    }
}

pub fn lch_to_rgb(lch: Lch) -> [f64; 3] {
    let Lch { l, c, h } = lch;
    if l <= 0.0 {
        return [0.0, 0.0, 0.0];
    }

    let u = c * h.cos();
    let v = c * h.sin();

    let (un, vn) = white_uv();
    let up = u / (13.0 * l) + un;
    let vp = v / (13.0 * l) + vn;

    let y = if l > L_THRESHOLD {
        ((l + 16.0) / 116.0).powi(3)
    } else {
        l / KAPPA
    } * YN;

    if vp == 0.0 {
        return [0.0, 0.0, 0.0];
    }
    let x = y * 9.0 * up / (4.0 * vp);
    let z = y * (12.0 - 3.0 * up - 20.0 * vp) / (4.0 * vp);

    let [r, g, b] = mul(&XYZ_TO_RGB, [x, y, z]);
    [from_linear(r), from_linear(g), from_linear(b)]
}
