//! Color-correction formulas.
//!
//! A formula is a whitespace-separated sequence of operations, each an
//! operation name followed by its arguments. Commas are ignored, so
//! `"gamma rgb 1.5, sigmoidal rgb 10 0.3"` and
//! `"Gamma RGB 1.5 Sigmoidal RGB 10 0.3"` parse identically.
//!
//! | Operation    | Arguments                   |
//! |--------------|-----------------------------|
//! | `gamma`      | `[bands] g` with `g > 0`    |
//! | `sigmoidal`  | `[bands] contrast bias`     |
//! | `saturation` | `proportion`                |
//!
//! Bands are written as letters (`r`, `g`, `b`) or digits (`1`..`3`) and may
//! be combined (`rgb`, `12`). Without a band token the operation applies to
//! every band. Saturation always works on the first three bands.
//!
//! Operations run in order on math-range (`[0, 1]`) values.

use std::fmt;
use std::str::FromStr;

use ndarray::{s, Array3, Axis, Zip};

use super::colorspace::{lch_to_rgb, rgb_to_lch, Lch};
use crate::error::PipelineError;

/// Bands targeted by an operation. Indices are zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bands {
    All,
    Indices(Vec<usize>),
}

impl Bands {
    fn parse(token: &str) -> Result<Self, PipelineError> {
        let mut indices = Vec::new();
        for c in token.chars() {
            let index = match c {
                'r' | '1' => 0,
                'g' | '2' => 1,
                'b' | '3' => 2,
                _ => return Err(invalid(format!("'{token}' is not a band selection"))),
            };
            if !indices.contains(&index) {
                indices.push(index);
            }
        }
        Ok(Bands::Indices(indices))
    }
}

/// One color operation with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorOp {
    Gamma { bands: Bands, gamma: f64 },
    Sigmoidal { bands: Bands, contrast: f64, bias: f64 },
    Saturation { proportion: f64 },
}

impl ColorOp {
    pub fn name(&self) -> &'static str {
        match self {
            ColorOp::Gamma { .. } => "gamma",
            ColorOp::Sigmoidal { .. } => "sigmoidal",
            ColorOp::Saturation { .. } => "saturation",
        }
    }

    fn from_tokens(name: &str, args: &[&str]) -> Result<Self, PipelineError> {
        match name {
            "gamma" => {
                let (bands, nums) = split_bands(name, args, 1)?;
                let gamma = nums[0];
                if gamma <= 0.0 {
                    return Err(invalid(format!("gamma must be positive, got {gamma}")));
                }
                Ok(ColorOp::Gamma { bands, gamma })
            }
            "sigmoidal" => {
                let (bands, nums) = split_bands(name, args, 2)?;
                let (contrast, bias) = (nums[0], nums[1]);
                if !(0.0..=1.0).contains(&bias) {
                    return Err(invalid(format!(
                        "sigmoidal bias must be between 0 and 1, got {bias}"
                    )));
                }
                Ok(ColorOp::Sigmoidal {
                    bands,
                    contrast,
                    bias,
                })
            }
            "saturation" => {
                if args.len() != 1 {
                    return Err(invalid(format!(
                        "saturation takes 1 argument, got {}",
                        args.len()
                    )));
                }
                let proportion = number(args[0])?;
                if proportion < 0.0 {
                    return Err(invalid(format!(
                        "saturation must not be negative, got {proportion}"
                    )));
                }
                Ok(ColorOp::Saturation { proportion })
            }
            other => Err(invalid(format!("unknown operation '{other}'"))),
        }
    }

    /// Check the operation can run on a tile with `band_count` bands.
    fn check_bands(&self, band_count: usize) -> Result<(), PipelineError> {
        let required = match self {
            ColorOp::Gamma { bands, .. } | ColorOp::Sigmoidal { bands, .. } => match bands {
                Bands::All => 1,
                Bands::Indices(indices) => indices.iter().max().map_or(0, |i| i + 1),
            },
            ColorOp::Saturation { .. } => 3,
        };

        if required > band_count {
            return Err(invalid(format!(
                "{} needs {} band(s), tile has {}",
                self.name(),
                required,
                band_count
            )));
        }
        Ok(())
    }

    /// Apply in place to a math-range array `(band, row, col)`.
    pub fn apply(&self, arr: &mut Array3<f64>) {
        match self {
            ColorOp::Gamma { bands, gamma } => {
                let exponent = 1.0 / gamma;
                for_bands(arr, bands, |v| v.powf(exponent));
            }
            ColorOp::Sigmoidal {
                bands,
                contrast,
                bias,
            } => {
                let (contrast, bias) = (*contrast, *bias);
                if contrast != 0.0 {
                    for_bands(arr, bands, |v| sigmoidal(v, contrast, bias));
                }
            }
            ColorOp::Saturation { proportion } => saturate(arr, *proportion),
        }
    }
}

impl fmt::Display for ColorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorOp::Gamma { gamma, .. } => write!(f, "gamma {gamma}"),
            ColorOp::Sigmoidal { contrast, bias, .. } => {
                write!(f, "sigmoidal {contrast} {bias}")
            }
            ColorOp::Saturation { proportion } => write!(f, "saturation {proportion}"),
        }
    }
}

/// A parsed color formula: an ordered list of operations.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorFormula {
    ops: Vec<ColorOp>,
}

impl ColorFormula {
    pub fn ops(&self) -> &[ColorOp] {
        &self.ops
    }

    /// Check every operation against the tile's band count.
    pub fn check_bands(&self, band_count: usize) -> Result<(), PipelineError> {
        self.ops.iter().try_for_each(|op| op.check_bands(band_count))
    }
}

impl FromStr for ColorFormula {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_lowercase().replace(',', " ");
        let tokens: Vec<&str> = normalized.split_whitespace().collect();

        let mut ops = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let name = tokens[i];
            if !is_op_name(name) {
                return Err(invalid(format!("expected an operation name, got '{name}'")));
            }
            let end = tokens[i + 1..]
                .iter()
                .position(|t| is_op_name(t))
                .map_or(tokens.len(), |p| i + 1 + p);

            ops.push(ColorOp::from_tokens(name, &tokens[i + 1..end])?);
            i = end;
        }

        if ops.is_empty() {
            return Err(invalid("formula contains no operations".to_string()));
        }
        Ok(Self { ops })
    }
}

fn is_op_name(token: &str) -> bool {
    matches!(token, "gamma" | "sigmoidal" | "saturation")
}

fn invalid(message: String) -> PipelineError {
    PipelineError::InvalidColorFormula(message)
}

fn number(token: &str) -> Result<f64, PipelineError> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(format!("'{token}' is not a finite number")))
}

/// Split `args` into an optional leading band token and `count` numbers.
fn split_bands(name: &str, args: &[&str], count: usize) -> Result<(Bands, Vec<f64>), PipelineError> {
    let (bands, nums) = if args.len() == count + 1 {
        (Bands::parse(args[0])?, &args[1..])
    } else if args.len() == count {
        (Bands::All, args)
    } else {
        return Err(invalid(format!(
            "{name} takes {count} argument(s) after an optional band list, got {}",
            args.len()
        )));
    };

    let nums = nums.iter().map(|t| number(t)).collect::<Result<Vec<_>, _>>()?;
    Ok((bands, nums))
}

fn for_bands(arr: &mut Array3<f64>, bands: &Bands, f: impl Fn(f64) -> f64) {
    match bands {
        Bands::All => arr.mapv_inplace(f),
        Bands::Indices(indices) => {
            for &band in indices {
                arr.index_axis_mut(Axis(0), band).mapv_inplace(&f);
            }
        }
    }
}

/// Sigmoidal contrast adjustment. Negative contrast applies the inverse curve.
fn sigmoidal(x: f64, contrast: f64, bias: f64) -> f64 {
    let alpha = if bias == 0.0 { f64::EPSILON } else { bias };
    let beta = contrast;
    let logistic = |t: f64| 1.0 / (1.0 + t.exp());

    if beta > 0.0 {
        let numerator = logistic(beta * (alpha - x)) - logistic(beta * alpha);
        let denominator = logistic(beta * (alpha - 1.0)) - logistic(beta * alpha);
        numerator / denominator
    } else {
        let inner = x / (1.0 + (beta * alpha - beta).exp()) - x / (1.0 + (beta * alpha).exp())
            + logistic(beta * alpha);
        (beta * alpha - (1.0 / inner - 1.0).ln()) / beta
    }
}

/// Scale chroma of the first three bands in LCh(uv) space.
fn saturate(arr: &mut Array3<f64>, proportion: f64) {
    let rgb = arr.slice_mut(s![0..3, .., ..]);
    let (r, rest) = rgb.split_at(Axis(0), 1);
    let (g, b) = rest.split_at(Axis(0), 1);

    Zip::from(r).and(g).and(b).for_each(|r, g, b| {
        let lch = rgb_to_lch(*r, *g, *b);
        let [nr, ng, nb] = lch_to_rgb(Lch {
            c: lch.c * proportion,
            ..lch
        });
        *r = nr;
        *g = ng;
        *b = nb;
    });
}
