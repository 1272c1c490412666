//! Labeled minicube model and its NetCDF I/O
//!
//! A [`Minicube`] is a set of named variables sharing named dimensions
//! (`time`, `lat`, `lon`, ...). Variables are read eagerly into memory as
//! `f32` arrays; CF packing is decoded on the way in so downstream arithmetic
//! sees physical values with NaN for missing data.

use crate::errors::{EarthNetError, Result};
use chrono::Utc;
use ndarray::{ArrayD, Axis, Slice};
use netcdf::{AttributeValue, Variable};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Name of the time dimension
pub const TIME: &str = "time";
/// Name of the latitude dimension
pub const LAT: &str = "lat";
/// Name of the longitude dimension
pub const LON: &str = "lon";

/// One named array with its dimension names
#[derive(Debug, Clone, PartialEq)]
pub struct DataVariable {
    pub dims: Vec<String>,
    pub data: ArrayD<f32>,
}

impl DataVariable {
    /// Pair an array with dimension names, one per axis
    pub fn new<S: Into<String>>(dims: Vec<S>, data: ArrayD<f32>) -> Result<Self> {
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();
        if dims.len() != data.ndim() {
            return Err(EarthNetError::shape(format!(
                "{} dimension names given for an array with {} axes",
                dims.len(),
                data.ndim()
            )));
        }
        Ok(Self { dims, data })
    }

    /// Axis index of a dimension, if present
    #[must_use]
    pub fn axis(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    #[must_use]
    pub fn has_dim(&self, dim: &str) -> bool {
        self.axis(dim).is_some()
    }

    /// Length along a dimension, if present
    #[must_use]
    pub fn len_of(&self, dim: &str) -> Option<usize> {
        self.axis(dim).map(|axis| self.data.len_of(Axis(axis)))
    }

    /// Keep every `stride`-th entry along `dim`, starting at `offset`
    #[must_use]
    pub fn slice_dim(&self, dim: &str, offset: usize, stride: usize) -> Self {
        match self.axis(dim) {
            Some(axis) => {
                let len = self.data.len_of(Axis(axis));
                let start = offset.min(len) as isize;
                let slice = Slice::new(start, None, stride.max(1) as isize);
                Self {
                    dims: self.dims.clone(),
                    data: self.data.slice_axis(Axis(axis), slice).to_owned(),
                }
            }
            None => self.clone(),
        }
    }

    /// Array permuted into the given dimension order, in standard layout
    ///
    /// Every name in `order` must be a dimension of the variable and vice versa.
    pub fn transposed(&self, name: &str, order: &[&str]) -> Result<ArrayD<f32>> {
        if order.len() != self.dims.len() {
            return Err(EarthNetError::shape(format!(
                "variable '{name}' has dimensions {:?}, cannot order as {order:?}",
                self.dims
            )));
        }
        let axes = order
            .iter()
            .map(|dim| {
                self.axis(dim).ok_or_else(|| EarthNetError::DimensionNotFound {
                    var: name.to_string(),
                    dim: (*dim).to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self
            .data
            .view()
            .permuted_axes(axes)
            .as_standard_layout()
            .into_owned())
    }
}

/// An in-memory labeled dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Minicube {
    dims: BTreeMap<String, usize>,
    variables: BTreeMap<String, DataVariable>,
}

impl Minicube {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable, checking its dimension lengths against the cube
    pub fn insert(&mut self, name: impl Into<String>, variable: DataVariable) -> Result<()> {
        let name = name.into();
        for (dim, &len) in variable.dims.iter().zip(variable.data.shape()) {
            match self.dims.get(dim) {
                Some(&existing) if existing != len => {
                    return Err(EarthNetError::shape(format!(
                        "variable '{name}' has {dim}={len} but the cube has {dim}={existing}"
                    )));
                }
                Some(_) => {}
                None => {
                    self.dims.insert(dim.clone(), len);
                }
            }
        }
        self.variables.insert(name, variable);
        Ok(())
    }

    /// Builder-style [`Minicube::insert`]
    pub fn with_variable<S: Into<String>>(
        mut self,
        name: &str,
        dims: Vec<S>,
        data: ArrayD<f32>,
    ) -> Result<Self> {
        self.insert(name, DataVariable::new(dims, data)?)?;
        Ok(self)
    }

    pub fn variable(&self, name: &str) -> Result<&DataVariable> {
        self.variables
            .get(name)
            .ok_or_else(|| EarthNetError::VariableNotFound {
                var: name.to_string(),
            })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &DataVariable)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn dims(&self) -> &BTreeMap<String, usize> {
        &self.dims
    }

    #[must_use]
    pub fn dim_len(&self, dim: &str) -> Option<usize> {
        self.dims.get(dim).copied()
    }

    /// Number of time steps, zero for static cubes
    #[must_use]
    pub fn time_len(&self) -> usize {
        self.dim_len(TIME).unwrap_or(0)
    }

    /// Apply `slice_dim` along `dim` to every variable that has it
    #[must_use]
    pub fn slice_dim(&self, dim: &str, offset: usize, stride: usize) -> Self {
        let mut sliced = Self::new();
        for (name, variable) in &self.variables {
            let variable = variable.slice_dim(dim, offset, stride);
            for (d, &len) in variable.dims.iter().zip(variable.data.shape()) {
                sliced.dims.insert(d.clone(), len);
            }
            sliced.variables.insert(name.clone(), variable);
        }
        for (d, &len) in &self.dims {
            sliced.dims.entry(d.clone()).or_insert(len);
        }
        sliced
    }

    /// Keep every `stride`-th time step starting at `offset`
    #[must_use]
    pub fn subsample_time(&self, offset: usize, stride: usize) -> Self {
        self.slice_dim(TIME, offset, stride)
    }

    /// Read every numeric variable of a NetCDF file into memory
    pub fn from_netcdf(path: &Path) -> Result<Self> {
        let file = netcdf::open(path)?;
        let mut cube = Self::new();

        for var in file.variables() {
            let name = var.name().to_string();
            let dims: Vec<String> = var
                .dimensions()
                .iter()
                .map(|d| d.name().to_string())
                .collect();
            let shape: Vec<usize> = var
                .dimensions()
                .iter()
                .map(netcdf::Dimension::len)
                .collect();

            let mut values = match var.get_values::<f32, _>(..) {
                Ok(values) => values,
                Err(e) => {
                    debug!("Skipping non-numeric variable '{name}': {e}");
                    continue;
                }
            };
            decode_cf(&var, &mut values);

            let data = ArrayD::from_shape_vec(shape, values)?;
            cube.insert(name, DataVariable::new(dims, data)?)?;
        }

        debug!(
            "Loaded {} variables from {}",
            cube.variables.len(),
            path.display()
        );
        Ok(cube)
    }

    /// Write all variables as `f32` NetCDF variables
    pub fn write_netcdf(&self, path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let mut file = netcdf::create(path)?;

        for (dim, &len) in &self.dims {
            file.add_dimension(dim, len)?;
        }

        for (name, variable) in &self.variables {
            let dim_refs: Vec<&str> = variable.dims.iter().map(String::as_str).collect();
            let mut nc_var = file.add_variable::<f32>(name, &dim_refs)?;
            let values: Vec<f32> = variable.data.iter().copied().collect();
            nc_var.put_values(&values, ..)?;
        }

        file.add_attribute(
            "history",
            format!("Created by earthnet on {}", Utc::now().to_rfc3339()),
        )?;

        Ok(())
    }
}

/// Mask fill values to NaN and unpack `scale_factor`/`add_offset`
fn decode_cf(var: &Variable, values: &mut [f32]) {
    for key in ["_FillValue", "missing_value"] {
        if let Some(fill) = numeric_attribute(var, key) {
            let fill = fill as f32;
            values
                .iter_mut()
                .filter(|v| **v == fill)
                .for_each(|v| *v = f32::NAN);
        }
    }

    let scale = numeric_attribute(var, "scale_factor");
    let offset = numeric_attribute(var, "add_offset");
    if scale.is_some() || offset.is_some() {
        let scale = scale.unwrap_or(1.0);
        let offset = offset.unwrap_or(0.0);
        for v in values.iter_mut() {
            *v = (f64::from(*v) * scale + offset) as f32;
        }
    }
}

fn numeric_attribute(var: &Variable, key: &str) -> Option<f64> {
    let attr = var.attribute(key)?;
    match attr.value().ok()? {
        AttributeValue::Float(v) => Some(f64::from(v)),
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Short(v) => Some(f64::from(v)),
        AttributeValue::Int(v) => Some(f64::from(v)),
        AttributeValue::Schar(v) => Some(f64::from(v)),
        AttributeValue::Uchar(v) => Some(f64::from(v)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, IxDyn};

    #[test]
    fn slice_dim_keeps_every_fifth_from_four() {
        let var = DataVariable::new(
            vec![TIME],
            Array1::from_iter((0..25).map(|i| i as f32)).into_dyn(),
        )
        .unwrap();
        let sliced = var.slice_dim(TIME, 4, 5);
        assert_eq!(sliced.data.as_slice().unwrap(), &[4.0, 9.0, 14.0, 19.0, 24.0]);
    }

    #[test]
    fn slice_past_end_is_empty() {
        let var = DataVariable::new(vec![TIME], ArrayD::zeros(IxDyn(&[3]))).unwrap();
        assert_eq!(var.slice_dim(TIME, 4, 5).data.len(), 0);
    }

    #[test]
    fn insert_rejects_conflicting_dimension_lengths() {
        let cube = Minicube::new()
            .with_variable("a", vec![TIME], ArrayD::zeros(IxDyn(&[4])))
            .unwrap();
        let err = cube.with_variable("b", vec![TIME], ArrayD::zeros(IxDyn(&[5])));
        assert!(matches!(err, Err(EarthNetError::Shape { .. })));
    }

    #[test]
    fn transposed_reorders_axes() {
        let data = ArrayD::from_shape_fn(IxDyn(&[2, 3]), |ix| (ix[0] * 10 + ix[1]) as f32);
        let var = DataVariable::new(vec![LAT, LON], data).unwrap();
        let t = var.transposed("x", &[LON, LAT]).unwrap();
        assert_eq!(t.shape(), &[3, 2]);
        assert_eq!(t[[2, 1]], 12.0);
        assert!(var.transposed("x", &[LON, TIME]).is_err());
    }
}
