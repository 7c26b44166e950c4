//! Axis-aligned bounds over x/y and the optional z and m axes.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::coordinate::Dimension;

/// Minimum of two values where NaN means "no value".
///
/// Both NaN yields NaN. Signed zeros are ordered by `total_cmp`, so the
/// result does not depend on argument order.
#[inline]
pub fn nan_minimum(a: f64, b: f64) -> f64 {
    match (a.is_nan(), b.is_nan()) {
        (true, _) => b,
        (_, true) => a,
        _ => {
            if b.total_cmp(&a).is_lt() {
                b
            } else {
                a
            }
        }
    }
}

/// Maximum counterpart of [`nan_minimum`].
#[inline]
pub fn nan_maximum(a: f64, b: f64) -> f64 {
    match (a.is_nan(), b.is_nan()) {
        (true, _) => b,
        (_, true) => a,
        _ => {
            if b.total_cmp(&a).is_gt() {
                b
            } else {
                a
            }
        }
    }
}

/// Bounding envelope.
///
/// Axes outside the envelope's [`Dimension`] are stored as NaN. An envelope
/// whose every bound is NaN is empty.
#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    dimension: Dimension,
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
    min_z: f64,
    max_z: f64,
    min_m: f64,
    max_m: f64,
}

impl Envelope {
    /// The canonical two dimensional empty envelope.
    pub const EMPTY: Envelope = Envelope::empty(Dimension::Xy);

    pub const fn empty(dimension: Dimension) -> Self {
        Self {
            dimension,
            min_x: f64::NAN,
            max_x: f64::NAN,
            min_y: f64::NAN,
            max_y: f64::NAN,
            min_z: f64::NAN,
            max_z: f64::NAN,
            min_m: f64::NAN,
            max_m: f64::NAN,
        }
    }

    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        let mut e = Self::empty(Dimension::Xy);
        e.min_x = min_x;
        e.min_y = min_y;
        e.max_x = max_x;
        e.max_y = max_y;
        e
    }

    pub const fn new_z(min_x: f64, min_y: f64, min_z: f64, max_x: f64, max_y: f64, max_z: f64) -> Self {
        let mut e = Self::new(min_x, min_y, max_x, max_y);
        e.dimension = Dimension::Xyz;
        e.min_z = min_z;
        e.max_z = max_z;
        e
    }

    pub const fn new_m(min_x: f64, min_y: f64, min_m: f64, max_x: f64, max_y: f64, max_m: f64) -> Self {
        let mut e = Self::new(min_x, min_y, max_x, max_y);
        e.dimension = Dimension::Xym;
        e.min_m = min_m;
        e.max_m = max_m;
        e
    }

    #[allow(clippy::too_many_arguments)]
    pub const fn new_zm(
        min_x: f64,
        min_y: f64,
        min_z: f64,
        min_m: f64,
        max_x: f64,
        max_y: f64,
        max_z: f64,
        max_m: f64,
    ) -> Self {
        let mut e = Self::new_z(min_x, min_y, min_z, max_x, max_y, max_z);
        e.dimension = Dimension::Xyzm;
        e.min_m = min_m;
        e.max_m = max_m;
        e
    }

    #[inline]
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    #[inline]
    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    #[inline]
    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    #[inline]
    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    #[inline]
    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    /// `(min_z, max_z)` when the envelope carries a z axis.
    pub fn z_range(&self) -> Option<(f64, f64)> {
        self.dimension.has_z().then_some((self.min_z, self.max_z))
    }

    /// `(min_m, max_m)` when the envelope carries an m axis.
    pub fn m_range(&self) -> Option<(f64, f64)> {
        self.dimension.has_m().then_some((self.min_m, self.max_m))
    }

    pub fn is_empty(&self) -> bool {
        self.to_array().iter().all(|v| v.is_nan())
    }

    /// Smallest envelope containing both inputs. NaN bounds are ignored,
    /// so combining with an empty envelope is the identity.
    pub fn combine(&self, other: &Envelope) -> Envelope {
        Envelope {
            dimension: self.dimension.union(other.dimension),
            min_x: nan_minimum(self.min_x, other.min_x),
            max_x: nan_maximum(self.max_x, other.max_x),
            min_y: nan_minimum(self.min_y, other.min_y),
            max_y: nan_maximum(self.max_y, other.max_y),
            min_z: nan_minimum(self.min_z, other.min_z),
            max_z: nan_maximum(self.max_z, other.max_z),
            min_m: nan_minimum(self.min_m, other.min_m),
            max_m: nan_maximum(self.max_m, other.max_m),
        }
    }

    /// Bounds in GeoPackage order: min x, max x, min y, max y, then
    /// z and m pairs when present.
    pub fn to_array(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(8);
        out.extend_from_slice(&[self.min_x, self.max_x, self.min_y, self.max_y]);
        if self.dimension.has_z() {
            out.extend_from_slice(&[self.min_z, self.max_z]);
        }
        if self.dimension.has_m() {
            out.extend_from_slice(&[self.min_m, self.max_m]);
        }
        out
    }

    /// Inverse of [`Envelope::to_array`]; `None` when the slice length does
    /// not match the dimensionality.
    pub fn from_array(dimension: Dimension, values: &[f64]) -> Option<Envelope> {
        let v = values;
        match (dimension, v.len()) {
            (Dimension::Xy, 4) => Some(Envelope::new(v[0], v[2], v[1], v[3])),
            (Dimension::Xyz, 6) => Some(Envelope::new_z(v[0], v[2], v[4], v[1], v[3], v[5])),
            (Dimension::Xym, 6) => Some(Envelope::new_m(v[0], v[2], v[4], v[1], v[3], v[5])),
            (Dimension::Xyzm, 8) => Some(Envelope::new_zm(
                v[0], v[2], v[4], v[6], v[1], v[3], v[5], v[7],
            )),
            _ => None,
        }
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Envelope::EMPTY
    }
}

impl PartialEq for Envelope {
    fn eq(&self, other: &Self) -> bool {
        self.dimension == other.dimension
            && self
                .to_array()
                .iter()
                .zip(other.to_array().iter())
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for Envelope {}

impl Hash for Envelope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dimension.hash(state);
        for v in self.to_array() {
            v.to_bits().hash(state);
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("EMPTY");
        }
        write!(f, "[{}, {}] x [{}, {}]", self.min_x, self.max_x, self.min_y, self.max_y)?;
        if let Some((lo, hi)) = self.z_range() {
            write!(f, " z [{lo}, {hi}]")?;
        }
        if let Some((lo, hi)) = self.m_range() {
            write!(f, " m [{lo}, {hi}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bound() -> impl Strategy<Value = f64> {
        prop_oneof![
            1 => Just(f64::NAN),
            1 => Just(0.0),
            1 => Just(-0.0),
            6 => -1.0e6..1.0e6f64,
        ]
    }

    fn envelope() -> impl Strategy<Value = Envelope> {
        (bound(), bound(), bound(), bound(), bound(), bound(), any::<bool>()).prop_map(
            |(a, b, c, d, z0, z1, with_z)| {
                if with_z {
                    Envelope::new_z(a, b, z0, c, d, z1)
                } else {
                    Envelope::new(a, b, c, d)
                }
            },
        )
    }

    #[test]
    fn test_nan_minimum_ignores_nan() {
        assert_eq!(nan_minimum(f64::NAN, 3.0), 3.0);
        assert_eq!(nan_minimum(3.0, f64::NAN), 3.0);
        assert!(nan_minimum(f64::NAN, f64::NAN).is_nan());
        assert_eq!(nan_maximum(-1.0, 2.0), 2.0);
    }

    #[test]
    fn test_combine_grows_bounds() {
        let a = Envelope::new(0.0, 0.0, 1.0, 1.0);
        let b = Envelope::new(-2.0, 0.5, 0.5, 4.0);
        let c = a.combine(&b);
        assert_eq!(c, Envelope::new(-2.0, 0.0, 1.0, 4.0));
    }

    #[test]
    fn test_combine_mixed_dimension_keeps_z() {
        let a = Envelope::new(0.0, 0.0, 1.0, 1.0);
        let b = Envelope::new_z(0.0, 0.0, 5.0, 1.0, 1.0, 6.0);
        let c = a.combine(&b);
        assert_eq!(c.dimension(), Dimension::Xyz);
        assert_eq!(c.z_range(), Some((5.0, 6.0)));
    }

    #[test]
    fn test_to_array_order() {
        let e = Envelope::new_zm(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0);
        assert_eq!(e.to_array(), vec![1.0, 5.0, 2.0, 6.0, 3.0, 7.0, 4.0, 8.0]);
        assert_eq!(Envelope::from_array(Dimension::Xyzm, &e.to_array()), Some(e));
        assert_eq!(Envelope::from_array(Dimension::Xyz, &[0.0; 4]), None);
    }

    #[test]
    fn test_empty_envelope() {
        assert!(Envelope::EMPTY.is_empty());
        assert_eq!(Envelope::EMPTY, Envelope::empty(Dimension::Xy));
        assert_ne!(Envelope::EMPTY, Envelope::empty(Dimension::Xyz));
        assert!(!Envelope::new(f64::NAN, 0.0, f64::NAN, 0.0).is_empty());
    }

    proptest! {
        #[test]
        fn prop_combine_commutes(a in envelope(), b in envelope()) {
            prop_assert_eq!(a.combine(&b), b.combine(&a));
        }

        #[test]
        fn prop_combine_with_empty_is_identity(a in envelope()) {
            prop_assert_eq!(a.combine(&Envelope::EMPTY), a);
            prop_assert_eq!(Envelope::empty(a.dimension()).combine(&a), a);
        }
    }
}
