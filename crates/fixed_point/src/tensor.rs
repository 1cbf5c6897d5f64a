//! Row-major tensors over Z_2^64
//!
//! All arithmetic wraps modulo 2^64. Shapes are checked on every binary
//! operation; a mismatch is a programming error surfaced as
//! [`FixedPointError::ShapeMismatch`].

use rand::RngCore;
use rayon::prelude::*;

use crate::error::{FixedPointError, Result};
use crate::fixed::{shift_right_signed, FixedPointEncoder};

/// Below this many output elements the matmul stays on the calling thread
const PAR_MATMUL_MIN: usize = 4096;

/// A dense tensor of ring elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingTensor {
    shape: Vec<usize>,
    data: Vec<u64>,
}

impl RingTensor {
    /// Create from raw ring elements
    pub fn from_raw(data: Vec<u64>, shape: Vec<usize>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(FixedPointError::ShapeMismatch {
                expected: shape,
                got: vec![data.len()],
            });
        }
        Ok(Self { shape, data })
    }

    /// Encode real values with the given encoder
    pub fn from_f64(values: &[f64], shape: Vec<usize>, encoder: &FixedPointEncoder) -> Result<Self> {
        Self::from_raw(encoder.encode_slice(values)?, shape)
    }

    /// Encode integer values at scale 0
    pub fn from_u32(values: &[u32], shape: Vec<usize>) -> Result<Self> {
        Self::from_raw(values.iter().map(|&v| v as u64).collect(), shape)
    }

    /// All-zero tensor
    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0; len],
        }
    }

    /// Uniformly random ring elements
    pub fn random<R: RngCore>(shape: Vec<usize>, rng: &mut R) -> Self {
        let len: usize = shape.iter().product();
        let data = (0..len).map(|_| rng.next_u64()).collect();
        Self { shape, data }
    }

    /// Identity matrix of size n (entries at scale 0)
    pub fn identity(n: usize) -> Self {
        let mut t = Self::zeros(vec![n, n]);
        for i in 0..n {
            t.data[i * n + i] = 1;
        }
        t
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[u64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u64] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u64> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decode every element with the given encoder
    pub fn to_f64_vec(&self, encoder: &FixedPointEncoder) -> Vec<f64> {
        encoder.decode_slice(&self.data)
    }

    /// Same data, new shape with the same element count
    pub fn reshape(self, shape: Vec<usize>) -> Result<Self> {
        Self::from_raw(self.data, shape)
    }

    fn check_same_shape(&self, other: &Self) -> Result<()> {
        if self.shape != other.shape {
            return Err(FixedPointError::ShapeMismatch {
                expected: self.shape.clone(),
                got: other.shape.clone(),
            });
        }
        Ok(())
    }

    fn zip_with(&self, other: &Self, f: impl Fn(u64, u64) -> u64 + Sync) -> Result<Self> {
        self.check_same_shape(other)?;
        let data = self
            .data
            .par_iter()
            .zip(other.data.par_iter())
            .map(|(&a, &b)| f(a, b))
            .collect();
        Ok(Self {
            shape: self.shape.clone(),
            data,
        })
    }

    fn map(&self, f: impl Fn(u64) -> u64 + Sync) -> Self {
        Self {
            shape: self.shape.clone(),
            data: self.data.par_iter().map(|&a| f(a)).collect(),
        }
    }

    pub fn add(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, u64::wrapping_add)
    }

    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, u64::wrapping_sub)
    }

    /// Elementwise product
    pub fn mul(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, u64::wrapping_mul)
    }

    pub fn xor(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a ^ b)
    }

    pub fn and(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a & b)
    }

    pub fn neg(&self) -> Self {
        self.map(u64::wrapping_neg)
    }

    pub fn not(&self) -> Self {
        self.map(|a| !a)
    }

    pub fn add_scalar(&self, scalar: u64) -> Self {
        self.map(|a| a.wrapping_add(scalar))
    }

    pub fn mul_scalar(&self, scalar: u64) -> Self {
        self.map(|a| a.wrapping_mul(scalar))
    }

    pub fn and_scalar(&self, mask: u64) -> Self {
        self.map(|a| a & mask)
    }

    /// Logical right shift of every element
    pub fn shr(&self, bits: u32) -> Self {
        self.map(|a| a >> bits)
    }

    /// Arithmetic right shift, reading every element as signed
    pub fn shr_signed(&self, bits: u8) -> Self {
        self.map(|a| shift_right_signed(a, bits))
    }

    /// Matrix product of `[m, k] @ [k, n]`
    pub fn matmul(&self, other: &Self) -> Result<Self> {
        let (m, k) = self.matrix_dims()?;
        let (k2, n) = other.matrix_dims()?;
        if k != k2 {
            return Err(FixedPointError::ShapeMismatch {
                expected: vec![k, n],
                got: other.shape.clone(),
            });
        }

        let mut out = vec![0u64; m * n];
        let row = |(i, out_row): (usize, &mut [u64])| {
            let lhs = &self.data[i * k..(i + 1) * k];
            for (p, &a) in lhs.iter().enumerate() {
                if a == 0 {
                    continue;
                }
                let rhs = &other.data[p * n..(p + 1) * n];
                for (o, &b) in out_row.iter_mut().zip(rhs) {
                    *o = o.wrapping_add(a.wrapping_mul(b));
                }
            }
        };
        if m * n >= PAR_MATMUL_MIN {
            out.par_chunks_mut(n.max(1)).enumerate().for_each(row);
        } else {
            out.chunks_mut(n.max(1)).enumerate().for_each(row);
        }

        Ok(Self {
            shape: vec![m, n],
            data: out,
        })
    }

    /// Sum along `axis`, removing it from the shape
    pub fn sum_axis(&self, axis: usize) -> Result<Self> {
        if axis >= self.shape.len() {
            return Err(FixedPointError::InvalidAxis {
                axis,
                rank: self.shape.len(),
            });
        }
        let outer: usize = self.shape[..axis].iter().product();
        let len = self.shape[axis];
        let inner: usize = self.shape[axis + 1..].iter().product();

        let mut data = vec![0u64; outer * inner];
        for o in 0..outer {
            for l in 0..len {
                let src = &self.data[(o * len + l) * inner..(o * len + l + 1) * inner];
                let dst = &mut data[o * inner..(o + 1) * inner];
                for (d, &s) in dst.iter_mut().zip(src) {
                    *d = d.wrapping_add(s);
                }
            }
        }

        let mut shape = self.shape.clone();
        shape.remove(axis);
        Ok(Self { shape, data })
    }

    /// Append a trailing axis of length `values.len()` holding `self[..] - values[v]`
    pub fn broadcast_sub(&self, values: &[u64]) -> Self {
        let v = values.len();
        let mut data = vec![0u64; self.data.len() * v];
        data.par_chunks_mut(v.max(1))
            .zip(self.data.par_iter())
            .for_each(|(chunk, &x)| {
                for (d, &m) in chunk.iter_mut().zip(values) {
                    *d = x.wrapping_sub(m);
                }
            });
        let mut shape = self.shape.clone();
        shape.push(v);
        Self { shape, data }
    }

    /// Append a trailing axis of length `len`, repeating each element
    pub fn broadcast_repeat(&self, len: usize) -> Self {
        let data = self
            .data
            .iter()
            .flat_map(|&x| std::iter::repeat(x).take(len))
            .collect();
        let mut shape = self.shape.clone();
        shape.push(len);
        Self { shape, data }
    }

    fn matrix_dims(&self) -> Result<(usize, usize)> {
        match self.shape.as_slice() {
            &[rows, cols] => Ok((rows, cols)),
            _ => Err(FixedPointError::ShapeMismatch {
                expected: vec![0, 0],
                got: self.shape.clone(),
            }),
        }
    }
}
