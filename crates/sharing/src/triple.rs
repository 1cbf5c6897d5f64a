//! Beaver triples
//!
//! A triple `(a, b, c)` with `c = a * b`, `c = a @ b` or `c = a & b`,
//! depending on its kind. Each party holds one [`TripleShare`]; both shares of
//! the same triple carry the same [`TripleId`].
//!
//! `TripleShare` is not `Clone`. Consuming one moves it, so a single share
//! cannot feed two multiplications.

use std::fmt;

use privlookup_fixed_point::RingTensor;
use zeroize::Zeroize;

/// Identifier assigned by the dealer in issue order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TripleId(pub u64);

impl fmt::Display for TripleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What relation `c` has to `a` and `b`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TripleKind {
    /// Additive shares, `c = a * b` elementwise
    Elementwise,
    /// Additive shares, `a: [m, k]`, `b: [k, n]`, `c = a @ b`
    MatMul,
    /// XOR shares, `c = a & b` bitwise
    Binary,
}

impl TripleKind {
    pub fn to_u8(self) -> u8 {
        match self {
            TripleKind::Elementwise => 1,
            TripleKind::MatMul => 2,
            TripleKind::Binary => 3,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(TripleKind::Elementwise),
            2 => Some(TripleKind::MatMul),
            3 => Some(TripleKind::Binary),
            _ => None,
        }
    }
}

/// The kind and operand shapes a multiplication needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripleRequest {
    pub kind: TripleKind,
    pub a_shape: Vec<usize>,
    pub b_shape: Vec<usize>,
}

impl TripleRequest {
    pub fn elementwise(shape: &[usize]) -> Self {
        Self {
            kind: TripleKind::Elementwise,
            a_shape: shape.to_vec(),
            b_shape: shape.to_vec(),
        }
    }

    pub fn matmul(m: usize, k: usize, n: usize) -> Self {
        Self {
            kind: TripleKind::MatMul,
            a_shape: vec![m, k],
            b_shape: vec![k, n],
        }
    }

    pub fn binary(shape: &[usize]) -> Self {
        Self {
            kind: TripleKind::Binary,
            a_shape: shape.to_vec(),
            b_shape: shape.to_vec(),
        }
    }

    /// Shape of `c`
    pub fn c_shape(&self) -> Vec<usize> {
        match self.kind {
            TripleKind::MatMul => vec![self.a_shape[0], self.b_shape[1]],
            TripleKind::Elementwise | TripleKind::Binary => self.a_shape.clone(),
        }
    }

    /// Ring elements one party stores for this triple
    pub fn share_len(&self) -> usize {
        let len = |s: &[usize]| s.iter().product::<usize>();
        len(&self.a_shape) + len(&self.b_shape) + len(&self.c_shape())
    }
}

/// One party's share of a triple
#[derive(Debug)]
pub struct TripleShare {
    id: TripleId,
    kind: TripleKind,
    a: RingTensor,
    b: RingTensor,
    c: RingTensor,
}

impl Drop for TripleShare {
    fn drop(&mut self) {
        self.a.data_mut().zeroize();
        self.b.data_mut().zeroize();
        self.c.data_mut().zeroize();
    }
}

impl TripleShare {
    pub(crate) fn new(id: TripleId, kind: TripleKind, a: RingTensor, b: RingTensor, c: RingTensor) -> Self {
        Self { id, kind, a, b, c }
    }

    pub fn id(&self) -> TripleId {
        self.id
    }

    pub fn kind(&self) -> TripleKind {
        self.kind
    }

    /// Whether this share can serve `request`
    pub fn matches(&self, request: &TripleRequest) -> bool {
        self.kind == request.kind
            && self.a.shape() == request.a_shape.as_slice()
            && self.b.shape() == request.b_shape.as_slice()
    }

    pub(crate) fn a(&self) -> &RingTensor {
        &self.a
    }

    pub(crate) fn b(&self) -> &RingTensor {
        &self.b
    }

    pub(crate) fn c(&self) -> &RingTensor {
        &self.c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shapes() {
        let req = TripleRequest::matmul(2, 3, 4);
        assert_eq!(req.c_shape(), vec![2, 4]);
        assert_eq!(req.share_len(), 6 + 12 + 8);

        let req = TripleRequest::binary(&[2, 5]);
        assert_eq!(req.c_shape(), vec![2, 5]);
        assert_eq!(req.share_len(), 30);
    }

    #[test]
    fn test_kind_codes() {
        for kind in [TripleKind::Elementwise, TripleKind::MatMul, TripleKind::Binary] {
            assert_eq!(TripleKind::from_u8(kind.to_u8()), Some(kind));
        }
        assert_eq!(TripleKind::from_u8(0), None);
    }

    #[test]
    fn test_matches_request() {
        let share = TripleShare::new(
            TripleId(3),
            TripleKind::Elementwise,
            RingTensor::zeros(vec![4]),
            RingTensor::zeros(vec![4]),
            RingTensor::zeros(vec![4]),
        );
        assert!(share.matches(&TripleRequest::elementwise(&[4])));
        assert!(!share.matches(&TripleRequest::elementwise(&[5])));
        assert!(!share.matches(&TripleRequest::binary(&[4])));
    }
}
