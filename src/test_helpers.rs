pub(crate) trait TestHelper {
    fn assert_approx_eq<const N: usize>(&self, expected: [f64; N]);
}

impl TestHelper for [f64] {
    fn assert_approx_eq<const N: usize>(&self, expected: [f64; N]) {
        assert_eq!(self.len(), N, "length mismatch: {self:?} vs {expected:?}");
        for (actual, expected) in self.iter().zip(expected) {
            assert!(
                (actual - expected).abs() < 1e-4,
                "{actual} != {expected} in {self:?}"
            );
        }
    }
}

impl TestHelper for Vec<f64> {
    fn assert_approx_eq<const N: usize>(&self, expected: [f64; N]) {
        self.as_slice().assert_approx_eq(expected)
    }
}
