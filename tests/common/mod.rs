//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use mimic_rs::Vec3;

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f32, b: f32, epsilon: f32) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Assert two vectors are approximately equal component-wise
pub fn assert_vec_eq(a: Vec3, b: Vec3) {
    assert_float_eq(a.x, b.x, 1e-4);
    assert_float_eq(a.y, b.y, 1e-4);
    assert_float_eq(a.z, b.z, 1e-4);
}
