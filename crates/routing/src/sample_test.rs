//! Sample gate tests

use crate::SampleGate;

#[test]
fn test_gate_at_zero_drops_all() {
    let gate = SampleGate::new(0);
    assert!((0..1000).all(|_| !gate.accept()));
}

#[test]
fn test_gate_at_hundred_passes_all() {
    let gate = SampleGate::new(100);
    assert!(gate.is_open());
    assert!((0..1000).all(|_| gate.accept()));
}

#[test]
fn test_gate_clamps_above_hundred() {
    assert_eq!(SampleGate::new(250).percent(), 100);
}

#[test]
fn test_gate_at_fifty_is_roughly_half() {
    const N: u32 = 10_000;
    let gate = SampleGate::new(50);
    let passed = (0..N).filter(|_| gate.accept()).count() as f64;

    // |observed - 0.5 * N| < 4 * sqrt(N): fails with probability < 1e-4
    let expected = f64::from(N) * 0.5;
    let bound = 4.0 * f64::from(N).sqrt();
    assert!(
        (passed - expected).abs() < bound,
        "passed {passed} of {N}, outside {expected} ± {bound}"
    );
}

#[test]
fn test_default_gate_is_open() {
    assert!(SampleGate::default().is_open());
}
