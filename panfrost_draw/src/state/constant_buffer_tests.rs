//! Unit tests for constant_buffer.rs

use super::*;

fn user(bytes: &[u8]) -> ConstantBuffer {
    ConstantBuffer { data: ConstantBufferData::User(Arc::from(bytes)), size: bytes.len() as u32 }
}

#[test]
fn test_ubo_count_counts_slot_zero() {
    let state = ConstantBufferState::default();
    assert_eq!(state.ubo_count(), 1);
}

#[test]
fn test_ubo_count_includes_gaps() {
    let mut state = ConstantBufferState::default();
    state.set(3, Some(user(&[0; 16])));

    assert_eq!(state.enabled_mask, 0b1000);
    assert_eq!(state.ubo_count(), 4);
}

#[test]
fn test_unbind_clears_masks() {
    let mut state = ConstantBufferState::default();
    state.set(1, Some(user(&[1; 32])));
    state.set(2, Some(user(&[2; 32])));
    state.set(2, None);

    assert_eq!(state.enabled_mask, 0b10);
    assert_eq!(state.dirty_mask, 0b10);
    assert!(state.cb[2].is_none());
    assert_eq!(state.ubo_count(), 2);
}

#[test]
#[should_panic]
fn test_out_of_range_slot_panics() {
    let mut state = ConstantBufferState::default();
    state.set(MAX_CONSTANT_BUFFERS, None);
}
