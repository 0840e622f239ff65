//! 버터플라이 연산자 구현 모듈

mod butterfly;
mod reorder;

pub use butterfly::{apply_stage, butterfly_multiply, stage_schedule, ButterflyTrace, StageStep};
pub use reorder::{
    bank_offsets, group_weights, inverse_permutation, reorder_weights, restore_weights,
    stage_permutation, ungroup_weights,
};
