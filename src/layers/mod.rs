//! 레이어 구현 모듈

pub mod butterfly_linear;

pub use butterfly_linear::ButterflyLinear;
