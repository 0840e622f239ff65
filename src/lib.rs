//! bfly_npu: 버터플라이 팩터화 선형 레이어를 위한 Rust 라이브러리
//!
//! 이 라이브러리는 학습된 2x2 블록으로 이루어진 radix-2 버터플라이 곱셈과,
//! 그 단계별 가중치를 병렬 버터플라이 유닛(NPU)의 BRAM 뱅크 충돌이 없는
//! 레이아웃으로 바꾸는 오프라인 변환을 제공합니다.

pub mod config;
pub mod error;
pub mod export;
pub mod layers;
pub mod ops;
pub mod precision;
pub mod twiddle;
pub mod utils;

#[cfg(feature = "python")]
pub mod python;

pub use config::ButterflyConfig;
pub use error::{Error, Result};
pub use layers::ButterflyLinear;
pub use ops::{butterfly_multiply, reorder_weights, ButterflyTrace};
pub use precision::{ButterflyScalar, Precision, SplitComplex};
pub use twiddle::{fft_twiddle, identity_twiddle, random_twiddle, FftOrder};
pub use utils::numeric::bit_reverse_permutation;

/// 자주 사용되는 핵심 기능들을 쉽게 가져올 수 있는 prelude 모듈
pub mod prelude {
    pub use crate::{
        bit_reverse_permutation, butterfly_multiply, fft_twiddle, identity_twiddle,
        random_twiddle, reorder_weights, ButterflyConfig, ButterflyLinear, ButterflyScalar,
        ButterflyTrace, Error, FftOrder, Precision, Result, SplitComplex,
    };
}
