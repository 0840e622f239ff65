//! 버터플라이 선형 레이어
//!
//! 트위들 텐서와 설정을 묶어 두 단계 파이프라인을 명시적으로 만든다.
//! `forward`가 단계별 결과를 담은 `ButterflyTrace`를 돌려주고,
//! `export_weights`가 그 가중치 스냅샷을 받아 하드웨어 레이아웃으로 바꾼다.

use crate::config::ButterflyConfig;
use crate::error::{self, shape, Result};
use crate::ops::{butterfly_multiply, reorder_weights, ButterflyTrace};
use crate::precision::ButterflyScalar;
use crate::twiddle::{fft_twiddle, identity_twiddle, random_twiddle, FftOrder};
use ndarray::{Array3, Array6};
use num::{Complex, Float, One};
use rand::Rng;

/// 버터플라이 레이어 구조체
///
/// 계산 정밀도는 원소 타입 `T`가 정한다. `config.precision`은 보지 않는다.
#[derive(Debug, Clone)]
pub struct ButterflyLinear<T> {
    /// 레이어 설정
    config: ButterflyConfig,
    /// (stacks, nblocks, log_n, n/2, 2, 2)
    twiddle: Array6<T>,
}

impl<T: ButterflyScalar> ButterflyLinear<T> {
    /// 주어진 트위들로 레이어 생성
    pub fn new(config: ButterflyConfig, twiddle: Array6<T>) -> Result<Self> {
        config.validate()?;
        let (_, nblocks, log_n, half_n, rows, cols) = twiddle.dim();
        if nblocks != config.nblocks
            || log_n != config.log_n()
            || half_n != config.n / 2
            || (rows, cols) != (2, 2)
        {
            return Err(shape(format!(
                "twiddle {:?} does not match n = {}, nblocks = {}",
                twiddle.shape(),
                config.n,
                config.nblocks
            )));
        }
        Ok(ButterflyLinear { config, twiddle })
    }

    pub fn config(&self) -> &ButterflyConfig {
        &self.config
    }

    pub fn twiddle(&self) -> &Array6<T> {
        &self.twiddle
    }

    /// 스택 수
    pub fn nstacks(&self) -> usize {
        self.twiddle.shape()[0]
    }

    /// 순전파. 출력과 단계별 활성값/가중치를 모두 돌려준다
    pub fn forward(&self, input: &Array3<T>) -> Result<ButterflyTrace<T>> {
        self.forward_truncated(input, None)
    }

    /// 출력 길이를 제한한 순전파
    pub fn forward_truncated(
        &self,
        input: &Array3<T>,
        output_size: Option<usize>,
    ) -> Result<ButterflyTrace<T>> {
        butterfly_multiply(
            &self.twiddle,
            input,
            self.config.increasing_stride,
            output_size,
        )
    }

    /// `forward`가 남긴 가중치 스냅샷을 하드웨어 레이아웃으로 변환
    pub fn export_weights(&self, mut weights: Vec<Array3<T>>) -> Result<Vec<Array3<T>>> {
        reorder_weights(&mut weights, self.config.n, self.config.bu_parallelism)?;
        Ok(weights)
    }
}

impl<T: ButterflyScalar + One> ButterflyLinear<T> {
    /// 모든 블록이 단위 행렬인 레이어
    pub fn identity(config: ButterflyConfig, nstacks: usize) -> Result<Self> {
        config.validate()?;
        let twiddle = identity_twiddle(nstacks, config.nblocks, config.log_n());
        Self::new(config, twiddle)
    }
}

impl<F: Float + ButterflyScalar> ButterflyLinear<Complex<F>> {
    /// FFT로 초기화한 레이어. stride 방향에 따라 DIT/DIF 배치를 고른다
    pub fn fft(config: ButterflyConfig) -> Result<Self> {
        config.validate()?;
        if config.nblocks != 1 {
            return Err(error::config(format!(
                "fft initialisation needs exactly one block, got {}",
                config.nblocks
            )));
        }
        let order = if config.increasing_stride {
            FftOrder::BitReversedInput
        } else {
            FftOrder::BitReversedOutput
        };
        Self::new(config, fft_twiddle(config.log_n(), order))
    }
}

impl ButterflyLinear<f32> {
    /// 단위 행렬 근처의 무작위 회전으로 초기화
    pub fn random<R: Rng>(config: ButterflyConfig, nstacks: usize, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let twiddle = random_twiddle(nstacks, config.nblocks, config.log_n(), rng);
        Self::new(config, twiddle)
    }
}
