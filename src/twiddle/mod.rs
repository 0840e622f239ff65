//! 트위들 텐서 초기화 함수들 (항등, FFT, 무작위)

use crate::precision::ButterflyScalar;
use ndarray::{s, Array6};
use num::{Complex, Float, One};
use rand::Rng;
use std::f64::consts::PI;

/// FFT 트위들 배치 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FftOrder {
    /// 시간 솎음(DIT). 입력을 비트 반전 순서로 넣고 stride 증가로 실행하면
    /// 출력이 자연 순서로 나온다
    BitReversedInput,
    /// 주파수 솎음(DIF). 자연 순서 입력, stride 감소로 실행하면 출력이
    /// 비트 반전 순서로 나온다. NPU가 쓰는 방식
    BitReversedOutput,
}

impl FftOrder {
    /// 이 배치에 맞는 첫 블록 stride 방향
    pub fn increasing_stride(self) -> bool {
        matches!(self, FftOrder::BitReversedInput)
    }
}

/// 모든 블록이 단위 행렬인 트위들
pub fn identity_twiddle<T: ButterflyScalar + One>(
    nstacks: usize,
    nblocks: usize,
    log_n: usize,
) -> Array6<T> {
    let half_n = (1usize << log_n) / 2;
    let mut twiddle = Array6::<T>::zeros((nstacks, nblocks, log_n, half_n, 2, 2));
    twiddle.slice_mut(s![.., .., .., .., 0, 0]).fill(T::one());
    twiddle.slice_mut(s![.., .., .., .., 1, 1]).fill(T::one());
    twiddle
}

/// radix-2 FFT 트위들 (스택 1개, 블록 1개)
///
/// 크기 `size`인 버터플라이의 k번째 쌍에 `w = exp(-2πi k / size)`를 쓴다.
/// DIT는 `[[1, w], [1, -w]]`, DIF는 그 전치인 `[[1, 1], [w, -w]]`를
/// stride 감소 순서로 배치한다.
pub fn fft_twiddle<F: Float>(log_n: usize, order: FftOrder) -> Array6<Complex<F>> {
    let n = 1usize << log_n;
    let mut twiddle = Array6::<Complex<F>>::zeros((1, 1, log_n, n / 2, 2, 2));
    let one = Complex::new(F::one(), F::zero());
    for idx in 0..log_n {
        let log_size = match order {
            FftOrder::BitReversedInput => idx + 1,
            FftOrder::BitReversedOutput => log_n - idx,
        };
        let size = 1usize << log_size;
        for h in 0..n / 2 {
            let k = h % (size / 2);
            let angle = -2.0 * PI * k as f64 / size as f64;
            let w = Complex::new(cast::<F>(angle.cos()), cast::<F>(angle.sin()));
            let block = match order {
                FftOrder::BitReversedInput => [[one, w], [one, -w]],
                FftOrder::BitReversedOutput => [[one, one], [w, -w]],
            };
            for (i, row) in block.iter().enumerate() {
                for (j, &v) in row.iter().enumerate() {
                    twiddle[[0, 0, idx, h, i, j]] = v;
                }
            }
        }
    }
    twiddle
}

fn cast<F: Float>(v: f64) -> F {
    F::from(v).unwrap_or_else(F::nan)
}

/// 단위 행렬 근처의 무작위 회전 블록 `[[a, b], [-b, a]]`
///
/// a는 1에 가깝게, b는 0에 가깝게 뽑는다.
pub fn random_twiddle<R: Rng>(
    nstacks: usize,
    nblocks: usize,
    log_n: usize,
    rng: &mut R,
) -> Array6<f32> {
    let half_n = (1usize << log_n) / 2;
    let count = nstacks * nblocks * log_n * half_n;
    let params: Vec<(f32, f32)> = (0..count)
        .map(|_| {
            let a = 1.0 - rng.gen::<f32>() * 0.1;
            let b = (rng.gen::<f32>() - 0.5) * 0.1;
            (a, b)
        })
        .collect();
    Array6::from_shape_fn(
        (nstacks, nblocks, log_n, half_n, 2, 2),
        |(s, b, l, h, i, j)| {
            let (a, c) = params[((s * nblocks + b) * log_n + l) * half_n + h];
            match (i, j) {
                (0, 0) | (1, 1) => a,
                (0, 1) => c,
                _ => -c,
            }
        },
    )
}
