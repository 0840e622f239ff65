//! 수치 정밀도 모드와 스칼라 트레이트
//!
//! 하드웨어는 IEEE binary16(f16)으로 연산하므로 같은 버터플라이 네트워크를
//! f16과 f32에서 모두 돌려 단계별로 비교할 수 있어야 한다.

use crate::error::{shape, Result};
use half::f16;
use ndarray::{Array, Array3, Dimension, Zip};
use num::{Complex, Zero};
use std::fmt::Debug;
use std::ops::{Add, Mul};

/// 연산 정밀도
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// f16. 하드웨어 결과와 비트 단위로 맞추기 위한 모드
    Half,
    /// f32 레퍼런스 모드
    Single,
}

/// 버터플라이 엔진이 다룰 수 있는 원소 타입
///
/// 실수/복소수, f16/f32/f64 모두 같은 코드 경로를 탄다.
pub trait ButterflyScalar:
    Copy + Zero + Add<Output = Self> + Mul<Output = Self> + Send + Sync + Debug + 'static
{
}

impl<T> ButterflyScalar for T where
    T: Copy + Zero + Add<Output = T> + Mul<Output = T> + Send + Sync + Debug + 'static
{
}

/// 실수부/허수부를 따로 꺼내기 위한 트레이트 (테스트 벡터 덤프용)
pub trait SplitComplex {
    fn re(&self) -> f64;
    fn im(&self) -> f64;
}

impl SplitComplex for f32 {
    fn re(&self) -> f64 {
        *self as f64
    }
    fn im(&self) -> f64 {
        0.0
    }
}

impl SplitComplex for f64 {
    fn re(&self) -> f64 {
        *self
    }
    fn im(&self) -> f64 {
        0.0
    }
}

impl SplitComplex for f16 {
    fn re(&self) -> f64 {
        self.to_f64()
    }
    fn im(&self) -> f64 {
        0.0
    }
}

impl<T: SplitComplex> SplitComplex for Complex<T> {
    fn re(&self) -> f64 {
        self.re.re()
    }
    fn im(&self) -> f64 {
        self.im.re()
    }
}

/// f32 텐서를 f16으로 변환
pub fn to_half<D: Dimension>(a: &Array<f32, D>) -> Array<f16, D> {
    a.mapv(f16::from_f32)
}

/// 복소 f32 텐서를 복소 f16으로 변환
pub fn to_half_complex<D: Dimension>(a: &Array<Complex<f32>, D>) -> Array<Complex<f16>, D> {
    a.mapv(|z| Complex::new(f16::from_f32(z.re), f16::from_f32(z.im)))
}

/// f16 텐서를 f32로 확장
pub fn to_single<D: Dimension>(a: &Array<f16, D>) -> Array<f32, D> {
    a.mapv(f16::to_f32)
}

/// 복소 f16 텐서를 복소 f32로 확장
pub fn to_single_complex<D: Dimension>(a: &Array<Complex<f16>, D>) -> Array<Complex<f32>, D> {
    a.mapv(|z| Complex::new(z.re.to_f32(), z.im.to_f32()))
}

/// 두 실행 결과를 단계별로 비교해 단계마다 최대 절대 오차를 돌려준다
///
/// 실수부와 허수부 중 큰 쪽 오차를 쓴다.
pub fn stage_deviation<A, B>(lhs: &[Array3<A>], rhs: &[Array3<B>]) -> Result<Vec<f64>>
where
    A: SplitComplex,
    B: SplitComplex,
{
    if lhs.len() != rhs.len() {
        return Err(shape(format!(
            "stage count mismatch: {} vs {}",
            lhs.len(),
            rhs.len()
        )));
    }
    lhs.iter()
        .zip(rhs.iter())
        .enumerate()
        .map(|(i, (a, b))| {
            if a.shape() != b.shape() {
                return Err(shape(format!(
                    "stage {} shape mismatch: {:?} vs {:?}",
                    i,
                    a.shape(),
                    b.shape()
                )));
            }
            let mut worst = 0.0f64;
            Zip::from(a).and(b).for_each(|x, y| {
                let d = (x.re() - y.re()).abs().max((x.im() - y.im()).abs());
                worst = worst.max(d);
            });
            Ok(worst)
        })
        .collect()
}
