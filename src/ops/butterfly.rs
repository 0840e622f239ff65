//! 버터플라이 곱셈 엔진
//!
//! `nblocks × log2(n)`개의 radix-2 단계를 순서대로 적용한다. 각 단계는 stride
//! 간격의 원소 쌍마다 학습된 2x2 블록을 곱한다. 단계별 활성값과 가중치
//! 스냅샷을 모두 남겨서 이후 가중치 레이아웃 변환과 하드웨어 검증에 넘긴다.

use crate::error::{config, shape, Result};
use crate::precision::ButterflyScalar;
use ndarray::{s, Array3, Array6, ArrayView3, ArrayView4, ArrayViewMut1, ArrayViewMut2, Axis};
use tracing::debug;

/// 곱셈 한 번의 결과물
///
/// 활성값과 가중치는 모두 소유된 복사본이다. 이후 트위들 텐서가 바뀌어도
/// 스냅샷은 변하지 않는다.
#[derive(Debug, Clone)]
pub struct ButterflyTrace<T> {
    /// 최종 출력 (batch, stacks, output_size)
    pub output: Array3<T>,
    /// 단계별 활성값 (batch, stacks, n), 실행 순서
    pub activations: Vec<Array3<T>>,
    /// 단계별 가중치 (stacks, n/2, 4), 실행 순서
    pub weights: Vec<Array3<T>>,
}

impl<T> ButterflyTrace<T> {
    /// 실행된 단계 수 (nblocks * log_n)
    pub fn num_stages(&self) -> usize {
        self.activations.len()
    }

    /// 가중치 스냅샷만 꺼낸다. 레이아웃 변환 단계의 입력
    pub fn into_weights(self) -> Vec<Array3<T>> {
        self.weights
    }
}

/// 단계 하나의 실행 정보
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageStep {
    pub block: usize,
    /// 블록 안에서의 단계 번호 (트위들 텐서의 stage 축 인덱스)
    pub idx: usize,
    pub stride: usize,
}

/// 전체 실행 순서. 블록마다 stride 방향이 뒤집힌다
pub fn stage_schedule(log_n: usize, nblocks: usize, increasing_stride: bool) -> Vec<StageStep> {
    let mut steps = Vec::with_capacity(nblocks * log_n);
    let mut increasing = increasing_stride;
    for block in 0..nblocks {
        for idx in 0..log_n {
            let log_stride = if increasing { idx } else { log_n - 1 - idx };
            steps.push(StageStep {
                block,
                idx,
                stride: 1 << log_stride,
            });
        }
        increasing = !increasing;
    }
    steps
}

/// 버터플라이 곱셈: `y = B(twiddle) · x`
///
/// * `twiddle` - (stacks, nblocks, log_n, n/2, 2, 2)
/// * `input` - (batch, stacks, input_size). n보다 짧으면 오른쪽을 0으로 채우고,
///   길면 앞쪽 n개만 쓴다.
/// * `increasing_stride` - 첫 블록의 stride 방향 (1, 2, ..., n/2 이면 true)
/// * `output_size` - 출력 길이. 기본값 n
pub fn butterfly_multiply<T: ButterflyScalar>(
    twiddle: &Array6<T>,
    input: &Array3<T>,
    increasing_stride: bool,
    output_size: Option<usize>,
) -> Result<ButterflyTrace<T>> {
    let (nstacks, nblocks, log_n, half_n, rows, cols) = twiddle.dim();
    if (rows, cols) != (2, 2) {
        return Err(shape(format!(
            "twiddle blocks must be 2x2, got {}x{}",
            rows, cols
        )));
    }
    if log_n == 0 || log_n >= usize::BITS as usize {
        return Err(config(format!(
            "twiddle must describe n = 2^log_n >= 2, got log_n = {}",
            log_n
        )));
    }
    let n = 1usize << log_n;
    if half_n != n / 2 {
        return Err(shape(format!(
            "twiddle pair axis must be n/2 = {}, got {}",
            n / 2,
            half_n
        )));
    }
    let (batch, in_stacks, input_size) = input.dim();
    if in_stacks != nstacks {
        return Err(shape(format!(
            "input has {} stacks but twiddle has {}",
            in_stacks, nstacks
        )));
    }
    let output_size = output_size.unwrap_or(n);
    if output_size > n {
        return Err(shape(format!(
            "output_size {} exceeds n = {}",
            output_size, n
        )));
    }

    debug!(n, nblocks, batch, nstacks, input_size, increasing_stride, "butterfly multiply");

    // 오른쪽 0 패딩 또는 앞쪽 n개로 자르기
    let mut state = Array3::<T>::zeros((batch, nstacks, n));
    let keep = input_size.min(n);
    state
        .slice_mut(s![.., .., ..keep])
        .assign(&input.slice(s![.., .., ..keep]));

    let schedule = stage_schedule(log_n, nblocks, increasing_stride);
    let mut activations = Vec::with_capacity(schedule.len());
    let mut weights = Vec::with_capacity(schedule.len());

    for step in &schedule {
        let stage = twiddle.slice(s![.., step.block, step.idx, .., .., ..]);
        weights.push(flatten_stage(&stage));
        rotate_state(&mut state, &stage, step.stride);
        activations.push(state.clone());
    }

    let output = state.slice(s![.., .., ..output_size]).to_owned();
    Ok(ButterflyTrace {
        output,
        activations,
        weights,
    })
}

/// 단계 하나를 상태 텐서에 직접 적용
///
/// * `state` - (batch, stacks, n)
/// * `stage` - (stacks, n/2, 2, 2)
pub fn apply_stage<T: ButterflyScalar>(
    state: &mut Array3<T>,
    stage: &ArrayView4<T>,
    stride: usize,
) -> Result<()> {
    let (_, nstacks, n) = state.dim();
    let (w_stacks, half_n, rows, cols) = stage.dim();
    if (rows, cols) != (2, 2) {
        return Err(shape(format!(
            "stage blocks must be 2x2, got {}x{}",
            rows, cols
        )));
    }
    if w_stacks != nstacks || half_n * 2 != n {
        return Err(shape(format!(
            "stage weights {:?} do not match state {:?}",
            stage.shape(),
            state.shape()
        )));
    }
    if stride == 0 || !stride.is_power_of_two() || stride > n / 2 {
        return Err(config(format!(
            "stride {} is not a valid radix-2 stride for n = {}",
            stride, n
        )));
    }
    rotate_state(state, stage, stride);
    Ok(())
}

/// (stacks, n/2, 2, 2) → (stacks, n/2, 4). 행 우선으로 펼친 명시적 복사본
fn flatten_stage<T: ButterflyScalar>(stage: &ArrayView4<T>) -> Array3<T> {
    let (nstacks, half_n, _, _) = stage.dim();
    let mut flat = Array3::<T>::zeros((nstacks, half_n, 4));
    for ((s, h, i, j), &v) in stage.indexed_iter() {
        flat[[s, h, i * 2 + j]] = v;
    }
    flat
}

#[cfg(not(feature = "parallel"))]
fn rotate_state<T: ButterflyScalar>(state: &mut Array3<T>, stage: &ArrayView4<T>, stride: usize) {
    for mut sample in state.axis_iter_mut(Axis(0)) {
        rotate_sample(&mut sample, stage, stride);
    }
}

// 배치 원소끼리는 독립이므로 배치 축으로 나눠 돌린다
#[cfg(feature = "parallel")]
fn rotate_state<T: ButterflyScalar>(state: &mut Array3<T>, stage: &ArrayView4<T>, stride: usize) {
    use ndarray::parallel::prelude::*;

    state
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .for_each(|mut sample| rotate_sample(&mut sample, stage, stride));
}

fn rotate_sample<T: ButterflyScalar>(
    sample: &mut ArrayViewMut2<T>,
    stage: &ArrayView4<T>,
    stride: usize,
) {
    for (lane, blocks) in sample.outer_iter_mut().zip(stage.outer_iter()) {
        rotate_lane(lane, blocks, stride);
    }
}

/// 길이 n 벡터 하나에 stride 단계 적용
///
/// 그룹 g의 k번째 쌍은 (g*2*stride + k, g*2*stride + k + stride)이고
/// 2x2 블록 인덱스는 g*stride + k.
fn rotate_lane<T: ButterflyScalar>(
    mut lane: ArrayViewMut1<T>,
    blocks: ArrayView3<T>,
    stride: usize,
) {
    let n = lane.len();
    for g in 0..n / (2 * stride) {
        for k in 0..stride {
            let a = g * 2 * stride + k;
            let b = a + stride;
            let half = g * stride + k;
            let (x, y) = (lane[a], lane[b]);
            lane[a] = blocks[[half, 0, 0]] * x + blocks[[half, 0, 1]] * y;
            lane[b] = blocks[[half, 1, 0]] * x + blocks[[half, 1, 1]] * y;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::twiddle::identity_twiddle;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, Array, Array4};

    fn ramp(batch: usize, stacks: usize, len: usize) -> Array3<f32> {
        Array::from_shape_fn((batch, stacks, len), |(b, s, i)| {
            (b * 100 + s * 10 + i + 1) as f32
        })
    }

    #[test]
    fn identity_blocks_leave_input_unchanged() {
        let twiddle = identity_twiddle::<f32>(1, 1, 3);
        let input = arr1(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0])
            .into_shape((1, 1, 8))
            .unwrap();
        let trace = butterfly_multiply(&twiddle, &input, false, None).unwrap();
        assert_eq!(trace.output, input);
        assert_eq!(trace.num_stages(), 3);
        for act in &trace.activations {
            assert_eq!(act, &input);
        }
        assert_eq!(trace.weights.len(), 3);
        assert_eq!(trace.weights[0].shape(), &[1, 4, 4]);
        assert_eq!(trace.weights[0][[0, 2, 0]], 1.0);
        assert_eq!(trace.weights[0][[0, 2, 1]], 0.0);
        assert_eq!(trace.weights[0][[0, 2, 3]], 1.0);
    }

    #[test]
    fn short_input_is_zero_padded() {
        let twiddle = identity_twiddle::<f32>(2, 1, 3);
        let input = ramp(2, 2, 5);
        let trace = butterfly_multiply(&twiddle, &input, true, None).unwrap();
        assert_eq!(trace.output.shape(), &[2, 2, 8]);
        assert_eq!(trace.output.slice(s![.., .., ..5]), input);
        assert!(trace.output.slice(s![.., .., 5..]).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn long_input_keeps_leading_elements() {
        let twiddle = identity_twiddle::<f32>(1, 2, 2);
        let input = ramp(3, 1, 9);
        let trace = butterfly_multiply(&twiddle, &input, true, None).unwrap();
        assert_eq!(trace.output, input.slice(s![.., .., ..4]));
        assert_eq!(trace.num_stages(), 4);
    }

    #[test]
    fn exact_length_matches_padded_call() {
        let twiddle = crate::twiddle::fft_twiddle(3, crate::twiddle::FftOrder::BitReversedOutput);
        let input = ramp(1, 1, 8).mapv(|v| num::Complex::new(v, 0.0));
        let mut padded = Array3::<num::Complex<f32>>::zeros((1, 1, 10));
        padded.slice_mut(s![.., .., ..8]).assign(&input);
        let a = butterfly_multiply(&twiddle, &input, false, None).unwrap();
        let b = butterfly_multiply(&twiddle, &padded, false, None).unwrap();
        assert_eq!(a.output, b.output);
    }

    #[test]
    fn output_size_truncates() {
        let twiddle = identity_twiddle::<f64>(1, 1, 3);
        let input = ramp(1, 1, 8).mapv(|v| v as f64);
        let trace = butterfly_multiply(&twiddle, &input, false, Some(3)).unwrap();
        assert_eq!(trace.output.shape(), &[1, 1, 3]);
        assert_eq!(trace.activations[2].shape(), &[1, 1, 8]);
    }

    #[test]
    fn swap_blocks_follow_stride_schedule() {
        // 모든 블록이 [[0,1],[1,0]]이면 각 단계는 stride 간격 원소를 맞바꾼다
        let mut twiddle = Array6::<f32>::zeros((1, 1, 2, 2, 2, 2));
        twiddle.slice_mut(s![.., .., .., .., 0, 1]).fill(1.0);
        twiddle.slice_mut(s![.., .., .., .., 1, 0]).fill(1.0);
        let input = arr1(&[1.0f32, 2.0, 3.0, 4.0]).into_shape((1, 1, 4)).unwrap();

        let inc = butterfly_multiply(&twiddle, &input, true, None).unwrap();
        assert_eq!(inc.activations[0].as_slice().unwrap(), &[2.0, 1.0, 4.0, 3.0]);
        assert_eq!(inc.activations[1].as_slice().unwrap(), &[4.0, 3.0, 2.0, 1.0]);

        let dec = butterfly_multiply(&twiddle, &input, false, None).unwrap();
        assert_eq!(dec.activations[0].as_slice().unwrap(), &[3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn second_block_reverses_direction() {
        let steps = stage_schedule(3, 2, false);
        let strides: Vec<usize> = steps.iter().map(|s| s.stride).collect();
        assert_eq!(strides, vec![4, 2, 1, 1, 2, 4]);
        assert_eq!(steps[4].block, 1);
        assert_eq!(steps[4].idx, 1);
    }

    #[test]
    fn stage_uses_its_own_block_per_pair() {
        // stride 1, 쌍마다 다른 스케일
        let mut twiddle = Array6::<f32>::zeros((1, 1, 1, 1, 2, 2));
        twiddle[[0, 0, 0, 0, 0, 0]] = 2.0;
        twiddle[[0, 0, 0, 0, 0, 1]] = 1.0;
        twiddle[[0, 0, 0, 0, 1, 0]] = -1.0;
        twiddle[[0, 0, 0, 0, 1, 1]] = 3.0;
        let input = arr1(&[1.0f32, 2.0]).into_shape((1, 1, 2)).unwrap();
        let trace = butterfly_multiply(&twiddle, &input, true, None).unwrap();
        assert_abs_diff_eq!(trace.output[[0, 0, 0]], 4.0);
        assert_abs_diff_eq!(trace.output[[0, 0, 1]], 5.0);
    }

    #[test]
    fn weight_snapshot_is_independent_of_twiddle() {
        let mut twiddle = identity_twiddle::<f32>(1, 1, 2);
        let input = ramp(1, 1, 4);
        let trace = butterfly_multiply(&twiddle, &input, true, None).unwrap();
        twiddle.fill(7.0);
        assert_eq!(trace.weights[0][[0, 0, 0]], 1.0);
    }

    #[test]
    fn rejects_non_square_blocks() {
        let twiddle = Array6::<f32>::zeros((1, 1, 3, 4, 2, 3));
        let input = ramp(1, 1, 8);
        assert!(matches!(
            butterfly_multiply(&twiddle, &input, true, None),
            Err(Error::Shape(_))
        ));
    }

    #[test]
    fn rejects_oversized_output() {
        let twiddle = identity_twiddle::<f32>(1, 1, 3);
        let input = ramp(1, 1, 8);
        assert!(matches!(
            butterfly_multiply(&twiddle, &input, true, Some(9)),
            Err(Error::Shape(_))
        ));
    }

    #[test]
    fn rejects_stack_mismatch() {
        let twiddle = identity_twiddle::<f32>(2, 1, 3);
        let input = ramp(1, 1, 8);
        assert!(matches!(
            butterfly_multiply(&twiddle, &input, true, None),
            Err(Error::Shape(_))
        ));
    }

    #[test]
    fn apply_stage_checks_stride() {
        let mut state = ramp(1, 1, 8);
        let stage = Array4::<f32>::zeros((1, 4, 2, 2));
        assert!(apply_stage(&mut state, &stage.view(), 8).is_err());
        assert!(matches!(
            apply_stage(&mut state, &stage.view(), 1usize << (usize::BITS - 1)),
            Err(Error::Config(_))
        ));
        assert!(apply_stage(&mut state, &stage.view(), 4).is_ok());
        assert!(state.iter().all(|&v| v == 0.0));
    }
}
