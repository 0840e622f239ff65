//! 가중치 레이아웃 변환
//!
//! 병렬 버터플라이 유닛이 같은 사이클에 같은 BRAM 뱅크를 읽지 않도록 단계별
//! 가중치 행을 짝수 뱅크 → 홀수 뱅크 순서로 섞고, BU 병렬도만큼 행을 묶어
//! 한 번의 읽기로 여러 2x2 블록을 가져오게 만든다. 학습이 끝난 가중치에 대해
//! 한 번만 수행하는 오프라인 변환이다.

use crate::config::constants::Constants;
use crate::error::{config, shape, Result};
use crate::utils::numeric::log2_exact;
use ndarray::{Array3, Axis};
use tracing::debug;

/// 깊이 슬롯마다 어느 BRAM 뱅크에 놓이는지를 나타내는 오프셋 패턴
///
/// `[0, 1]`에서 시작해 `(b + 1) mod bram_width`로 민 복사본을 뒤에 붙이며
/// `length / bram_width` 깊이를 덮을 때까지 두 배로 늘린다.
pub fn bank_offsets(length: usize, bram_width: usize) -> Result<Vec<usize>> {
    if bram_width < 2 || length % bram_width != 0 {
        return Err(config(format!(
            "bram width {} does not evenly divide length {}",
            bram_width, length
        )));
    }
    let mut remaining = (length / bram_width) as isize - 2;
    let mut offset = vec![0usize, 1];
    while remaining > 0 {
        remaining -= offset.len() as isize;
        let shifted: Vec<usize> = offset.iter().map(|b| (b + 1) % bram_width).collect();
        offset.extend(shifted);
    }
    Ok(offset)
}

/// 단계 `stage`의 행 순열. 마지막 log2(BRAM_WIDTH)개 단계는 None
///
/// 결과 `perm`에 대해 새 행 r은 원래 행 `perm[r]`이다.
/// `length`는 2의 거듭제곱이고 `num_stages == log2(length)`여야 한다.
pub fn stage_permutation(
    num_stages: usize,
    stage: usize,
    length: usize,
) -> Result<Option<Vec<usize>>> {
    let bram_width = Constants::BRAM_WIDTH;
    let log_width = bram_width.trailing_zeros() as usize;
    if log2_exact(length) != Some(num_stages) {
        return Err(config(format!(
            "cannot reorder {} stages of length {}",
            num_stages, length
        )));
    }
    if stage >= num_stages {
        return Err(config(format!(
            "stage {} out of range for {} stages",
            stage, num_stages
        )));
    }
    // 남은 단계가 log2(BRAM_WIDTH) 이하면 stride가 뱅크 하나 안에 들어간다
    let distance = num_stages - stage;
    if distance <= log_width {
        return Ok(None);
    }

    let stride = (1usize << distance) / bram_width;
    let depth = length / bram_width;
    let pattern: Vec<usize> = (0..bram_width)
        .step_by(2)
        .chain((1..bram_width).step_by(2))
        .collect();

    let mut seq = Vec::with_capacity(length / 2);
    let mut cur_d = 0;
    while cur_d < depth {
        for _ in 0..stride / 2 {
            let base = seq.len();
            seq.extend(pattern.iter().map(|p| p + base));
        }
        cur_d += stride;
    }
    Ok(Some(seq))
}

/// 순열의 역순열
pub fn inverse_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inv = vec![0; perm.len()];
    for (new_row, &old_row) in perm.iter().enumerate() {
        inv[old_row] = new_row;
    }
    inv
}

/// (stacks, rows, 4) → (stacks, rows/bu, 4*bu). 연속한 bu개 행을 한 행으로 이어 붙인다
pub fn group_weights<T: Clone>(weight: &Array3<T>, bu_parallelism: usize) -> Result<Array3<T>> {
    let (nstacks, rows, feat) = weight.dim();
    if bu_parallelism == 0 || rows % bu_parallelism != 0 {
        return Err(config(format!(
            "bu_parallelism {} does not divide {} weight rows",
            bu_parallelism, rows
        )));
    }
    Array3::from_shape_vec(
        (nstacks, rows / bu_parallelism, feat * bu_parallelism),
        weight.iter().cloned().collect(),
    )
    .map_err(|e| shape(e.to_string()))
}

/// `group_weights`의 역변환
pub fn ungroup_weights<T: Clone>(weight: &Array3<T>, bu_parallelism: usize) -> Result<Array3<T>> {
    let (nstacks, rows, feat) = weight.dim();
    if bu_parallelism == 0 || feat % bu_parallelism != 0 {
        return Err(config(format!(
            "bu_parallelism {} does not divide feature width {}",
            bu_parallelism, feat
        )));
    }
    Array3::from_shape_vec(
        (nstacks, rows * bu_parallelism, feat / bu_parallelism),
        weight.iter().cloned().collect(),
    )
    .map_err(|e| shape(e.to_string()))
}

fn validate(
    num_stages: usize,
    shapes: &[&[usize]],
    length: usize,
    bu_parallelism: usize,
) -> Result<()> {
    let log_n = log2_exact(length)
        .filter(|_| length >= Constants::BRAM_WIDTH)
        .ok_or_else(|| {
            config(format!(
                "length {} must be a power of two divisible by bram width {}",
                length,
                Constants::BRAM_WIDTH
            ))
        })?;
    let half = length / 2;
    if bu_parallelism == 0 || half % bu_parallelism != 0 {
        return Err(config(format!(
            "bu_parallelism {} does not divide n/2 = {}",
            bu_parallelism, half
        )));
    }
    if !bu_parallelism.is_power_of_two() {
        return Err(config(format!(
            "bu_parallelism {} is not a power of two",
            bu_parallelism
        )));
    }
    // 다중 블록 순서의 stride 계산은 정의되어 있지 않다
    if num_stages != log_n {
        return Err(config(format!(
            "expected {} stages for length {}, got {}",
            log_n, length, num_stages
        )));
    }
    for (i, s) in shapes.iter().enumerate() {
        if *s != [1, half, 4] {
            return Err(shape(format!(
                "stage {} weight must be (1, {}, 4), got {:?}",
                i, half, s
            )));
        }
    }
    Ok(())
}

/// 단계별 가중치를 하드웨어 레이아웃으로 변환 (제자리 교체)
///
/// * `weights` - 엔진이 만든 (1, n/2, 4) 가중치들, 실행 순서
/// * `length` - 변환 크기 n
/// * `bu_parallelism` - 사이클당 버터플라이 유닛 수
///
/// 검증에 실패하면 `weights`는 손대지 않는다.
pub fn reorder_weights<T: Clone>(
    weights: &mut [Array3<T>],
    length: usize,
    bu_parallelism: usize,
) -> Result<()> {
    let shapes: Vec<&[usize]> = weights.iter().map(|w| w.shape()).collect();
    validate(weights.len(), &shapes, length, bu_parallelism)?;

    let offsets = bank_offsets(length, Constants::BRAM_WIDTH)?;
    debug!(length, bu_parallelism, ?offsets, "bram bank offsets");

    let num_stages = weights.len();
    let mut reordered = Vec::with_capacity(num_stages);
    for (i, weight) in weights.iter().enumerate() {
        let permuted = match stage_permutation(num_stages, i, length)? {
            Some(perm) => {
                debug!(stage = i, rows = perm.len(), "permuting stage rows");
                weight.select(Axis(1), &perm)
            }
            None => weight.clone(),
        };
        reordered.push(group_weights(&permuted, bu_parallelism)?);
    }

    for (slot, w) in weights.iter_mut().zip(reordered) {
        *slot = w;
    }
    Ok(())
}

/// `reorder_weights`의 역변환. 묶음을 풀고 순열을 되돌린다
pub fn restore_weights<T: Clone>(
    reordered: &[Array3<T>],
    length: usize,
    bu_parallelism: usize,
) -> Result<Vec<Array3<T>>> {
    let flat = reordered
        .iter()
        .map(|w| ungroup_weights(w, bu_parallelism))
        .collect::<Result<Vec<_>>>()?;
    let shapes: Vec<&[usize]> = flat.iter().map(|w| w.shape()).collect();
    validate(flat.len(), &shapes, length, bu_parallelism)?;

    let num_stages = flat.len();
    flat
        .into_iter()
        .enumerate()
        .map(|(i, w)| {
            Ok(match stage_permutation(num_stages, i, length)? {
                Some(perm) => w.select(Axis(1), &inverse_permutation(&perm)),
                None => w,
            })
        })
        .collect()
}
