//! 인덱스 계산 유틸리티 함수들

/// n이 2의 거듭제곱이면 log2(n), 아니면 None
pub fn log2_exact(n: usize) -> Option<usize> {
    if n.is_power_of_two() {
        Some(n.trailing_zeros() as usize)
    } else {
        None
    }
}

/// 하위 `bits` 비트 뒤집기
pub fn bit_reverse(i: usize, bits: usize) -> usize {
    if bits == 0 {
        return 0;
    }
    i.reverse_bits() >> (usize::BITS as usize - bits)
}

/// 길이 n의 비트 반전 순열
pub fn bit_reverse_permutation(n: usize) -> Vec<usize> {
    let bits = n.trailing_zeros() as usize;
    (0..n).map(|i| bit_reverse(i, bits)).collect()
}
