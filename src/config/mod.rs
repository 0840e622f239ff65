//! 버터플라이 레이어 설정

pub mod constants;

use crate::error::{config, Result};
use crate::precision::Precision;
use constants::Constants;

/// 버터플라이 레이어와 하드웨어 내보내기 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButterflyConfig {
    /// 변환 크기 n (2의 거듭제곱)
    pub n: usize,
    /// 순차 합성되는 버터플라이 블록 수
    pub nblocks: usize,
    /// 첫 블록의 stride 방향
    pub increasing_stride: bool,
    /// 사이클당 버터플라이 유닛 수
    pub bu_parallelism: usize,
    /// 테스트 벡터 생성 정밀도
    ///
    /// `export::TestVectorSet`만 읽는다. `ButterflyLinear<T>`는 원소 타입 `T`로 계산한다.
    pub precision: Precision,
}

impl ButterflyConfig {
    /// 크기 n의 기본 설정 생성 (블록 1개, 감소 stride, 기본 BU 병렬도, f16)
    pub fn new(n: usize) -> Self {
        ButterflyConfig {
            n,
            nblocks: 1,
            increasing_stride: false,
            bu_parallelism: Constants::DEFAULT_BU_PARALLELISM,
            precision: Precision::Half,
        }
    }

    pub fn with_nblocks(mut self, nblocks: usize) -> Self {
        self.nblocks = nblocks;
        self
    }

    pub fn with_increasing_stride(mut self, increasing_stride: bool) -> Self {
        self.increasing_stride = increasing_stride;
        self
    }

    pub fn with_bu_parallelism(mut self, bu_parallelism: usize) -> Self {
        self.bu_parallelism = bu_parallelism;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// log2(n)
    pub fn log_n(&self) -> usize {
        self.n.trailing_zeros() as usize
    }

    /// 설정 검증. 하드웨어가 받아들일 수 없는 조합이면 ConfigError
    pub fn validate(&self) -> Result<()> {
        if self.n < 2 || !self.n.is_power_of_two() {
            return Err(config(format!("n must be a power of two >= 2, got {}", self.n)));
        }
        if self.nblocks == 0 {
            return Err(config("nblocks must be at least 1"));
        }
        let half = self.n / 2;
        if self.bu_parallelism == 0 || half % self.bu_parallelism != 0 {
            return Err(config(format!(
                "bu_parallelism {} does not divide n/2 = {}",
                self.bu_parallelism, half
            )));
        }
        if !self.bu_parallelism.is_power_of_two() {
            return Err(config(format!(
                "bu_parallelism {} is not a power of two",
                self.bu_parallelism
            )));
        }
        Ok(())
    }
}

impl Default for ButterflyConfig {
    fn default() -> Self {
        ButterflyConfig::new(Constants::DEFAULT_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn default_config_is_valid() {
        let cfg = ButterflyConfig::default();
        assert_eq!(cfg.n, 128);
        assert_eq!(cfg.log_n(), 7);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_non_power_of_two_length() {
        let cfg = ButterflyConfig::new(96);
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_bu_that_does_not_divide_half() {
        let cfg = ButterflyConfig::new(128).with_bu_parallelism(3);
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
        let cfg = ButterflyConfig::new(8).with_bu_parallelism(8);
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_zero_blocks() {
        let cfg = ButterflyConfig::new(16).with_nblocks(0);
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }
}
