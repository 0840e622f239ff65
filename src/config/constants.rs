//! 하드웨어 레이아웃과 수치 검증을 위한 상수값 정의

/// 레퍼런스 NPU 하드웨어 특성과 검증 허용 오차
pub struct Constants;

impl Constants {
    /// BRAM 한 줄의 폭 (원소 단위). 하드웨어 고정값
    pub const BRAM_WIDTH: usize = 8;

    /// 기본 버터플라이 유닛 병렬도
    pub const DEFAULT_BU_PARALLELISM: usize = 4;

    /// 테스트 벡터 생성 기본 길이
    pub const DEFAULT_LENGTH: usize = 128;

    /// 레이어 정규화 엡실론 (0으로 나누기 방지)
    pub const LAYER_NORM_EPS: f32 = 1e-5;

    /// f16 모드 상대 오차 허용치
    pub const HALF_TOLERANCE: f64 = 1e-2;

    /// f32 모드 상대 오차 허용치
    pub const SINGLE_TOLERANCE: f64 = 1e-4;
}
