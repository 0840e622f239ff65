//! 에러 타입 정의

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// 버터플라이 연산과 레이아웃 변환에서 발생하는 에러
#[derive(Debug, Error)]
pub enum Error {
    /// 텐서 모양이 계약과 맞지 않음
    #[error("shape error: {0}")]
    Shape(String),
    /// 하드웨어/레이어 설정이 지원되지 않음
    #[error("config error: {0}")]
    Config(String),
    /// 테스트 벡터 파일 입출력 실패
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn shape(m: impl Into<String>) -> Error {
    Error::Shape(m.into())
}

pub fn config(m: impl Into<String>) -> Error {
    Error::Config(m.into())
}
