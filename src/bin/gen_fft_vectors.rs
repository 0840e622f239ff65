//! FFT + 레이어 정규화 + shortcut 테스트 벡터 생성기

use anyhow::{Context, Result};
use bfly_npu::config::constants::Constants;
use bfly_npu::export::TestVectorSet;
use bfly_npu::{ButterflyConfig, Precision};
use clap::{Parser, ValueEnum};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PrecisionArg {
    Half,
    Single,
}

impl From<PrecisionArg> for Precision {
    fn from(p: PrecisionArg) -> Self {
        match p {
            PrecisionArg::Half => Precision::Half,
            PrecisionArg::Single => Precision::Single,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate butterfly FFT test vectors for the NPU testbench")]
struct Cli {
    /// 버터플라이 길이 (2의 거듭제곱)
    #[arg(long, default_value_t = Constants::DEFAULT_LENGTH)]
    length: usize,

    /// 사이클당 버터플라이 유닛 수
    #[arg(long, default_value_t = Constants::DEFAULT_BU_PARALLELISM)]
    bu_parallelism: usize,

    /// 출력 디렉터리. 기본값 ./float16_fft_ln_sc{length}
    #[arg(long)]
    out: Option<PathBuf>,

    /// 입력 난수 시드
    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long, value_enum, default_value_t = PrecisionArg::Half)]
    precision: PrecisionArg,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let cfg = ButterflyConfig::new(cli.length)
        .with_bu_parallelism(cli.bu_parallelism)
        .with_precision(cli.precision.into());

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let input = Array1::from_shape_fn(cli.length, |_| rng.gen::<f32>());

    tracing::info!(length = cli.length, bu = cli.bu_parallelism, "running FFT with LN and SC");
    let set = TestVectorSet::generate(&cfg, &input).context("generating test vectors")?;

    let out = cli
        .out
        .unwrap_or_else(|| PathBuf::from(format!("./float16_fft_ln_sc{}", cli.length)));
    set.write(&out)
        .with_context(|| format!("writing test vectors to {}", out.display()))?;
    tracing::info!("done");
    Ok(())
}
